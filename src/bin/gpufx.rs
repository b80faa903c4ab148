// gpufx — command-line driver for the GPU filters and the matmul benchmark.
//
//   gpufx matrix 512 256 384
//   gpufx filter median in.png out.png 3
//   gpufx --cpu --profile rpi filter gaussian in.jpg out.bmp 8
//
// Logging goes through env_logger, default level `info` (RUST_LOG overrides).

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueHint};
use image::{ColorType, DynamicImage, ImageBuffer, ImageFormat};

use gpufx::{
    BackendOptions, DevicePreference, DeviceProfile, FilterKind, GpuMatrixMultiplier, ImageLayout,
};

type Result<T> = std::result::Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(author, version, about = "GPU image filters and tiled matrix multiplication")]
struct Cli {
    /// Prefer a CPU-class (software) adapter
    #[arg(long, global = true)]
    cpu: bool,

    /// Device profile: native or rpi (raspberry-pi)
    #[arg(long, global = true)]
    profile: Option<DeviceProfile>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Multiply (rows1 × cols1) by (cols1 × cols2) on CPU and GPU and compare
    Matrix(MatrixArgs),

    /// Apply a filter to an image file
    Filter(FilterArgs),
}

#[derive(Args)]
struct MatrixArgs {
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    rows1: u32,
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    cols1: u32,
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    cols2: u32,
}

#[derive(Args)]
struct FilterArgs {
    /// gaussian, median, motion or radial
    #[arg(value_parser = parse_filter_kind)]
    kind: FilterKind,

    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Format follows the extension (png, jpg, jpeg, bmp); anything else
    /// is written as <stem>.png
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Radius, length or intensity
    #[arg(default_value_t = 5, value_parser = clap::value_parser!(i32).range(0..))]
    param: i32,
}

fn parse_filter_kind(s: &str) -> std::result::Result<FilterKind, String> {
    s.parse().map_err(|e: gpufx::GpuError| e.to_string())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let mut options = BackendOptions::from_env();
    if cli.cpu {
        options = options.with_preference(DevicePreference::CpuOnly);
    }
    if let Some(profile) = cli.profile {
        options = options.with_profile(profile);
    }

    match &cli.command {
        Command::Matrix(args) => run_matrix(args, &options),
        Command::Filter(args) => run_filter(args, &options),
    }
}

fn run_matrix(args: &MatrixArgs, options: &BackendOptions) -> Result<()> {
    let multiplier = GpuMatrixMultiplier::new(options)?;
    println!("Device: {}", multiplier.backend());
    let report = multiplier.run_benchmark(
        args.rows1 as usize,
        args.cols1 as usize,
        args.cols2 as usize,
    )?;
    println!("{report}");
    Ok(())
}

fn run_filter(args: &FilterArgs, options: &BackendOptions) -> Result<()> {
    let decoded = image::open(&args.input)?;
    let (layout, mut pixels) = to_interleaved(decoded, args.kind);
    log::info!("loaded {} ({layout})", args.input.display());

    let filter = args.kind.build(args.param, options)?;
    filter.apply(&mut pixels, layout.width, layout.height, layout.channels)?;
    println!("Applied {} (parameter {})", filter.name(), filter.parameter());

    let output = output_path(&args.output);
    save_interleaved(&output, layout, pixels)?;
    println!("Wrote {}", output.display());
    Ok(())
}

/// Decode into the 8-bit layout the filter will run on.
///
/// Filters with a fixed channel count get that layout; the rest keep the
/// file's own 8-bit layout (L, LA, RGB, RGBA). Deeper formats become RGBA.
fn to_interleaved(img: DynamicImage, kind: FilterKind) -> (ImageLayout, Vec<u8>) {
    let (width, height) = (img.width(), img.height());
    let (channels, data) = match (kind.required_channels(), img.color()) {
        (Some(4), _) => (4, img.into_rgba8().into_raw()),
        (Some(3), _) => (3, img.into_rgb8().into_raw()),
        (None, ColorType::L8) => (1, img.into_luma8().into_raw()),
        (None, ColorType::La8) => (2, img.into_luma_alpha8().into_raw()),
        (None, ColorType::Rgb8) => (3, img.into_rgb8().into_raw()),
        _ => (4, img.into_rgba8().into_raw()),
    };
    (ImageLayout::new(width, height, channels), data)
}

/// `path` if its extension names a supported output format, otherwise
/// `<stem>.png` beside it.
fn output_path(path: &Path) -> PathBuf {
    let supported = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg" | "bmp"))
        .unwrap_or(false);
    if supported {
        return path.to_path_buf();
    }
    let fallback = path.with_extension("png");
    log::warn!(
        "unsupported output extension for {}, writing {} instead",
        path.display(),
        fallback.display()
    );
    fallback
}

fn save_interleaved(path: &Path, layout: ImageLayout, data: Vec<u8>) -> Result<()> {
    let (w, h) = (layout.width, layout.height);
    let invalid = || format!("pixel buffer does not match {layout}");
    let img = match layout.channels {
        1 => DynamicImage::ImageLuma8(ImageBuffer::from_raw(w, h, data).ok_or_else(invalid)?),
        2 => DynamicImage::ImageLumaA8(ImageBuffer::from_raw(w, h, data).ok_or_else(invalid)?),
        3 => DynamicImage::ImageRgb8(ImageBuffer::from_raw(w, h, data).ok_or_else(invalid)?),
        _ => DynamicImage::ImageRgba8(ImageBuffer::from_raw(w, h, data).ok_or_else(invalid)?),
    };

    let format = ImageFormat::from_path(path)?;
    // JPEG has no alpha channel.
    let img = match (format, img.color().has_alpha()) {
        (ImageFormat::Jpeg, true) => DynamicImage::ImageRgb8(img.into_rgb8()),
        _ => img,
    };
    img.save_with_format(path, format)?;
    Ok(())
}
