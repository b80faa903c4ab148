// convolution.rs — Separable Gaussian blur on interleaved 8-bit images.
//
// CPU reference for the GPU Gaussian filter in gpu/gaussian.rs. The GPU
// runs the blur as four dependent dispatches and this module mirrors them
// one-to-one so each stage can be compared:
//
//   convolve_rows()  horizontal 1D pass      → blur_pass
//   transpose()      (x, y) → (y, x)          → transpose_image
//   convolve_rows()  horizontal pass again    → blur_pass (on transposed)
//   transpose()      back to original layout  → transpose_image
//
// Running the same horizontal pass twice with transposes in between gives
// the vertical pass without a second kernel, and keeps every memory read
// of the blur along a contiguous row.
//
// BORDER HANDLING: clamp (replicate edge pixels).
//
// ROUNDING: each pass accumulates in f32 and writes u8, rounding to nearest
// with ties to even and saturating to [0, 255]. WGSL `round()` has the same
// tie rule, so CPU and GPU agree except where f32 evaluation order moves a
// sum across a .5 boundary (at most ±1).

use crate::image::Image;

/// Standard deviation used for a blur radius: `max(1, radius / 2)`.
pub fn gaussian_sigma(radius: u32) -> f32 {
    (radius as f32 / 2.0).max(1.0)
}

/// Generate a 1D Gaussian kernel with the given half-size and sigma.
///
/// Returns a kernel of length `2 * half_size + 1`, normalized so the
/// coefficients sum to 1.0.
///
/// # Examples
/// ```
/// let k = gpufx::convolution::gaussian_kernel_1d(2, 1.0);
/// assert_eq!(k.len(), 5);
/// assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-6);
/// ```
pub fn gaussian_kernel_1d(half_size: usize, sigma: f32) -> Vec<f32> {
    assert!(sigma > 0.0, "sigma must be positive");
    let len = 2 * half_size + 1;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (0..len)
        .map(|i| {
            let x = i as f32 - half_size as f32;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// The blur kernel for a filter radius: length `2r + 1`, sigma from
/// [`gaussian_sigma`].
pub fn gaussian_kernel(radius: u32) -> Vec<f32> {
    gaussian_kernel_1d(radius as usize, gaussian_sigma(radius))
}

/// Round to nearest (ties to even) and saturate to the u8 range.
#[inline]
pub fn round_saturate(v: f32) -> u8 {
    v.round_ties_even().clamp(0.0, 255.0) as u8
}

/// Convolve each row of `src` with a centred 1D kernel, every channel
/// independently.
///
/// # Panics
/// Panics if the kernel is empty or has even length.
pub fn convolve_rows(src: &Image, kernel: &[f32]) -> Image {
    assert!(!kernel.is_empty(), "kernel must not be empty");
    assert!(kernel.len() % 2 == 1, "kernel length must be odd (got {})", kernel.len());

    let (w, h, ch) = (src.width(), src.height(), src.channels());
    let half = (kernel.len() / 2) as i64;
    let mut dst = Image::new(w, h, ch);

    for y in 0..h {
        for x in 0..w {
            for c in 0..ch {
                let mut acc = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sx = x as i64 + ki as i64 - half;
                    acc += src.get_clamped(sx, y as i64, c) as f32 * kv;
                }
                dst.set(x, y, c, round_saturate(acc));
            }
        }
    }
    dst
}

/// Swap rows and columns: pixel `(x, y)` of `src` becomes `(y, x)`.
pub fn transpose(src: &Image) -> Image {
    let (w, h, ch) = (src.width(), src.height(), src.channels());
    let mut dst = Image::new(h, w, ch);
    for y in 0..h {
        for x in 0..w {
            for c in 0..ch {
                dst.set(y, x, c, src.get(x, y, c));
            }
        }
    }
    dst
}

/// Full separable Gaussian blur: rows, transpose, rows, transpose back.
///
/// Radius 0 returns an unchanged copy.
pub fn gaussian_blur(src: &Image, radius: u32) -> Image {
    if radius == 0 {
        return src.clone();
    }
    let kernel = gaussian_kernel(radius);
    let horizontal = convolve_rows(src, &kernel);
    let transposed = transpose(&horizontal);
    let vertical = convolve_rows(&transposed, &kernel);
    transpose(&vertical)
}
