// tests/test_image.rs — Integration tests for Image, ImageLayout and the filter factory.
//
// These run with `cargo test --test test_image` and only touch the public
// API. Nothing here needs an adapter.

use gpufx::error::GpuError;
use gpufx::image::{Image, ImageLayout};
use gpufx::FilterKind;

// ===== Image construction & basic access =====

#[test]
fn image_new_zero_initialized() {
    let img = Image::new(100, 50, 3);
    assert_eq!((img.width(), img.height(), img.channels()), (100, 50, 3));
    assert_eq!(img.as_slice().len(), 100 * 50 * 3);
    assert!(img.as_slice().iter().all(|&v| v == 0));
}

#[test]
fn image_set_get_consistency() {
    let mut img = Image::new(10, 10, 2);
    // Checkerboard in channel 0, inverse in channel 1.
    for y in 0..10 {
        for x in 0..10 {
            let val = if (x + y) % 2 == 0 { 255u8 } else { 0u8 };
            img.set(x, y, 0, val);
            img.set(x, y, 1, 255 - val);
        }
    }
    for y in 0..10 {
        for x in 0..10 {
            let expected = if (x + y) % 2 == 0 { 255u8 } else { 0u8 };
            assert_eq!(img.pixel(x, y), &[expected, 255 - expected], "mismatch at ({x}, {y})");
        }
    }
}

#[test]
fn interleaved_layout() {
    let img = Image::from_fn(3, 2, 4, |x, y, c| (y * 100 + x * 10 + c) as u8);
    let layout = img.layout();
    assert_eq!(layout.index(2, 1, 3), 23); // (y * w + x) * ch + c
    assert_eq!(img.as_slice()[layout.index(2, 1, 3)], 123);
    assert_eq!(layout.to_string(), "3x2x4");
}

#[test]
fn clamped_reads_replicate_edges() {
    let img = Image::from_fn(4, 3, 1, |x, y, _| (y * 4 + x) as u8);
    assert_eq!(img.get_clamped(-5, 0, 0), 0);
    assert_eq!(img.get_clamped(9, 0, 0), 3);
    assert_eq!(img.get_clamped(1, -1, 0), 1);
    assert_eq!(img.get_clamped(1, 7, 0), 9);
    assert_eq!(img.get_clamped(-1, 99, 0), 8);
}

// ===== Layout validation =====

#[test]
fn layout_validation() {
    let layout = ImageLayout::new(5, 4, 3);
    assert!(layout.validate(60).is_ok());
    let err = layout.validate(59).unwrap_err();
    assert!(matches!(err, GpuError::InvalidImageLength { expected: 60, actual: 59, .. }));
    assert!(!err.is_recoverable());

    assert!(Image::try_from_vec(2, 2, 1, vec![0; 3]).is_err());
    assert!(ImageLayout::new(0, 7, 4).is_empty());
}

// ===== Filter factory =====

#[test]
fn filter_kind_parsing() {
    let kinds: Vec<FilterKind> = ["gaussian", "median", "motion", "radial"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    assert_eq!(kinds, FilterKind::ALL);
    assert!(matches!(
        "emboss".parse::<FilterKind>(),
        Err(GpuError::UnknownFilter(_))
    ));
}

#[test]
fn only_gaussian_fixes_channels() {
    for kind in FilterKind::ALL {
        let expected = if kind == FilterKind::Gaussian { Some(4) } else { None };
        assert_eq!(kind.required_channels(), expected, "{kind}");
    }
}
