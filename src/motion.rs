// motion.rs — Horizontal motion blur (CPU reference).
//
// A per-channel box average along the row. For trail length L the window
// covers offsets -L/2 ..= L/2; even lengths drop the last offset so the
// window has exactly L taps (-2, -1, 0, 1 for L = 4); L = 1 is the pixel
// itself. Out-of-range columns clamp to the edge. The output is the integer
// mean, truncated.

use std::ops::RangeInclusive;

use crate::image::Image;

/// Column offsets averaged for trail length `length`, or `None` when the
/// filter is a no-op (`length == 0`).
pub fn motion_offsets(length: u32) -> Option<RangeInclusive<i64>> {
    match length {
        0 => None,
        1 => Some(0..=0),
        l => {
            let half = (l / 2) as i64;
            let end = if l % 2 == 0 { half - 1 } else { half };
            Some(-half..=end)
        }
    }
}

/// Horizontal box blur with trail length `length`. Length 0 copies.
pub fn motion_blur(src: &Image, length: u32) -> Image {
    let Some(offsets) = motion_offsets(length) else {
        return src.clone();
    };
    let (w, h, ch) = (src.width(), src.height(), src.channels());
    let count = (offsets.end() - offsets.start() + 1) as u32;
    let mut dst = Image::new(w, h, ch);

    for y in 0..h {
        for x in 0..w {
            for c in 0..ch {
                let sum: u32 = offsets
                    .clone()
                    .map(|dx| src.get_clamped(x as i64 + dx, y as i64, c) as u32)
                    .sum();
                dst.set(x, y, c, (sum / count) as u8);
            }
        }
    }
    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        assert_eq!(motion_offsets(0), None);
        assert_eq!(motion_offsets(1), Some(0..=0));
        assert_eq!(motion_offsets(2), Some(-1..=0));
        assert_eq!(motion_offsets(3), Some(-1..=1));
        assert_eq!(motion_offsets(4), Some(-2..=1));
        assert_eq!(motion_offsets(5), Some(-2..=2));
    }

    #[test]
    fn test_window_has_length_taps() {
        for l in 1..20u32 {
            let r = motion_offsets(l).unwrap();
            assert_eq!((r.end() - r.start() + 1) as u32, l, "length {l}");
        }
    }

    #[test]
    fn test_length_one_identity() {
        let img = Image::from_fn(7, 3, 3, |x, y, c| (x * 37 + y * 5 + c * 60) as u8);
        assert_eq!(motion_blur(&img, 1), img);
    }

    #[test]
    fn test_truncated_mean() {
        // Length 3 on [0, 1, 1, 0]: x=1 → (0+1+1)/3 = 0 (truncated).
        let img = Image::from_vec(4, 1, 1, vec![0, 1, 1, 0]);
        let out = motion_blur(&img, 3);
        assert_eq!(out.as_slice(), &[0, 0, 0, 0]);

        let img = Image::from_vec(3, 1, 1, vec![10, 20, 31]);
        let out = motion_blur(&img, 3);
        // x=0: (10+10+20)/3 = 13, x=1: 61/3 = 20, x=2: (20+31+31)/3 = 27
        assert_eq!(out.as_slice(), &[13, 20, 27]);
    }

    #[test]
    fn test_rows_are_independent() {
        let img = Image::from_fn(4, 2, 1, |_, y, _| if y == 0 { 0 } else { 200 });
        let out = motion_blur(&img, 5);
        assert!(out.as_slice()[..4].iter().all(|&v| v == 0));
        assert!(out.as_slice()[4..].iter().all(|&v| v == 200));
    }
}
