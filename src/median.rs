// median.rs — Windowed median filter (CPU reference).
//
// For every pixel and channel, gather the (2r+1)² neighbourhood with
// clamp-to-edge addressing, sort it, and take the element at `count / 2`.
// The GPU kernel keeps the window in a fixed private array of
// MEDIAN_WINDOW_CAPACITY entries, which is what bounds the radius.

use crate::image::Image;

/// Largest supported window radius. (2·10 + 1)² = 441 samples.
pub const MAX_MEDIAN_RADIUS: u32 = 10;

/// Fixed working-set size of the median kernel.
pub const MEDIAN_WINDOW_CAPACITY: usize =
    ((2 * MAX_MEDIAN_RADIUS + 1) * (2 * MAX_MEDIAN_RADIUS + 1)) as usize;

/// Clamp a requested radius to [`MAX_MEDIAN_RADIUS`], logging when capped.
pub fn effective_radius(requested: u32) -> u32 {
    if requested > MAX_MEDIAN_RADIUS {
        log::warn!(
            "median radius {requested} exceeds the supported maximum, capping at {MAX_MEDIAN_RADIUS}"
        );
        MAX_MEDIAN_RADIUS
    } else {
        requested
    }
}

/// Median of every (2r+1)² window. Radius is capped like the GPU filter.
pub fn median_filter(src: &Image, radius: u32) -> Image {
    let r = effective_radius(radius) as i64;
    let (w, h, ch) = (src.width(), src.height(), src.channels());
    let mut dst = Image::new(w, h, ch);
    let mut window = Vec::with_capacity(MEDIAN_WINDOW_CAPACITY);

    for y in 0..h {
        for x in 0..w {
            for c in 0..ch {
                window.clear();
                for dy in -r..=r {
                    for dx in -r..=r {
                        window.push(src.get_clamped(x as i64 + dx, y as i64 + dy, c));
                    }
                }
                window.sort_unstable();
                dst.set(x, y, c, window[window.len() / 2]);
            }
        }
    }
    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_matches_max_radius() {
        assert_eq!(MEDIAN_WINDOW_CAPACITY, 441);
    }

    #[test]
    fn test_effective_radius_caps() {
        assert_eq!(effective_radius(0), 0);
        assert_eq!(effective_radius(10), 10);
        assert_eq!(effective_radius(11), 10);
        assert_eq!(effective_radius(u32::MAX), 10);
    }

    #[test]
    fn test_radius_zero_identity() {
        let img = Image::from_fn(5, 4, 3, |x, y, c| (x * 50 + y * 13 + c) as u8);
        assert_eq!(median_filter(&img, 0), img);
    }

    #[test]
    fn test_removes_salt_noise() {
        let mut img = Image::from_vec(5, 5, 1, vec![10; 25]);
        img.set(2, 2, 0, 255);
        let out = median_filter(&img, 1);
        assert_eq!(out.get(2, 2, 0), 10);
    }

    #[test]
    fn test_edge_clamp() {
        // Single row [0, 0, 9]: at x=2 with r=1 the window (rows clamped to
        // the same row) is 3×[0, 9, 9] → sorted [0,0,0,9,9,9,9,9,9], median 9.
        let img = Image::from_vec(3, 1, 1, vec![0, 0, 9]);
        let out = median_filter(&img, 1);
        assert_eq!(out.as_slice(), &[0, 0, 9]);
    }
}
