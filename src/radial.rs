// radial.rs — Radial (zoom) blur (CPU reference).
//
// Each pixel averages samples taken along the line from itself back toward
// the image centre. Pixels further out sample with a wider step, so the
// streaks grow toward the corners:
//
//   d          = |p - centre|,  centre = (w/2, h/2)
//   maxDist    = max(1, ½·√(w² + h²))
//   sampleStep = max(1, 1 + (d / maxDist) · 0.005·I · I)
//   numSamples = max(1, I/2 + 1)
//   sample s   = p - dir · s · sampleStep,  s in 0..numSamples
//
// Sample coordinates truncate toward zero and then clamp to the image.
// Pixels within distance 1 of the centre are copied unchanged. The output
// is the truncated integer mean per channel.

use crate::image::Image;

/// Number of samples taken per pixel at intensity `intensity`.
pub fn radial_sample_count(intensity: u32) -> u32 {
    (intensity / 2 + 1).max(1)
}

/// Per-image constants of the radial blur.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialGeometry {
    pub center_x: f32,
    pub center_y: f32,
    pub max_dist: f32,
    pub step_factor: f32,
    pub intensity: u32,
    pub num_samples: u32,
}

impl RadialGeometry {
    pub fn new(width: u32, height: u32, intensity: u32) -> Self {
        // Integer w² + h² first, like the kernel does.
        let diag_sq = (width as u64 * width as u64 + height as u64 * height as u64) as f32;
        RadialGeometry {
            center_x: width as f32 / 2.0,
            center_y: height as f32 / 2.0,
            max_dist: (0.5 * diag_sq.sqrt()).max(1.0),
            step_factor: 0.005 * intensity as f32,
            intensity,
            num_samples: radial_sample_count(intensity),
        }
    }

    /// Sample positions for pixel `(x, y)`, unclamped, or `None` when the
    /// pixel is copied unchanged.
    pub fn samples(&self, x: u32, y: u32) -> Option<impl Iterator<Item = (i64, i64)> + '_> {
        let dx = x as f32 - self.center_x;
        let dy = y as f32 - self.center_y;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist < 1.0 || self.intensity == 0 {
            return None;
        }
        let dir_x = dx / dist;
        let dir_y = dy / dist;
        let step = (1.0 + (dist / self.max_dist) * self.step_factor * self.intensity as f32).max(1.0);

        Some((0..self.num_samples).map(move |s| {
            let offset = s as f32 * step;
            let sx = (x as f32 - dir_x * offset) as i64;
            let sy = (y as f32 - dir_y * offset) as i64;
            (sx, sy)
        }))
    }
}

/// Radial blur toward the image centre. Intensity 0 copies.
pub fn radial_blur(src: &Image, intensity: u32) -> Image {
    if intensity == 0 {
        return src.clone();
    }
    let (w, h, ch) = (src.width(), src.height(), src.channels());
    let geo = RadialGeometry::new(w, h, intensity);
    let mut dst = src.clone();

    for y in 0..h {
        for x in 0..w {
            let Some(samples) = geo.samples(x, y) else {
                continue;
            };
            let points: Vec<(i64, i64)> = samples.collect();
            for c in 0..ch {
                let sum: u32 = points
                    .iter()
                    .map(|&(sx, sy)| src.get_clamped(sx, sy, c) as u32)
                    .sum();
                dst.set(x, y, c, (sum / points.len() as u32) as u8);
            }
        }
    }
    dst
}
