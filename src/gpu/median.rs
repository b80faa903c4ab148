// gpu/median.rs — windowed median filter.
//
// Any channel count. Radius is capped at `MAX_MEDIAN_RADIUS` (the kernel's
// private window holds 441 samples); a larger request is clamped with a
// warning. Radius 0 still dispatches and reproduces the input.

use crate::config::BackendOptions;
use crate::error::Result;
use crate::filter::{clamp_parameter, ImageFilter};
use crate::gpu::sample::SampleKernel;
use crate::image::ImageLayout;
use crate::median::effective_radius;

const MEDIAN_WGSL: &str = include_str!("../shaders/median.wgsl");

pub struct GpuMedianFilter {
    core: SampleKernel,
    radius: u32,
}

impl GpuMedianFilter {
    pub const NAME: &'static str = "Median Filter";

    pub fn new(radius: i32) -> Result<Self> {
        Self::with_options(radius, &BackendOptions::from_env())
    }

    pub fn with_options(radius: i32, options: &BackendOptions) -> Result<Self> {
        let core = SampleKernel::new(options, "median.wgsl", MEDIAN_WGSL, "median_filter")?;
        Ok(GpuMedianFilter {
            core,
            radius: effective_radius(clamp_parameter(radius)),
        })
    }
}

impl ImageFilter for GpuMedianFilter {
    fn apply(&self, pixels: &mut [u8], width: u32, height: u32, channels: u32) -> Result<()> {
        let layout = ImageLayout::new(width, height, channels);
        layout.validate(pixels.len())?;
        if layout.is_empty() {
            return Ok(());
        }
        log::debug!("{} r={} on {layout}", Self::NAME, self.radius);
        self.core.run(pixels, layout, self.radius)
    }

    fn set_parameter(&mut self, value: i32) {
        self.radius = effective_radius(clamp_parameter(value));
    }

    fn parameter(&self) -> u32 {
        self.radius
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{lcg_bytes, run_gpu_test_in_subprocess};
    use crate::image::Image;
    use crate::median::median_filter;

    fn filter(radius: i32) -> GpuMedianFilter {
        GpuMedianFilter::with_options(radius, &BackendOptions::default()).expect("need an adapter")
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_radius_zero_identity() {
        let f = filter(0);
        let mut px = lcg_bytes(13 * 9 * 3, 3);
        let before = px.clone();
        f.apply(&mut px, 13, 9, 3).unwrap();
        assert_eq!(px, before);
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_radius_capped() {
        let mut f = filter(15);
        assert_eq!(f.parameter(), 10);
        let mut a = lcg_bytes(30 * 30, 4);
        let mut b = a.clone();
        f.apply(&mut a, 30, 30, 1).unwrap();
        f.set_parameter(10);
        f.apply(&mut b, 30, 30, 1).unwrap();
        assert_eq!(a, b);
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_gpu_matches_cpu() {
        let (w, h, ch) = (29u32, 19u32, 3u32);
        let src = Image::from_vec(w, h, ch, lcg_bytes((w * h * ch) as usize, 99));
        let f = filter(2);
        let mut px = src.as_slice().to_vec();
        f.apply(&mut px, w, h, ch).unwrap();
        assert_eq!(px, median_filter(&src, 2).into_vec());
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "requires a GPU or software adapter"]
    fn test_radius_zero_identity() {
        let out = run_gpu_test_in_subprocess("gpu::median::tests::inner_radius_zero_identity");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a GPU or software adapter"]
    fn test_radius_capped() {
        let out = run_gpu_test_in_subprocess("gpu::median::tests::inner_radius_capped");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a GPU or software adapter"]
    fn test_gpu_matches_cpu() {
        let out = run_gpu_test_in_subprocess("gpu::median::tests::inner_gpu_matches_cpu");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }
}
