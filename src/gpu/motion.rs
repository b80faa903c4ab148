// gpu/motion.rs — horizontal motion blur.
//
// Any channel count. Length 0 does nothing; length 1 averages the pixel
// with itself. See `motion::motion_offsets` for the window.

use crate::config::BackendOptions;
use crate::error::Result;
use crate::filter::{clamp_parameter, ImageFilter};
use crate::gpu::sample::SampleKernel;
use crate::image::ImageLayout;

const MOTION_WGSL: &str = include_str!("../shaders/motion_blur.wgsl");

pub struct GpuMotionBlurFilter {
    core: SampleKernel,
    length: u32,
}

impl GpuMotionBlurFilter {
    pub const NAME: &'static str = "Motion Blur (Horizontal)";

    pub fn new(length: i32) -> Result<Self> {
        Self::with_options(length, &BackendOptions::from_env())
    }

    pub fn with_options(length: i32, options: &BackendOptions) -> Result<Self> {
        let core = SampleKernel::new(options, "motion_blur.wgsl", MOTION_WGSL, "motion_blur")?;
        Ok(GpuMotionBlurFilter { core, length: clamp_parameter(length) })
    }
}

impl ImageFilter for GpuMotionBlurFilter {
    fn apply(&self, pixels: &mut [u8], width: u32, height: u32, channels: u32) -> Result<()> {
        let layout = ImageLayout::new(width, height, channels);
        layout.validate(pixels.len())?;
        if self.length == 0 || layout.is_empty() {
            return Ok(());
        }
        self.core.run(pixels, layout, self.length)
    }

    fn set_parameter(&mut self, value: i32) {
        self.length = clamp_parameter(value);
    }

    fn parameter(&self) -> u32 {
        self.length
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceProfile;
    use crate::gpu::{lcg_bytes, run_gpu_test_in_subprocess};
    use crate::image::Image;
    use crate::motion::motion_blur;

    fn filter(length: i32) -> GpuMotionBlurFilter {
        GpuMotionBlurFilter::with_options(length, &BackendOptions::default()).expect("need an adapter")
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_length_zero_and_one_identity() {
        let mut f = filter(0);
        let mut px = lcg_bytes(17 * 5 * 4, 5);
        let before = px.clone();
        f.apply(&mut px, 17, 5, 4).unwrap();
        assert_eq!(px, before);
        f.set_parameter(1);
        f.apply(&mut px, 17, 5, 4).unwrap();
        assert_eq!(px, before);
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_gpu_matches_cpu() {
        let (w, h, ch) = (41u32, 11u32, 3u32);
        let src = Image::from_vec(w, h, ch, lcg_bytes((w * h * ch) as usize, 77));
        let mut f = filter(0);
        for length in [2, 5, 8] {
            f.set_parameter(length);
            let mut px = src.as_slice().to_vec();
            f.apply(&mut px, w, h, ch).unwrap();
            assert_eq!(px, motion_blur(&src, length as u32).into_vec(), "length {length}");
        }
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_very_wide_image() {
        // 1,100,000 pixels in one row: the workgroup count exceeds what a
        // single grid dimension holds.
        let w = 1_100_000u32;
        let src = Image::from_vec(w, 1, 1, lcg_bytes(w as usize, 31));
        let f = filter(3);
        let mut px = src.as_slice().to_vec();
        f.apply(&mut px, w, 1, 1).unwrap();
        assert_eq!(px, motion_blur(&src, 3).into_vec());
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_output_fits_storage_cap() {
        // 53.7 MB of RGBA under the RaspberryPi profile's 128 MiB storage
        // cap: passes only if the output buffer is no larger than the input.
        let opts = BackendOptions::default().with_profile(DeviceProfile::RaspberryPi);
        let f = GpuMotionBlurFilter::with_options(5, &opts).expect("need an adapter");
        let (w, h) = (4096u32, 3276u32);
        let src = Image::from_fn(w, h, 4, |_, y, c| (y * 3 + c * 50) as u8);
        let mut px = src.as_slice().to_vec();
        f.apply(&mut px, w, h, 4).unwrap();
        // Rows are constant, so a horizontal average changes nothing.
        assert!(px == src.as_slice());
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "requires a GPU or software adapter"]
    fn test_very_wide_image() {
        let out = run_gpu_test_in_subprocess("gpu::motion::tests::inner_very_wide_image");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a GPU or software adapter"]
    fn test_output_fits_storage_cap() {
        let out = run_gpu_test_in_subprocess("gpu::motion::tests::inner_output_fits_storage_cap");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a GPU or software adapter"]
    fn test_length_zero_and_one_identity() {
        let out = run_gpu_test_in_subprocess("gpu::motion::tests::inner_length_zero_and_one_identity");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a GPU or software adapter"]
    fn test_gpu_matches_cpu() {
        let out = run_gpu_test_in_subprocess("gpu::motion::tests::inner_gpu_matches_cpu");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }
}
