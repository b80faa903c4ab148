// gpu/radial.rs — radial (zoom) blur toward the image centre.
//
// Any channel count. Intensity 0 does nothing. Pixels within distance 1 of
// the centre are copied. The sampling geometry is documented in radial.rs.

use crate::config::BackendOptions;
use crate::error::Result;
use crate::filter::{clamp_parameter, ImageFilter};
use crate::gpu::sample::SampleKernel;
use crate::image::ImageLayout;

const RADIAL_WGSL: &str = include_str!("../shaders/radial_blur.wgsl");

pub struct GpuRadialBlurFilter {
    core: SampleKernel,
    intensity: u32,
}

impl GpuRadialBlurFilter {
    pub const NAME: &'static str = "Radial Blur";

    pub fn new(intensity: i32) -> Result<Self> {
        Self::with_options(intensity, &BackendOptions::from_env())
    }

    pub fn with_options(intensity: i32, options: &BackendOptions) -> Result<Self> {
        let core = SampleKernel::new(options, "radial_blur.wgsl", RADIAL_WGSL, "radial_blur")?;
        Ok(GpuRadialBlurFilter { core, intensity: clamp_parameter(intensity) })
    }
}

impl ImageFilter for GpuRadialBlurFilter {
    fn apply(&self, pixels: &mut [u8], width: u32, height: u32, channels: u32) -> Result<()> {
        let layout = ImageLayout::new(width, height, channels);
        layout.validate(pixels.len())?;
        if self.intensity == 0 || layout.is_empty() {
            return Ok(());
        }
        self.core.run(pixels, layout, self.intensity)
    }

    fn set_parameter(&mut self, value: i32) {
        self.intensity = clamp_parameter(value);
    }

    fn parameter(&self) -> u32 {
        self.intensity
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
