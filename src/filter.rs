// filter.rs — the image filter capability and the filter factory.
//
// Every filter mutates an interleaved 8-bit buffer in place. A filter owns
// its own compute backend, built on construction and released on drop, so
// two filters never share device state.
//
//   let mut f = FilterKind::Median.build(3, &BackendOptions::from_env())?;
//   f.apply(&mut pixels, width, height, channels)?;
//   f.set_parameter(15);   // capped at 10, logged

use std::fmt;
use std::str::FromStr;

use crate::config::BackendOptions;
use crate::error::{GpuError, Result};
use crate::gpu::gaussian::GpuGaussianFilter;
use crate::gpu::median::GpuMedianFilter;
use crate::gpu::motion::GpuMotionBlurFilter;
use crate::gpu::radial::GpuRadialBlurFilter;

/// An in-place image filter with one integer parameter.
pub trait ImageFilter {
    /// Filter `pixels` (`width * height * channels` bytes, row-major,
    /// channel-interleaved) in place.
    ///
    /// At the filter's no-op parameter value, or for an empty image, the
    /// buffer is left untouched and no device work is done.
    ///
    /// # Errors
    /// `InvalidImageLength` if the slice does not match the dimensions;
    /// `UnsupportedChannelCount` (recoverable, buffer untouched) if the
    /// filter cannot handle this layout; any device error otherwise.
    fn apply(&self, pixels: &mut [u8], width: u32, height: u32, channels: u32) -> Result<()>;

    /// Set the parameter. Negative values clamp to 0; filter-specific
    /// ceilings apply. The device is not re-initialised.
    fn set_parameter(&mut self, value: i32);

    /// The effective parameter after clamping.
    fn parameter(&self) -> u32;

    /// Human-readable filter name.
    fn name(&self) -> &'static str;
}

/// Clamp a caller-supplied parameter to be non-negative.
#[inline]
pub fn clamp_parameter(value: i32) -> u32 {
    value.max(0) as u32
}

/// The available filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Gaussian,
    Median,
    MotionBlur,
    RadialBlur,
}

impl FilterKind {
    pub const ALL: [FilterKind; 4] = [
        FilterKind::Gaussian,
        FilterKind::Median,
        FilterKind::MotionBlur,
        FilterKind::RadialBlur,
    ];

    /// Configuration key (`gaussian`, `median`, `motion`, `radial`).
    pub fn key(self) -> &'static str {
        match self {
            FilterKind::Gaussian => "gaussian",
            FilterKind::Median => "median",
            FilterKind::MotionBlur => "motion",
            FilterKind::RadialBlur => "radial",
        }
    }

    /// Display name, identical to `ImageFilter::name` of the built filter.
    pub fn display_name(self) -> &'static str {
        match self {
            FilterKind::Gaussian => GpuGaussianFilter::NAME,
            FilterKind::Median => GpuMedianFilter::NAME,
            FilterKind::MotionBlur => GpuMotionBlurFilter::NAME,
            FilterKind::RadialBlur => GpuRadialBlurFilter::NAME,
        }
    }

    /// The channel count the filter insists on, if any.
    pub fn required_channels(self) -> Option<u32> {
        match self {
            FilterKind::Gaussian => Some(GpuGaussianFilter::CHANNELS),
            _ => None,
        }
    }

    /// Construct the filter with an initial parameter.
    pub fn build(self, parameter: i32, options: &BackendOptions) -> Result<Box<dyn ImageFilter>> {
        log::debug!("building {} with parameter {parameter}", self.display_name());
        Ok(match self {
            FilterKind::Gaussian => Box::new(GpuGaussianFilter::with_options(parameter, options)?),
            FilterKind::Median => Box::new(GpuMedianFilter::with_options(parameter, options)?),
            FilterKind::MotionBlur => Box::new(GpuMotionBlurFilter::with_options(parameter, options)?),
            FilterKind::RadialBlur => Box::new(GpuRadialBlurFilter::with_options(parameter, options)?),
        })
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for FilterKind {
    type Err = GpuError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        FilterKind::ALL
            .into_iter()
            .find(|k| k.key() == key)
            .ok_or_else(|| GpuError::UnknownFilter(s.to_string()))
    }
}
