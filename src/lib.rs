// gpufx: GPU image filters and tiled matrix multiply on wgpu compute.
//
// The crate-root modules are plain CPU implementations and serve as the
// reference every GPU kernel in `gpu` is checked against.
//
//   image        interleaved 8-bit image buffer and layout
//   convolution  Gaussian weights, separable blur
//   median       windowed median
//   motion       horizontal motion blur
//   radial       radial (zoom) blur
//   matmul       dense matrices, CPU product, verification
//   gpu          wgpu backend, programs, buffers, GPU filters, multiplier
//   filter       `ImageFilter` trait and the `FilterKind` factory

pub mod config;
pub mod convolution;
pub mod error;
pub mod filter;
pub mod gpu;
pub mod image;
pub mod matmul;
pub mod median;
pub mod motion;
pub mod radial;

pub use crate::config::{BackendOptions, DevicePreference, DeviceProfile};
pub use crate::error::{GpuError, Result};
pub use crate::filter::{FilterKind, ImageFilter};
pub use crate::gpu::matmul::{BenchmarkReport, GpuMatrixMultiplier};
pub use crate::image::{Image, ImageLayout};
pub use crate::matmul::Matrix;
