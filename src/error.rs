// error.rs — crate-wide error type.
//
// Every fallible operation in the engine returns `Result<T>`. Device setup,
// kernel compilation and buffer allocation failures are fatal to the
// operation that raised them. `UnsupportedChannelCount` is the one kind a
// caller may recover from: the filter refuses to run and leaves the pixels
// untouched.

use thiserror::Error;

/// Errors raised by the compute backend, kernels, buffers and filters.
#[derive(Debug, Error)]
pub enum GpuError {
    /// No graphics backend (Vulkan, Metal, DX12, GL) exposes any adapter.
    #[error("no compute platform found: no adapters are exposed by any enabled backend")]
    NoPlatformFound,

    /// The platform exists but offers no adapter capable of compute work.
    #[error("no compute-capable device found on backend {backend:?}")]
    NoDeviceFound { backend: wgpu::Backend },

    /// wgpu refused to create the logical device.
    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// Shader or pipeline compilation failed. `log` holds the full
    /// compiler diagnostic.
    #[error("kernel build failed for program `{program}`:\n{log}")]
    KernelBuildFailed { program: String, log: String },

    /// The program has no `@compute` entry point with this name.
    #[error("kernel `{name}` not found in program `{program}`")]
    KernelNotFound { program: String, name: String },

    /// A positional kernel argument does not fit the declared binding.
    #[error("kernel `{kernel}` argument {index}: expected {expected}, got {found}")]
    KernelArgumentMismatch {
        kernel: String,
        index: usize,
        expected: String,
        found: String,
    },

    /// The device could not back a buffer of the requested size.
    #[error("buffer allocation failed for `{label}` ({size} bytes): {reason}")]
    BufferAllocationFailed {
        label: String,
        size: u64,
        reason: String,
    },

    /// A download asked for more bytes than the device buffer holds.
    #[error("buffer `{label}` holds {available} bytes, {requested} requested")]
    BufferTooSmall {
        label: String,
        requested: u64,
        available: u64,
    },

    /// Mapping a staging buffer for readback failed.
    #[error("device to host readback failed: {0}")]
    ReadbackFailed(#[from] wgpu::BufferAsyncError),

    /// The filter requires a specific channel layout.
    #[error("{filter} requires {required} channels, got {found}; image left unmodified")]
    UnsupportedChannelCount {
        filter: &'static str,
        required: u32,
        found: u32,
    },

    /// The pixel slice length does not equal width * height * channels.
    #[error("pixel buffer holds {actual} bytes but {width}x{height}x{channels} needs {expected}")]
    InvalidImageLength {
        width: u32,
        height: u32,
        channels: u32,
        expected: usize,
        actual: usize,
    },

    /// Inner dimensions of a matrix product do not agree.
    #[error("cannot multiply {a_rows}x{a_cols} by {b_rows}x{b_cols}")]
    DimensionMismatch {
        a_rows: usize,
        a_cols: usize,
        b_rows: usize,
        b_cols: usize,
    },

    /// A matrix was built with a zero dimension or the wrong data length.
    #[error("invalid matrix shape {rows}x{cols} for {len} elements")]
    InvalidMatrixShape { rows: usize, cols: usize, len: usize },

    /// Requested workgroup size is empty or exceeds the profile's limits.
    #[error("workgroup size {total} is outside 1..={max} invocations or a per-dimension limit")]
    WorkgroupTooLarge { total: u32, max: u32 },

    /// The workgroup size is baked into compiled kernels and can no longer
    /// change.
    #[error("workgroup size is fixed once kernels are compiled ({programs} programs)")]
    WorkgroupSizeLocked { programs: u32 },

    /// The work does not fit the device's dispatch grid even when folded.
    #[error("{groups} workgroups do not fit a {max}x{max} dispatch grid")]
    GridTooLarge { groups: u64, max: u32 },

    /// wgpu rejected a bind group or a dispatch.
    #[error("dispatch of `{kernel}` failed: {reason}")]
    DispatchFailed { kernel: String, reason: String },

    /// No filter is registered under this name.
    #[error("unknown filter `{0}` (expected gaussian, median, motion or radial)")]
    UnknownFilter(String),
}

impl GpuError {
    /// True when the caller can carry on: the operation declined to run
    /// and left its input untouched.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GpuError::UnsupportedChannelCount { .. })
    }
}

pub type Result<T> = std::result::Result<T, GpuError>;
