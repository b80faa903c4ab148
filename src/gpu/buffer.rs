// gpu/buffer.rs — device buffers and host/device transfers.
//
// A `DeviceBuffer` is one storage buffer with a fixed logical length and an
// access mode describing how kernels may use it:
//
//   ReadOnly   seeded from the host, bound as `var<storage, read>`
//   WriteOnly  allocated empty, kernels write it, the host downloads it
//   ReadWrite  seeded from the host, bound either way (ping-pong buffers)
//
// Uploads seed the buffer with `mapped_at_creation`, so no staging buffer
// or queue submission is needed. Downloads copy into a MAP_READ staging
// buffer, submit, wait, and map.
//
// ALIGNMENT:
// wgpu requires buffer sizes and copy sizes to be multiples of
// COPY_BUFFER_ALIGNMENT (4 bytes). The device allocation is rounded up;
// `len()` stays the logical length, and the padding bytes are zero.
//
// ALLOCATION FAILURE:
// Sizes above the device's `max_buffer_size` or
// `max_storage_buffer_binding_size` are rejected before calling wgpu. The
// creation itself runs inside out-of-memory and validation error scopes so
// a failed allocation comes back as `BufferAllocationFailed` instead of
// reaching wgpu's uncaptured-error handler (which panics).

use std::fmt;

use wgpu::util::DeviceExt;

use crate::error::{GpuError, Result};
use crate::gpu::device::ComputeBackend;

/// How kernels may access a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    /// Kernels may read it.
    pub fn device_reads(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    /// Kernels may write it.
    pub fn device_writes(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::ReadOnly => write!(f, "read-only"),
            AccessMode::WriteOnly => write!(f, "write-only"),
            AccessMode::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// Round `value` up to the next multiple of `alignment`.
///
/// Examples:
///   align_to(0, 4)  = 0
///   align_to(5, 4)  = 8
///   align_to(8, 4)  = 8
#[inline]
pub(crate) fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Device size for a logical length: 4-byte aligned, never zero.
fn padded_size(len: u64) -> u64 {
    align_to(len.max(1), wgpu::COPY_BUFFER_ALIGNMENT)
}

/// A storage buffer resident on the device.
pub struct DeviceBuffer {
    buffer: wgpu::Buffer,
    label: String,
    len: u64,
    mode: AccessMode,
}

impl DeviceBuffer {
    /// Allocate a buffer for `bytes` and copy them host → device.
    ///
    /// A `WriteOnly` buffer only takes its size from `bytes`; the contents
    /// are not copied.
    pub fn upload(
        backend: &ComputeBackend,
        label: &str,
        bytes: &[u8],
        mode: AccessMode,
    ) -> Result<Self> {
        let len = bytes.len() as u64;
        if !mode.device_reads() {
            return Self::allocate(backend, label, len, mode);
        }

        let buffer = create_storage_buffer(backend, label, len, true)?;
        {
            let mut view = buffer.slice(..).get_mapped_range_mut();
            view[..bytes.len()].copy_from_slice(bytes);
        }
        buffer.unmap();
        log::debug!("uploaded {len} bytes to `{label}` ({mode})");

        Ok(DeviceBuffer { buffer, label: label.to_string(), len, mode })
    }

    /// `upload` for any plain-old-data slice.
    pub fn upload_pod<T: bytemuck::Pod>(
        backend: &ComputeBackend,
        label: &str,
        data: &[T],
        mode: AccessMode,
    ) -> Result<Self> {
        Self::upload(backend, label, bytemuck::cast_slice(data), mode)
    }

    /// Allocate `len` bytes without initialising them from the host.
    pub fn allocate(
        backend: &ComputeBackend,
        label: &str,
        len: u64,
        mode: AccessMode,
    ) -> Result<Self> {
        let buffer = create_storage_buffer(backend, label, len, false)?;
        Ok(DeviceBuffer { buffer, label: label.to_string(), len, mode })
    }

    /// Blocking device → host copy of the first `target.len()` bytes.
    ///
    /// # Errors
    /// `BufferTooSmall` if `target` is longer than the buffer,
    /// `ReadbackFailed` if the staging buffer cannot be mapped.
    pub fn download(&self, backend: &ComputeBackend, target: &mut [u8]) -> Result<()> {
        let requested = target.len() as u64;
        if requested > self.len {
            return Err(GpuError::BufferTooSmall {
                label: self.label.clone(),
                requested,
                available: self.len,
            });
        }
        if requested == 0 {
            return Ok(());
        }

        let copy_size = align_to(requested, wgpu::COPY_BUFFER_ALIGNMENT);
        let staging = backend.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("DeviceBuffer::download"),
            size: copy_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = backend.create_encoder("DeviceBuffer::download");
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, copy_size);
        backend.submit_and_wait(encoder);

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            // The receiver outlives the poll below.
            let _ = tx.send(r);
        });
        backend.device.poll(wgpu::Maintain::Wait);
        rx.recv().unwrap_or(Err(wgpu::BufferAsyncError))?;

        {
            let mapped = slice.get_mapped_range();
            target.copy_from_slice(&mapped[..target.len()]);
        }
        staging.unmap();
        log::debug!("downloaded {requested} bytes from `{}`", self.label);
        Ok(())
    }

    /// `download` into any plain-old-data slice.
    pub fn download_pod<T: bytemuck::Pod>(
        &self,
        backend: &ComputeBackend,
        target: &mut [T],
    ) -> Result<()> {
        self.download(backend, bytemuck::cast_slice_mut(target))
    }

    /// Free the device memory now.
    ///
    /// Dropping the buffer frees it too; this makes the point of release
    /// explicit in multi-step pipelines.
    pub fn release(self) {
        log::debug!("releasing `{}` ({} bytes)", self.label, self.len);
        self.buffer.destroy();
    }

    /// Logical length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn as_binding(&self) -> wgpu::BindingResource<'_> {
        self.buffer.as_entire_binding()
    }
}

impl fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceBuffer(`{}`, {} bytes, {})", self.label, self.len, self.mode)
    }
}

/// Small uniform buffer holding one `#[repr(C)]` parameter struct.
pub fn uniform_buffer<T: bytemuck::Pod>(backend: &ComputeBackend, label: &str, value: &T) -> wgpu::Buffer {
    backend.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(value),
        usage: wgpu::BufferUsages::UNIFORM,
    })
}

/// Check a storage allocation of `len` bytes against the device limits.
fn check_limits(limits: &wgpu::Limits, label: &str, len: u64) -> Result<()> {
    let size = padded_size(len);
    let max = limits
        .max_buffer_size
        .min(limits.max_storage_buffer_binding_size as u64);
    if size > max {
        return Err(GpuError::BufferAllocationFailed {
            label: label.to_string(),
            size,
            reason: format!("exceeds the device limit of {max} bytes per storage buffer"),
        });
    }
    Ok(())
}

fn create_storage_buffer(
    backend: &ComputeBackend,
    label: &str,
    len: u64,
    mapped_at_creation: bool,
) -> Result<wgpu::Buffer> {
    check_limits(&backend.device.limits(), label, len)?;
    let size = padded_size(len);

    backend.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    backend.device.push_error_scope(wgpu::ErrorFilter::Validation);
    let buffer = backend.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation,
    });
    let validation = pollster::block_on(backend.device.pop_error_scope());
    let oom = pollster::block_on(backend.device.pop_error_scope());

    if let Some(err) = validation.or(oom) {
        log::error!("allocation of `{label}` ({size} bytes) failed: {err}");
        return Err(GpuError::BufferAllocationFailed {
            label: label.to_string(),
            size,
            reason: err.to_string(),
        });
    }
    Ok(buffer)
}
