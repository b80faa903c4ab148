// gpu/sample.rs — shared runner for the per-sample byte kernels.
//
// Median, motion blur and radial blur have the same shape: raw interleaved
// bytes in, bytes of the same layout out, each invocation producing four
// consecutive samples packed into one output word. This module owns that
// plumbing:
//
//   upload bytes (read-only) → allocate output of the same length
//     → bind [src, dst, params] → dispatch + barrier → download in place
//
// Each kernel source is `sample_common.wgsl` followed by the kernel body,
// with the workgroup size substituted once at construction.

use crate::config::BackendOptions;
use crate::error::Result;
use crate::gpu::buffer::{uniform_buffer, AccessMode, DeviceBuffer};
use crate::gpu::device::ComputeBackend;
use crate::gpu::program::{BindingKind, KernelArg, Kernel, Program};
use crate::gpu::ImageParams;
use crate::image::ImageLayout;

const SAMPLE_COMMON: &str = include_str!("../shaders/sample_common.wgsl");

const SAMPLE_SIGNATURE: [BindingKind; 3] = [
    BindingKind::StorageRead,      // src bytes
    BindingKind::StorageReadWrite, // dst bytes, written a word at a time
    BindingKind::Uniform,          // ImageParams
];

/// Backend, program and kernel for one per-sample filter.
///
/// Field order is the teardown order.
/// Samples packed into each output word.
const SAMPLES_PER_WORD: u64 = 4;

/// Invocations for `samples` bytes of output.
fn output_words(samples: u64) -> u64 {
    samples.div_ceil(SAMPLES_PER_WORD)
}

pub(crate) struct SampleKernel {
    kernel: Kernel,
    program: Program,
    backend: ComputeBackend,
}

impl SampleKernel {
    /// Bring up a backend and compile `body` (appended to the common
    /// header) with entry point `entry`.
    pub(crate) fn new(options: &BackendOptions, label: &str, body: &str, entry: &str) -> Result<Self> {
        let backend = ComputeBackend::with_options(options)?;
        let source = backend
            .workgroup_size
            .specialize(&format!("{SAMPLE_COMMON}\n{body}"));
        let program = Program::compile(&backend, label, &source)?;
        let kernel = program.create_kernel(&backend, entry, &SAMPLE_SIGNATURE)?;
        Ok(SampleKernel { kernel, program, backend })
    }

    /// Run the kernel over `pixels` in place. The layout must already be
    /// validated and non-empty.
    pub(crate) fn run(&self, pixels: &mut [u8], layout: ImageLayout, param: u32) -> Result<()> {
        let backend = &self.backend;
        let samples = layout.sample_count() as u64;

        let src = DeviceBuffer::upload(backend, "sample src", pixels, AccessMode::ReadOnly)?;
        let dst = DeviceBuffer::allocate(backend, "sample dst", samples, AccessMode::WriteOnly)?;
        let params = uniform_buffer(
            backend,
            "ImageParams",
            &ImageParams {
                width: layout.width,
                height: layout.height,
                channels: layout.channels,
                param,
            },
        );

        let bind_group = self.kernel.bind(
            backend,
            &[KernelArg::Buffer(&src), KernelArg::Buffer(&dst), KernelArg::Uniform(&params)],
        )?;
        let grid = backend.linear_grid(output_words(samples))?;
        backend.dispatch(&self.kernel, &bind_group, grid)?;
        dst.download(backend, pixels)?;

        src.release();
        dst.release();
        log::debug!("{} ran on {layout}", self.program.label());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_words_round_up() {
        assert_eq!(output_words(1), 1);
        assert_eq!(output_words(4), 1);
        assert_eq!(output_words(5), 2);
        // 1,100,000 single-channel pixels.
        assert_eq!(output_words(1_100_000), 275_000);
    }
}
