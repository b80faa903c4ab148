// gpu/program.rs — WGSL programs and callable kernels.
//
// A `Program` is one compiled shader module. Its source may hold several
// compute entry points (the Gaussian program has `blur_pass` and
// `transpose_image`). A `Kernel` is one entry point turned into a compute
// pipeline with an explicit bind group layout built from a declared
// signature:
//
//   let program = Program::compile(&backend, "median.wgsl", &source)?;
//   let kernel  = program.create_kernel(&backend, "median_filter", &[
//       BindingKind::StorageRead,       // @binding(0) src
//       BindingKind::StorageReadWrite,  // @binding(1) dst
//       BindingKind::Uniform,           // @binding(2) params
//   ])?;
//   let bind_group = kernel.bind(&backend, &[
//       KernelArg::Buffer(&src), KernelArg::Buffer(&dst), KernelArg::Uniform(&params),
//   ])?;
//
// Arguments are positional: position i is `@binding(i)` of `@group(0)`.
// `bind` checks arity and that each buffer's access mode fits its slot, so
// a write-only buffer can never be bound where the kernel reads.
//
// COMPILE DIAGNOSTICS:
// Shader and pipeline creation run inside a validation error scope. A
// failure is returned as `KernelBuildFailed` carrying naga's full
// diagnostic (source line, caret, message) and is also logged at `error`.

use std::fmt;

use crate::error::{GpuError, Result};
use crate::gpu::buffer::DeviceBuffer;
use crate::gpu::device::ComputeBackend;

/// The kind of resource a kernel expects at one binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// `var<storage, read>`
    StorageRead,
    /// `var<storage, read_write>`
    StorageReadWrite,
    /// `var<uniform>`
    Uniform,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::StorageRead => write!(f, "readable storage buffer"),
            BindingKind::StorageReadWrite => write!(f, "writable storage buffer"),
            BindingKind::Uniform => write!(f, "uniform buffer"),
        }
    }
}

impl BindingKind {
    fn layout_entry(self, binding: u32) -> wgpu::BindGroupLayoutEntry {
        let ty = match self {
            BindingKind::StorageRead => wgpu::BufferBindingType::Storage { read_only: true },
            BindingKind::StorageReadWrite => wgpu::BufferBindingType::Storage { read_only: false },
            BindingKind::Uniform => wgpu::BufferBindingType::Uniform,
        };
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }
}

/// One positional kernel argument.
#[derive(Clone, Copy)]
pub enum KernelArg<'a> {
    Buffer(&'a DeviceBuffer),
    Uniform(&'a wgpu::Buffer),
}

impl KernelArg<'_> {
    fn describe(&self) -> String {
        match self {
            KernelArg::Buffer(b) => format!("{} buffer `{}`", b.mode(), b.label()),
            KernelArg::Uniform(_) => "uniform buffer".to_string(),
        }
    }

    fn fits(&self, kind: BindingKind) -> bool {
        match (kind, self) {
            (BindingKind::StorageRead, KernelArg::Buffer(b)) => b.mode().device_reads(),
            (BindingKind::StorageReadWrite, KernelArg::Buffer(b)) => b.mode().device_writes(),
            (BindingKind::Uniform, KernelArg::Uniform(_)) => true,
            _ => false,
        }
    }

    fn resource(&self) -> wgpu::BindingResource<'_> {
        match self {
            KernelArg::Buffer(b) => b.as_binding(),
            KernelArg::Uniform(u) => u.as_entire_binding(),
        }
    }
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

/// A compiled WGSL shader module.
pub struct Program {
    module: wgpu::ShaderModule,
    label: String,
    entry_points: Vec<String>,
}

impl Program {
    /// Compile `source`.
    ///
    /// # Errors
    /// `KernelBuildFailed` with the compiler log.
    pub fn compile(backend: &ComputeBackend, label: &str, source: &str) -> Result<Self> {
        backend.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = backend.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(err) = pollster::block_on(backend.device.pop_error_scope()) {
            let log = err.to_string();
            log::error!("{label} failed to compile:\n{log}");
            return Err(GpuError::KernelBuildFailed { program: label.to_string(), log });
        }

        backend.note_program_compiled();
        let entry_points = compute_entry_points(source);
        log::debug!("compiled {label}: entry points {entry_points:?}");
        Ok(Program { module, label: label.to_string(), entry_points })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Names of the compute entry points in the source.
    pub fn entry_points(&self) -> &[String] {
        &self.entry_points
    }

    /// Create the kernel for entry point `name`.
    ///
    /// # Errors
    /// `KernelNotFound` if there is no such entry point;
    /// `KernelBuildFailed` if the pipeline does not validate against the
    /// signature.
    pub fn create_kernel(
        &self,
        backend: &ComputeBackend,
        name: &str,
        signature: &[BindingKind],
    ) -> Result<Kernel> {
        if !self.entry_points.iter().any(|e| e == name) {
            return Err(GpuError::KernelNotFound {
                program: self.label.clone(),
                name: name.to_string(),
            });
        }

        let entries: Vec<wgpu::BindGroupLayoutEntry> = signature
            .iter()
            .enumerate()
            .map(|(i, kind)| kind.layout_entry(i as u32))
            .collect();

        backend.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bgl = backend.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(name),
            entries: &entries,
        });
        let layout = backend.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(name),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });
        let pipeline = backend.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(name),
            layout: Some(&layout),
            module: &self.module,
            entry_point: name,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        if let Some(err) = pollster::block_on(backend.device.pop_error_scope()) {
            let log = err.to_string();
            log::error!("{}::{name} failed to build:\n{log}", self.label);
            return Err(GpuError::KernelBuildFailed {
                program: format!("{}::{name}", self.label),
                log,
            });
        }

        Ok(Kernel {
            pipeline,
            bgl,
            name: name.to_string(),
            signature: signature.to_vec(),
        })
    }
}

/// Scan WGSL text for `@compute ... fn <name>(`.
fn compute_entry_points(source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = source;
    while let Some(at) = rest.find("@compute") {
        rest = &rest[at + "@compute".len()..];
        let Some(fn_at) = rest.find("fn ") else {
            break;
        };
        rest = &rest[fn_at + "fn ".len()..];
        let name: String = rest
            .trim_start()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if !name.is_empty() {
            names.push(name);
        }
    }
    names
}

// ---------------------------------------------------------------------------
// Kernel
// ---------------------------------------------------------------------------

/// One compute entry point, ready to dispatch.
pub struct Kernel {
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
    name: String,
    signature: Vec<BindingKind>,
}

impl Kernel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &[BindingKind] {
        &self.signature
    }

    pub(crate) fn pipeline(&self) -> &wgpu::ComputePipeline {
        &self.pipeline
    }

    /// Bind `args` positionally.
    ///
    /// # Errors
    /// `KernelArgumentMismatch` on wrong arity or a buffer whose kind or
    /// access mode does not fit its slot; `DispatchFailed` if wgpu rejects
    /// the bind group.
    pub fn bind(&self, backend: &ComputeBackend, args: &[KernelArg<'_>]) -> Result<wgpu::BindGroup> {
        check_args(&self.name, &self.signature, args)?;

        let entries: Vec<wgpu::BindGroupEntry> = args
            .iter()
            .enumerate()
            .map(|(i, arg)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: arg.resource(),
            })
            .collect();

        backend.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group = backend.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&self.name),
            layout: &self.bgl,
            entries: &entries,
        });
        if let Some(err) = pollster::block_on(backend.device.pop_error_scope()) {
            log::error!("bind group for {} rejected: {err}", self.name);
            return Err(GpuError::DispatchFailed {
                kernel: self.name.clone(),
                reason: err.to_string(),
            });
        }
        Ok(bind_group)
    }
}

fn check_args(kernel: &str, signature: &[BindingKind], args: &[KernelArg<'_>]) -> Result<()> {
    if args.len() != signature.len() {
        return Err(GpuError::KernelArgumentMismatch {
            kernel: kernel.to_string(),
            index: args.len().min(signature.len()),
            expected: format!("{} arguments", signature.len()),
            found: format!("{} arguments", args.len()),
        });
    }
    for (index, (kind, arg)) in signature.iter().zip(args).enumerate() {
        if !arg.fits(*kind) {
            return Err(GpuError::KernelArgumentMismatch {
                kernel: kernel.to_string(),
                index,
                expected: kind.to_string(),
                found: arg.describe(),
            });
        }
    }
    Ok(())
}
