// gpu/device.rs — compute backend: adapter selection, device, queue.
//
// Responsibilities:
//   - Enumerate adapters on the configured backends, pick a platform and a
//     device within it (hardware GPU first, software adapter as fallback).
//   - Own the context (`wgpu::Device` + the `wgpu::Instance` it came from)
//     and the execution queue.
//   - Provide `WorkgroupSize` for the active `DeviceProfile` and the
//     dispatch grid for a given amount of work.
//   - Provide the barrier between dependent dispatches: `submit_and_wait`
//     blocks until that submission has completed on the device.
//
// PLATFORM AND DEVICE:
// wgpu has no "platform" object. We treat the graphics API backend of the
// first enumerated adapter (Vulkan, Metal, DX12, GL) as the platform and
// only consider adapters on that backend. Within it, adapters without
// compute shader support are dropped and the rest are ranked:
//
//   DiscreteGpu   — dedicated card                     <- best
//   IntegratedGpu — iGPU
//   VirtualGpu    — VM pass-through
//   Other         — translation layers (dzn on WSL2)
//   Cpu           — llvmpipe / WARP / SwiftShader      <- fallback
//
// DEVICE LIMITS:
// `Native` requests what the adapter supports. `RaspberryPi` requests the
// V3DV limits (never more than the adapter offers), so dispatches that
// would fail on the Pi are rejected by wgpu validation on a laptop too.
//
// DISPATCH GRID:
// Image kernels take one linear index per invocation and are launched on a
// folded 2D grid: `groups` workgroups laid out as x × y with neither side
// above `max_compute_workgroups_per_dimension` (65535 by default). A kernel
// recovers its workgroup index as `wid.y * num_workgroups.x + wid.x`, so an
// image of any width or height needs only as many workgroups as it has
// items. Dispatches run inside a validation error scope; anything wgpu
// still rejects comes back as `DispatchFailed`.
//
// TEARDOWN:
// Fields drop in declaration order. `queue` goes first, then `device`, and
// `_instance` last so no device-level object outlives its instance.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::{BackendOptions, DevicePreference, DeviceProfile};
use crate::error::{GpuError, Result};
use crate::gpu::program::Kernel;

// ---------------------------------------------------------------------------
// WorkgroupSize
// ---------------------------------------------------------------------------

/// A workgroup configuration for 2D per-pixel dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// Total invocations per workgroup (x * y).
    pub fn total(&self) -> u32 {
        self.x * self.y
    }

    /// Default per profile.
    ///
    /// - `Native`: 16×8 = 128 invocations, four 32-wide warps or two
    ///   64-wide wavefronts.
    /// - `RaspberryPi`: 8×8 = 64, well inside the V3DV limit of 256.
    pub fn for_profile(profile: DeviceProfile) -> Self {
        match profile {
            DeviceProfile::Native => WorkgroupSize { x: 16, y: 8 },
            DeviceProfile::RaspberryPi => WorkgroupSize { x: 8, y: 8 },
        }
    }

    /// Substitute the `{{WG_X}}` / `{{WG_Y}}` placeholders of a WGSL
    /// template.
    ///
    /// naga does not accept `override` expressions inside
    /// `@workgroup_size()`, so the dimensions are baked into the source text
    /// once, when the owning filter is constructed.
    pub fn specialize(&self, template: &str) -> String {
        template
            .replace("{{WG_X}}", &self.x.to_string())
            .replace("{{WG_Y}}", &self.y.to_string())
    }

    /// Workgroups needed for one invocation per item.
    ///
    /// Ceiling division, so the last workgroup may run past the end.
    /// Kernels return early when their linear index is out of range.
    pub fn groups_for(&self, items: u64) -> u64 {
        items.div_ceil(self.total() as u64)
    }
}

/// Lay out `groups` workgroups as an `x × y` grid with neither side above
/// `max_per_dim`. `x * y` may exceed `groups` by less than one row.
///
/// # Errors
/// `GridTooLarge` when `max_per_dim²` workgroups are not enough.
pub fn fold_grid(groups: u64, max_per_dim: u32) -> Result<(u32, u32, u32)> {
    let x = groups.clamp(1, max_per_dim.max(1) as u64);
    let y = groups.div_ceil(x).max(1);
    if y > max_per_dim as u64 {
        return Err(GpuError::GridTooLarge { groups, max: max_per_dim });
    }
    Ok((x as u32, y as u32, 1))
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{} ({} invocations)", self.x, self.y, self.total())
    }
}

// ---------------------------------------------------------------------------
// Adapter selection
// ---------------------------------------------------------------------------

/// Cached adapter information for logging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl From<wgpu::AdapterInfo> for AdapterInfo {
    fn from(raw: wgpu::AdapterInfo) -> Self {
        AdapterInfo {
            name: raw.name,
            vendor: raw.vendor,
            device: raw.device,
            device_type: raw.device_type,
            backend: raw.backend,
        }
    }
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// What selection needs to know about one enumerated adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterCandidate {
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub supports_compute: bool,
}

impl AdapterCandidate {
    fn of(adapter: &wgpu::Adapter) -> Self {
        let info = adapter.get_info();
        AdapterCandidate {
            backend: info.backend,
            device_type: info.device_type,
            supports_compute: adapter
                .get_downlevel_capabilities()
                .flags
                .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
        }
    }
}

/// Lower is better. Software adapters come last.
fn device_rank(device_type: wgpu::DeviceType) -> u8 {
    match device_type {
        wgpu::DeviceType::DiscreteGpu => 0,
        wgpu::DeviceType::IntegratedGpu => 1,
        wgpu::DeviceType::VirtualGpu => 2,
        wgpu::DeviceType::Other => 3,
        wgpu::DeviceType::Cpu => 4,
    }
}

/// Pick the adapter to use: the first candidate's backend is the platform;
/// within it the best-ranked compute-capable adapter wins, ties going to
/// enumeration order.
///
/// # Errors
/// `NoPlatformFound` for an empty list, `NoDeviceFound` when nothing on
/// the platform is eligible.
pub fn choose_adapter(candidates: &[AdapterCandidate], preference: DevicePreference) -> Result<usize> {
    let platform = candidates.first().ok_or(GpuError::NoPlatformFound)?.backend;

    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.backend == platform && c.supports_compute)
        .filter(|(_, c)| match preference {
            DevicePreference::GpuFirst => true,
            DevicePreference::CpuOnly => c.device_type == wgpu::DeviceType::Cpu,
        })
        .min_by_key(|(i, c)| (device_rank(c.device_type), *i))
        .map(|(i, _)| i)
        .ok_or(GpuError::NoDeviceFound { backend: platform })
}

// ---------------------------------------------------------------------------
// ComputeBackend
// ---------------------------------------------------------------------------

/// The device context and queue owned by one filter or multiplier.
///
/// Every component builds its own backend on construction and releases it
/// on drop. There is no shared singleton.
pub struct ComputeBackend {
    pub queue: wgpu::Queue,
    pub device: wgpu::Device,
    pub profile: DeviceProfile,
    pub adapter_info: AdapterInfo,
    pub workgroup_size: WorkgroupSize,
    /// Programs compiled against `workgroup_size` so far.
    compiled_programs: AtomicU32,
    /// Keeps the `wgpu::Instance` alive until `device` and `queue` are
    /// dropped. Never accessed; it only fixes the drop order.
    _instance: wgpu::Instance,
}

impl ComputeBackend {
    /// Create a backend from `BackendOptions::from_env()`.
    pub fn new() -> Result<Self> {
        Self::with_options(&BackendOptions::from_env())
    }

    /// Create a backend with explicit options.
    ///
    /// # Errors
    /// `NoPlatformFound`, `NoDeviceFound` or `DeviceRequest`.
    pub fn with_options(options: &BackendOptions) -> Result<Self> {
        pollster::block_on(Self::init_async(options))
    }

    async fn init_async(options: &BackendOptions) -> Result<Self> {
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
                | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        } else {
            wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: options.backends,
            flags,
            ..Default::default()
        });

        let mut adapters = instance.enumerate_adapters(options.backends);
        for a in &adapters {
            log::debug!("found adapter: {}", AdapterInfo::from(a.get_info()));
        }

        let candidates: Vec<AdapterCandidate> = adapters.iter().map(AdapterCandidate::of).collect();
        let chosen = choose_adapter(&candidates, options.preference)?;
        let adapter = adapters.swap_remove(chosen);
        let adapter_info = AdapterInfo::from(adapter.get_info());

        // A V3D adapter gets the RaspberryPi profile even when the caller
        // asked for Native.
        let profile = match options.profile {
            DeviceProfile::Native if adapter_info.name.to_ascii_lowercase().contains("v3d") => {
                log::info!("V3D adapter detected, using RaspberryPi profile");
                DeviceProfile::RaspberryPi
            }
            other => other,
        };

        let limits = limits_for_profile(profile, &adapter.limits());

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("gpufx"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        let workgroup_size = WorkgroupSize::for_profile(profile);
        log::info!("using {adapter_info}, profile {profile}, workgroup {workgroup_size}");

        Ok(ComputeBackend {
            queue,
            device,
            profile,
            adapter_info,
            workgroup_size,
            compiled_programs: AtomicU32::new(0),
            _instance: instance,
        })
    }

    /// Override the default workgroup size.
    ///
    /// Programs bake the size into their source when they are compiled, so
    /// it can only change before the first `Program::compile` on this
    /// backend.
    ///
    /// # Errors
    /// `WorkgroupSizeLocked` once a program exists; `WorkgroupTooLarge` if
    /// either side is zero or above its per-dimension limit, or `x * y`
    /// exceeds `max_compute_invocations_per_workgroup`.
    pub fn set_workgroup_size(&mut self, x: u32, y: u32) -> Result<()> {
        let programs = *self.compiled_programs.get_mut();
        if programs > 0 {
            return Err(GpuError::WorkgroupSizeLocked { programs });
        }
        let limits = self.device.limits();
        check_workgroup_size(x, y, &limits)?;
        self.workgroup_size = WorkgroupSize { x, y };
        Ok(())
    }

    pub(crate) fn note_program_compiled(&self) {
        self.compiled_programs.fetch_add(1, Ordering::Relaxed);
    }

    /// Folded grid giving one invocation per item at the current
    /// workgroup size.
    ///
    /// # Errors
    /// `GridTooLarge` if the items do not fit the device's grid or a
    /// 32-bit invocation index.
    pub fn linear_grid(&self, items: u64) -> Result<(u32, u32, u32)> {
        let max = self.device.limits().max_compute_workgroups_per_dimension;
        let groups = self.workgroup_size.groups_for(items);
        if items > u32::MAX as u64 {
            return Err(GpuError::GridTooLarge { groups, max });
        }
        fold_grid(groups, max)
    }

    pub fn create_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    /// Submit `encoder` and block until the device has finished it.
    ///
    /// This is the barrier between dependent dispatches: nothing recorded
    /// after this call can observe a partially written buffer.
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) {
        let index = self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::Maintain::WaitForSubmissionIndex(index));
    }

    /// Record one compute pass running `kernel` over `groups` workgroups,
    /// submit it, and wait for completion.
    ///
    /// # Errors
    /// `DispatchFailed` with wgpu's validation message.
    pub fn dispatch(
        &self,
        kernel: &Kernel,
        bind_group: &wgpu::BindGroup,
        groups: (u32, u32, u32),
    ) -> Result<()> {
        log::debug!("dispatch {} {:?}", kernel.name(), groups);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self.create_encoder(kernel.name());
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.name()),
                timestamp_writes: None,
            });
            pass.set_pipeline(kernel.pipeline());
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(groups.0, groups.1, groups.2);
        }
        self.submit_and_wait(encoder);

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            log::error!("dispatch of {} {groups:?} failed: {err}", kernel.name());
            return Err(GpuError::DispatchFailed {
                kernel: kernel.name().to_string(),
                reason: err.to_string(),
            });
        }
        Ok(())
    }
}

impl Drop for ComputeBackend {
    fn drop(&mut self) {
        log::debug!("releasing compute backend on {}", self.adapter_info);
    }
}

impl fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ComputeBackend {{ adapter: {}, profile: {}, workgroup: {} }}",
            self.adapter_info, self.profile, self.workgroup_size
        )
    }
}

// ============================================================
// Limits helpers
// ============================================================

fn check_workgroup_size(x: u32, y: u32, limits: &wgpu::Limits) -> Result<()> {
    let max = limits.max_compute_invocations_per_workgroup;
    let total = x.checked_mul(y).unwrap_or(u32::MAX);
    if total == 0
        || total > max
        || x > limits.max_compute_workgroup_size_x
        || y > limits.max_compute_workgroup_size_y
    {
        return Err(GpuError::WorkgroupTooLarge { total, max });
    }
    Ok(())
}

/// Limits to request for `profile`, never above what the adapter supports.
fn limits_for_profile(profile: DeviceProfile, supported: &wgpu::Limits) -> wgpu::Limits {
    match profile {
        DeviceProfile::Native => supported.clone(),

        DeviceProfile::RaspberryPi => {
            let rpi = wgpu::Limits {
                // VideoCore VI/VII: vulkaninfo reports 256 max invocations.
                max_compute_invocations_per_workgroup: 256,
                max_compute_workgroup_size_x: 256,
                max_compute_workgroup_size_y: 256,
                max_compute_workgroup_size_z: 64,
                // 128 MiB of the Pi's shared memory for storage buffers.
                max_storage_buffer_binding_size: 128 << 20,
                max_buffer_size: 128 << 20,
                ..supported.clone()
            };
            wgpu::Limits {
                max_compute_invocations_per_workgroup: rpi
                    .max_compute_invocations_per_workgroup
                    .min(supported.max_compute_invocations_per_workgroup),
                max_compute_workgroup_size_x: rpi
                    .max_compute_workgroup_size_x
                    .min(supported.max_compute_workgroup_size_x),
                max_compute_workgroup_size_y: rpi
                    .max_compute_workgroup_size_y
                    .min(supported.max_compute_workgroup_size_y),
                max_compute_workgroup_size_z: rpi
                    .max_compute_workgroup_size_z
                    .min(supported.max_compute_workgroup_size_z),
                max_storage_buffer_binding_size: rpi
                    .max_storage_buffer_binding_size
                    .min(supported.max_storage_buffer_binding_size),
                max_buffer_size: rpi.max_buffer_size.min(supported.max_buffer_size),
                ..rpi
            }
        }
    }
}

// ============================================================
// Tests
// ============================================================
