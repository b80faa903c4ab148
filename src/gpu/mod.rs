// gpu/mod.rs — wgpu compute layer.
//
// The CPU implementations in the crate root (convolution, median, motion,
// radial, matmul) are the reference. Every kernel here is validated against
// its CPU counterpart.
//
// Layering, leaf first:
//
//   device   ComputeBackend: adapter selection, device, queue, barrier
//   program  Program / Kernel: WGSL compilation, entry points, binding checks
//   buffer   DeviceBuffer: allocation, upload, download, release
//   sample   shared per-sample byte kernel runner (median, motion, radial)
//   gaussian, median, motion, radial, matmul: the filters and multiplier
//
// Each filter owns its backend, program and kernels. Field order in the
// owning struct is kernels, program, backend, so teardown runs kernels →
// program → queue → context.

pub mod buffer;
pub mod device;
pub mod gaussian;
pub mod matmul;
pub mod median;
pub mod motion;
pub mod program;
pub mod radial;
mod sample;

/// Kernel parameters shared by every image kernel.
///
/// Layout must match `ImageParams` in the WGSL sources:
///   offset  0: width    (u32)
///   offset  4: height   (u32)
///   offset  8: channels (u32)
///   offset 12: param    (u32)  radius, length or intensity
///   total:  16 bytes
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ImageParams {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub param: u32,
}

// ---- GPU test harness ------------------------------------------------------
//
// Some drivers (dzn on WSL2 in particular) crash during process exit once a
// device has been created. GPU tests therefore run in a child `cargo test`
// process: the `inner_*` test does the real work and prints "GPU_TEST_OK"
// as its last line, and the outer `test_*` wrapper only checks for that
// token, not the exit status.

/// Spawn a child `cargo test` running exactly `test_name` and return its
/// combined stdout and stderr.
#[cfg(test)]
pub(crate) fn run_gpu_test_in_subprocess(test_name: &str) -> String {
    let output = std::process::Command::new("cargo")
        .args(["test", "--lib", "--", test_name, "--exact", "--ignored", "--nocapture"])
        .output()
        .unwrap_or_else(|e| panic!("failed to spawn subprocess for {test_name}: {e}"));

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    print!("{stdout}");
    eprint!("{stderr}");
    stdout + &stderr
}

/// Deterministic pseudo-random bytes for GPU/CPU comparison tests.
#[cfg(test)]
pub(crate) fn lcg_bytes(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            (state >> 24) as u8
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_params_layout() {
        assert_eq!(std::mem::size_of::<ImageParams>(), 16);
        let p = ImageParams { width: 1, height: 2, channels: 3, param: 4 };
        let bytes = bytemuck::bytes_of(&p);
        assert_eq!(&bytes[8..12], &3u32.to_ne_bytes());
    }

    #[test]
    fn test_lcg_is_deterministic() {
        assert_eq!(lcg_bytes(16, 7), lcg_bytes(16, 7));
        assert_ne!(lcg_bytes(16, 7), lcg_bytes(16, 8));
    }
}
