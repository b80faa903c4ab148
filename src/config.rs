// config.rs — backend selection options.
//
// Every filter and the matrix multiplier builds its own `ComputeBackend`
// from a `BackendOptions`. The defaults pick the best GPU on the primary
// backends with the native limits; environment variables override them
// without touching call sites:
//
//   WGPU_BACKEND   vulkan | metal | dx12 | gl (comma separated, wgpu syntax)
//   GPUFX_PROFILE  native | rpi
//   GPUFX_DEVICE   gpu | cpu

use std::fmt;
use std::str::FromStr;

/// Hardware profile controlling device limits and default workgroup sizes.
///
/// `RaspberryPi` requests the VideoCore VI/VII limits even on a desktop GPU,
/// so a dispatch that would fail on the Pi fails during development too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceProfile {
    /// Use the adapter's actual hardware limits.
    #[default]
    Native,
    /// Simulate Raspberry Pi 4/5 (V3DV Vulkan): 256 invocations per workgroup.
    RaspberryPi,
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceProfile::Native => write!(f, "Native"),
            DeviceProfile::RaspberryPi => write!(f, "RaspberryPi (simulated limits)"),
        }
    }
}

impl FromStr for DeviceProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(DeviceProfile::Native),
            "rpi" | "raspberry-pi" | "raspberrypi" => Ok(DeviceProfile::RaspberryPi),
            other => Err(format!("unknown device profile `{other}`")),
        }
    }
}

/// Which class of adapter may be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Hardware GPUs first, software (CPU) adapters as a fallback.
    #[default]
    GpuFirst,
    /// Only software adapters such as llvmpipe or WARP.
    CpuOnly,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpu" | "auto" => Ok(DevicePreference::GpuFirst),
            "cpu" => Ok(DevicePreference::CpuOnly),
            other => Err(format!("unknown device preference `{other}`")),
        }
    }
}

/// Options consumed by `ComputeBackend::with_options`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendOptions {
    pub backends: wgpu::Backends,
    pub profile: DeviceProfile,
    pub preference: DevicePreference,
}

impl Default for BackendOptions {
    fn default() -> Self {
        BackendOptions {
            backends: wgpu::Backends::PRIMARY,
            profile: DeviceProfile::Native,
            preference: DevicePreference::GpuFirst,
        }
    }
}

impl BackendOptions {
    /// Defaults overridden by `WGPU_BACKEND`, `GPUFX_PROFILE` and
    /// `GPUFX_DEVICE`. Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut opts = BackendOptions::default();
        if let Some(backends) = wgpu::util::backend_bits_from_env() {
            opts.backends = backends;
        }
        if let Ok(raw) = std::env::var("GPUFX_PROFILE") {
            match raw.parse() {
                Ok(p) => opts.profile = p,
                Err(e) => log::warn!("ignoring GPUFX_PROFILE: {e}"),
            }
        }
        if let Ok(raw) = std::env::var("GPUFX_DEVICE") {
            match raw.parse() {
                Ok(p) => opts.preference = p,
                Err(e) => log::warn!("ignoring GPUFX_DEVICE: {e}"),
            }
        }
        opts
    }

    pub fn with_profile(mut self, profile: DeviceProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_preference(mut self, preference: DevicePreference) -> Self {
        self.preference = preference;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let o = BackendOptions::default();
        assert_eq!(o.backends, wgpu::Backends::PRIMARY);
        assert_eq!(o.profile, DeviceProfile::Native);
        assert_eq!(o.preference, DevicePreference::GpuFirst);
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!("native".parse::<DeviceProfile>(), Ok(DeviceProfile::Native));
        assert_eq!("RPi".parse::<DeviceProfile>(), Ok(DeviceProfile::RaspberryPi));
        assert_eq!("raspberry-pi".parse::<DeviceProfile>(), Ok(DeviceProfile::RaspberryPi));
        assert!("jetson".parse::<DeviceProfile>().is_err());
    }

    #[test]
    fn test_preference_parse() {
        assert_eq!("cpu".parse::<DevicePreference>(), Ok(DevicePreference::CpuOnly));
        assert_eq!(" GPU ".parse::<DevicePreference>(), Ok(DevicePreference::GpuFirst));
        assert!("npu".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn test_builders() {
        let o = BackendOptions::default()
            .with_profile(DeviceProfile::RaspberryPi)
            .with_preference(DevicePreference::CpuOnly);
        assert_eq!(o.profile, DeviceProfile::RaspberryPi);
        assert_eq!(o.preference, DevicePreference::CpuOnly);
    }
}
