//! Compute device detection for local inference.
//!
//! `auto` prefers Metal on Apple Silicon, then CUDA, then CPU. Explicit
//! accelerator requests fall back to CPU with a warning when the
//! accelerator is not present.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use mediascribe_common::MediascribeError;

/// Cached result of auto-detection.
static BEST_DEVICE: OnceLock<ResolvedDevice> = OnceLock::new();

/// Device preference as written in configuration or on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl std::str::FromStr for DevicePreference {
    type Err = MediascribeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "automatic" | "" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "metal" | "mps" => Ok(DevicePreference::Metal),
            other => Err(MediascribeError::config(format!(
                "Unknown device preference: {other} (expected auto, cpu, cuda or metal)"
            ))),
        }
    }
}

/// A concrete device a model is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedDevice {
    Cpu,
    Cuda,
    Metal,
}

impl ResolvedDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvedDevice::Cpu => "cpu",
            ResolvedDevice::Cuda => "cuda",
            ResolvedDevice::Metal => "metal",
        }
    }

    pub fn is_accelerated(&self) -> bool {
        !matches!(self, ResolvedDevice::Cpu)
    }
}

impl fmt::Display for ResolvedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device detection and selection.
pub struct DeviceManager;

impl DeviceManager {
    /// Resolve a preference to the device that will actually be used.
    pub fn resolve(preference: DevicePreference) -> ResolvedDevice {
        match preference {
            DevicePreference::Auto => Self::best_device(),
            DevicePreference::Cpu => ResolvedDevice::Cpu,
            DevicePreference::Cuda => {
                if Self::is_cuda_available() {
                    ResolvedDevice::Cuda
                } else {
                    warn!("CUDA requested but not available, falling back to CPU");
                    ResolvedDevice::Cpu
                }
            }
            DevicePreference::Metal => {
                if Self::is_metal_available() {
                    ResolvedDevice::Metal
                } else {
                    warn!("Metal requested but not available, falling back to CPU");
                    ResolvedDevice::Cpu
                }
            }
        }
    }

    /// Best available device (cached after the first probe).
    pub fn best_device() -> ResolvedDevice {
        *BEST_DEVICE.get_or_init(Self::detect_best_device)
    }

    fn detect_best_device() -> ResolvedDevice {
        info!("Detecting best available compute device...");

        if Self::is_metal_available() {
            info!("Selected Metal for inference");
            return ResolvedDevice::Metal;
        }

        if Self::is_cuda_available() {
            info!("Selected CUDA for inference");
            return ResolvedDevice::Cuda;
        }

        info!("Using CPU for inference (no GPU acceleration available)");
        ResolvedDevice::Cpu
    }

    /// Apple Silicon exposes Metal to every process.
    pub fn is_metal_available() -> bool {
        cfg!(all(target_os = "macos", target_arch = "aarch64"))
    }

    /// NVIDIA driver present on the host.
    pub fn is_cuda_available() -> bool {
        if std::path::Path::new("/proc/driver/nvidia/version").exists() {
            debug!("NVIDIA kernel driver detected");
            return true;
        }
        let found = std::process::Command::new("nvidia-smi")
            .arg("-L")
            .output()
            .map(|o| o.status.success() && !o.stdout.is_empty())
            .unwrap_or(false);
        debug!(found, "nvidia-smi probe");
        found
    }
}
