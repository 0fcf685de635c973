//! Process and host memory readings.
//!
//! Readings come from `/proc` on Linux and `sysctl` on macOS. Other
//! platforms report `None` and callers skip memory-based checks.

use serde::Serialize;

use crate::device::ResolvedDevice;

/// Resident memory above which a warning is logged by default, in MB.
pub const DEFAULT_MEMORY_THRESHOLD_MB: f64 = 8192.0;

/// Resident set size of this process, in MB.
pub fn process_memory_mb() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_kb_field(&status, "VmRSS:").map(kb_to_mb)
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Physical memory installed on the host, in MB.
pub fn system_memory_mb() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_kb_field(&meminfo, "MemTotal:").map(kb_to_mb)
    }

    #[cfg(target_os = "macos")]
    {
        let output = std::process::Command::new("sysctl")
            .args(["-n", "hw.memsize"])
            .output()
            .ok()?;
        let bytes: u64 = String::from_utf8_lossy(&output.stdout).trim().parse().ok()?;
        Some(bytes as f64 / 1024.0 / 1024.0)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

/// True when resident memory is known and above `threshold_mb`.
pub fn check_memory_threshold(threshold_mb: f64) -> bool {
    process_memory_mb().is_some_and(|mb| mb > threshold_mb)
}

/// Warn when resident memory is above `threshold_mb`.
pub fn log_memory_warning(threshold_mb: f64) {
    if let Some(current) = process_memory_mb().filter(|mb| *mb > threshold_mb) {
        tracing::warn!(
            memory_mb = current,
            threshold_mb,
            "High memory usage detected"
        );
    }
}

/// Sizing guidance for running local models on a device class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRecommendations {
    pub min_ram_gb: u32,
    pub recommended_ram_gb: u32,
    pub model_cache_mb: u32,
    pub chunk_processing_mb: u32,
    pub gpu_vram_gb: Option<u32>,
}

/// Recommendations for `device`. Unified-memory and CPU-only hosts need more RAM.
pub fn memory_recommendations(device: ResolvedDevice) -> MemoryRecommendations {
    let base = MemoryRecommendations {
        min_ram_gb: 4,
        recommended_ram_gb: 8,
        model_cache_mb: 2048,
        chunk_processing_mb: 1024,
        gpu_vram_gb: None,
    };
    match device {
        ResolvedDevice::Metal => MemoryRecommendations {
            recommended_ram_gb: 16,
            model_cache_mb: 4096,
            ..base
        },
        ResolvedDevice::Cuda => MemoryRecommendations {
            model_cache_mb: 1024,
            gpu_vram_gb: Some(4),
            ..base
        },
        ResolvedDevice::Cpu => MemoryRecommendations {
            recommended_ram_gb: 16,
            model_cache_mb: 3072,
            ..base
        },
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_kb_field(text: &str, key: &str) -> Option<u64> {
    text.lines()
        .find(|line| line.starts_with(key))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse().ok())
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn kb_to_mb(kb: u64) -> f64 {
    kb as f64 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kb_field_reads_proc_layout() {
        let status = "Name:\tmediascribe\nVmSize:\t  204800 kB\nVmRSS:\t   51200 kB\n";
        assert_eq!(parse_kb_field(status, "VmRSS:"), Some(51_200));
        assert_eq!(parse_kb_field(status, "VmSwap:"), None);
        assert_eq!(kb_to_mb(51_200), 50.0);
    }

    #[test]
    fn test_recommendations_by_device() {
        let cpu = memory_recommendations(ResolvedDevice::Cpu);
        assert_eq!(cpu.recommended_ram_gb, 16);
        assert_eq!(cpu.model_cache_mb, 3072);

        let cuda = memory_recommendations(ResolvedDevice::Cuda);
        assert_eq!(cuda.gpu_vram_gb, Some(4));
        assert_eq!(cuda.recommended_ram_gb, 8);

        let metal = memory_recommendations(ResolvedDevice::Metal);
        assert_eq!(metal.model_cache_mb, 4096);
        assert_eq!(metal.min_ram_gb, 4);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_readings_are_available() {
        assert!(process_memory_mb().is_some_and(|mb| mb > 0.0));
        assert!(system_memory_mb().is_some_and(|mb| mb > 0.0));
        assert!(!check_memory_threshold(f64::MAX));
    }
}
