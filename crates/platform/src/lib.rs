//! MediaScribe Platform Probing
//!
//! Answers questions about the host the pipeline runs on:
//! which compute device local models should use, and whether the
//! external tools and credentials each backend needs are present.

pub mod capabilities;
pub mod device;
pub mod memory;

pub use capabilities::{
    all_required_available, check_capabilities, install_hint, print_capability_report,
    requirement_issues, Capability, CapabilityInputs,
};
pub use device::{DeviceManager, DevicePreference, ResolvedDevice};
pub use memory::{
    check_memory_threshold, log_memory_warning, memory_recommendations, process_memory_mb,
    system_memory_mb, MemoryRecommendations, DEFAULT_MEMORY_THRESHOLD_MB,
};

/// Check whether a command is resolvable on `PATH` (or is an existing path).
pub fn command_exists(cmd: &str) -> bool {
    if cmd.contains(std::path::MAIN_SEPARATOR) {
        return std::path::Path::new(cmd).is_file();
    }
    // Passed as `$1` so the name is never parsed as shell code.
    std::process::Command::new("sh")
        .arg("-c")
        .arg(r#"command -v "$1" >/dev/null 2>&1"#)
        .arg("sh")
        .arg(cmd)
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
