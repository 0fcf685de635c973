//! FFmpeg presence and version checks.

use std::process::Command;

use mediascribe_common::{codes, DomainError};

/// Oldest ffmpeg release the conversion arguments are known to work with.
pub const MIN_VERSION: (u32, u32, u32) = (4, 0, 0);

/// Locates and interrogates the ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegChecker {
    binary: String,
}

impl Default for FfmpegChecker {
    fn default() -> Self {
        let binary = std::env::var("FFMPEG_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "ffmpeg".to_string());
        Self { binary }
    }
}

impl FfmpegChecker {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// `ffmpeg -version` runs and exits cleanly.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Installed version as `X.Y.Z`.
    pub fn version(&self) -> Result<String, DomainError> {
        let output = Command::new(&self.binary)
            .arg("-version")
            .output()
            .map_err(|e| self.not_found_error(Some(e.to_string())))?;

        if !output.status.success() {
            return Err(DomainError::conversion("FFmpeg command failed")
                .with_code(codes::CV_TOOL_MISSING)
                .fatal());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_version(&stdout).ok_or_else(|| {
            DomainError::conversion("Could not parse FFmpeg version")
                .with_code(codes::CV_TOOL_MISSING)
                .fatal()
        })
    }

    /// Installed version is at least [`MIN_VERSION`].
    pub fn meets_minimum(&self) -> bool {
        self.version()
            .ok()
            .and_then(|v| version_tuple(&v))
            .is_some_and(|v| v >= MIN_VERSION)
    }

    /// Fail with a fatal `CV001` error when ffmpeg cannot be run.
    pub fn ensure_available(&self) -> Result<(), DomainError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(self.not_found_error(None))
        }
    }

    fn not_found_error(&self, detail: Option<String>) -> DomainError {
        let mut message = format!(
            "FFmpeg not found ({}). Please install FFmpeg or set FFMPEG_PATH environment variable.\nInstallation instructions for {}:\n{}",
            self.binary,
            std::env::consts::OS,
            mediascribe_platform::install_hint()
        );
        if let Some(detail) = detail {
            message.push_str(&format!("\n({detail})"));
        }
        DomainError::conversion(message)
            .with_code(codes::CV_TOOL_MISSING)
            .fatal()
    }
}

/// Extract `X.Y.Z` from `ffmpeg version X.Y.Z-...` banner output.
pub fn parse_version(output: &str) -> Option<String> {
    let rest = output.split("ffmpeg version ").nth(1)?;
    let rest = rest.trim_start_matches('n');
    let version: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let version = version.trim_end_matches('.');
    if version_tuple(version).is_some() {
        Some(version.to_string())
    } else {
        None
    }
}

fn version_tuple(version: &str) -> Option<(u32, u32, u32)> {
    let mut parts = version.split('.').map(|p| p.parse::<u32>());
    let major = parts.next()?.ok()?;
    let minor = parts.next().transpose().ok()?.unwrap_or(0);
    let patch = parts.next().transpose().ok()?.unwrap_or(0);
    Some((major, minor, patch))
}
