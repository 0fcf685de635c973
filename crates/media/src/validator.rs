//! Audio validation: is the file decodable and within sane bounds?

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use mediascribe_common::ValidationConfig;

use crate::audio;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    /// Usable, but suspicious (odd duration, unexpected sample rate).
    Warning,
    /// Unreadable or missing.
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioValidationResult {
    pub status: ValidationStatus,
    pub file_path: PathBuf,
    pub duration: f64,
    pub sample_rate: u32,
    pub channels: usize,
    pub error_message: Option<String>,
}

impl AudioValidationResult {
    pub fn error(path: &Path, message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Error,
            file_path: path.to_path_buf(),
            duration: 0.0,
            sample_rate: 0,
            channels: 0,
            error_message: Some(message.into()),
        }
    }
}

/// Checks an audio file before it is handed to a backend.
pub trait AudioValidator: Send + Sync {
    fn validate(&self, path: &Path) -> AudioValidationResult;

    fn validate_many(&self, paths: &[PathBuf]) -> Vec<AudioValidationResult> {
        paths.iter().map(|p| self.validate(p)).collect()
    }
}

/// Validator backed by [`audio::probe`].
#[derive(Debug, Clone)]
pub struct ProbeAudioValidator {
    min_duration: f64,
    max_duration: f64,
    target_sample_rate: u32,
}

impl Default for ProbeAudioValidator {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

impl ProbeAudioValidator {
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            min_duration: config.min_duration_secs,
            max_duration: config.max_duration_secs,
            target_sample_rate: config.target_sample_rate,
        }
    }
}

impl AudioValidator for ProbeAudioValidator {
    fn validate(&self, path: &Path) -> AudioValidationResult {
        if !path.exists() {
            return AudioValidationResult::error(
                path,
                format!("Audio file not found: {}", path.display()),
            );
        }

        let props = match audio::probe(path) {
            Ok(props) => props,
            Err(e) => {
                return AudioValidationResult::error(path, format!("Failed to load audio file: {e}"))
            }
        };

        let warning = if props.duration_secs < self.min_duration {
            Some(format!(
                "Audio duration ({:.2}s) is too short (minimum: {}s)",
                props.duration_secs, self.min_duration
            ))
        } else if props.duration_secs > self.max_duration {
            Some(format!(
                "Audio duration ({:.2}s) is too long (maximum: {}s)",
                props.duration_secs, self.max_duration
            ))
        } else if props.sample_rate != self.target_sample_rate {
            Some(format!(
                "Audio sample rate mismatch: {}Hz (expected: {}Hz)",
                props.sample_rate, self.target_sample_rate
            ))
        } else {
            None
        };

        if let Some(ref message) = warning {
            tracing::warn!(path = %path.display(), "{message}");
        }

        AudioValidationResult {
            status: if warning.is_some() {
                ValidationStatus::Warning
            } else {
                ValidationStatus::Valid
            },
            file_path: path.to_path_buf(),
            duration: props.duration_secs,
            sample_rate: props.sample_rate,
            channels: props.channels,
            error_message: warning,
        }
    }
}

/// A per-file message in a [`ValidationSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileIssue {
    pub file: PathBuf,
    pub message: String,
}

/// Aggregate over a batch of validation results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_files: usize,
    pub valid_files: usize,
    pub warning_files: usize,
    pub error_files: usize,
    /// Seconds of usable audio (valid and warning files).
    pub total_duration: f64,
    pub warnings: Vec<FileIssue>,
    pub errors: Vec<FileIssue>,
}

impl ValidationSummary {
    pub fn from_results(results: &[AudioValidationResult]) -> Self {
        let mut summary = Self {
            total_files: results.len(),
            ..Self::default()
        };

        for result in results {
            let issue = || FileIssue {
                file: result.file_path.clone(),
                message: result.error_message.clone().unwrap_or_default(),
            };
            match result.status {
                ValidationStatus::Valid => {
                    summary.valid_files += 1;
                    summary.total_duration += result.duration;
                }
                ValidationStatus::Warning => {
                    summary.warning_files += 1;
                    summary.total_duration += result.duration;
                    summary.warnings.push(issue());
                }
                ValidationStatus::Error => {
                    summary.error_files += 1;
                    summary.errors.push(issue());
                }
            }
        }

        summary
    }
}
