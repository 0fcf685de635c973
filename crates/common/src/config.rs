//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MediascribeError, MediascribeResult};

/// Environment variable that points at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "MEDIASCRIBE_CONFIG";

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding local model weight files.
    pub models_dir: PathBuf,

    /// Backend selection and decoding defaults.
    pub model: ModelPreferences,

    /// Retry behaviour for retryable stages.
    pub retry: RetryConfig,

    /// Video-to-audio conversion settings.
    pub conversion: ConversionConfig,

    /// Audio validation thresholds.
    pub validation: ValidationConfig,

    /// Cloud API backend settings.
    pub cloud: CloudConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Stage timing and memory watch.
    pub performance: PerformanceConfig,
}

/// Which backend to use and how to drive it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPreferences {
    /// Model identifier, e.g. `LOCAL_BREEZE` or `whisper-small`.
    pub default_model: String,

    /// Compute device: `auto`, `cpu`, `cuda` or `metal`.
    pub device: String,

    /// Language hint (ISO 639-1) or `auto`.
    pub language: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Beam width (1 = greedy).
    pub beam_size: u32,

    /// Window length for chunked backends, in seconds.
    pub chunk_length_secs: u32,
}

/// Backoff and retry policy.
///
/// Computed delays never exceed `max_delay` before jitter; jitter only adds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Number of re-attempts after the first try.
    pub max_retries: u32,

    /// Base delay in seconds.
    pub base_delay: f64,

    /// Delay cap in seconds.
    pub max_delay: f64,

    /// Double the delay on every attempt.
    pub exponential_backoff: bool,

    /// Add up to 10% random delay on top of the computed one.
    pub jitter: bool,
}

/// Output bitrate used when extracting audio from video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityLevel {
    /// ffmpeg `-ab` argument.
    pub fn bitrate(&self) -> &'static str {
        match self {
            QualityLevel::Low => "128k",
            QualityLevel::Medium => "160k",
            QualityLevel::High => "256k",
        }
    }
}

/// Conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub quality: QualityLevel,

    /// Hard limit for one ffmpeg run, in seconds.
    pub timeout_secs: u64,

    /// ffmpeg binary. `FFMPEG_PATH` takes precedence when set.
    pub ffmpeg_path: String,

    /// Where intermediate audio files go. Defaults to the system temp dir.
    pub temp_dir: Option<PathBuf>,
}

/// Audio validation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_duration_secs: f64,
    pub max_duration_secs: f64,
    pub target_sample_rate: u32,
}

/// Cloud transcription API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,

    pub base_url: String,

    /// Upload limit enforced before any request is made.
    pub max_file_size_mb: f64,

    /// USD per audio minute, used for cost estimates.
    pub cost_per_minute: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "mediascribe=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            model: ModelPreferences::default(),
            retry: RetryConfig::default(),
            conversion: ConversionConfig::default(),
            validation: ValidationConfig::default(),
            cloud: CloudConfig::default(),
            logging: LoggingConfig::default(),
            performance: PerformanceConfig::default(),
        }
    }
}

impl Default for ModelPreferences {
    fn default() -> Self {
        Self {
            default_model: "LOCAL_BREEZE".to_string(),
            device: "auto".to_string(),
            language: "auto".to_string(),
            temperature: 0.0,
            beam_size: 1,
            chunk_length_secs: 30,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: 1.0,
            max_delay: 30.0,
            exponential_backoff: true,
            jitter: true,
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            quality: QualityLevel::Medium,
            timeout_secs: 600,
            ffmpeg_path: "ffmpeg".to_string(),
            temp_dir: None,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: 0.1,
            max_duration_secs: 3600.0,
            target_sample_rate: 16_000,
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_file_size_mb: 25.0,
            cost_per_minute: 0.006,
        }
    }
}

/// Per-stage resource monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Resident memory above which a stage logs a warning, in MB.
    pub memory_threshold_mb: f64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            memory_threshold_mb: 8192.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Check the numeric invariants.
    pub fn validate(&self) -> MediascribeResult<()> {
        if self.base_delay.is_nan() || self.base_delay <= 0.0 {
            return Err(MediascribeError::config(format!(
                "retry.base_delay must be > 0 (got {})",
                self.base_delay
            )));
        }
        if self.max_delay < self.base_delay {
            return Err(MediascribeError::config(format!(
                "retry.max_delay ({}) must be >= retry.base_delay ({})",
                self.max_delay, self.base_delay
            )));
        }
        Ok(())
    }
}

impl ConversionConfig {
    /// Effective ffmpeg binary, honouring `FFMPEG_PATH`.
    pub fn ffmpeg_binary(&self) -> String {
        std::env::var("FFMPEG_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| self.ffmpeg_path.clone())
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Missing or malformed files are errors.
    pub fn load_from(path: &Path) -> MediascribeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MediascribeError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.retry.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(explicit);
    }
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("mediascribe").join("config.json")
}

/// Default model weights directory.
fn default_models_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("mediascribe").join("models")
}
