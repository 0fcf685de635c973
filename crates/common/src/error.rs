//! Error types shared across MediaScribe crates.
//!
//! Failures raised inside a pipeline stage are [`DomainError`] values: plain
//! data describing which stage failed, with what context, and whether an
//! automatic re-attempt makes sense. Everything else (I/O, JSON, config)
//! travels through [`MediascribeError`].

use std::path::PathBuf;

use serde::Serialize;

/// Machine-readable error codes raised by the stages.
pub mod codes {
    /// Conversion tool (ffmpeg) missing from the system.
    pub const CV_TOOL_MISSING: &str = "CV001";
    pub const CV_TIMEOUT: &str = "CV_TIMEOUT";
    pub const CV_NETWORK: &str = "CV_NETWORK";
    pub const CV_TEMP_FAILURE: &str = "CV_TEMP_FAILURE";
    pub const CV_FAILED: &str = "CV_FAILED";
    pub const TR_MODEL_LOADING: &str = "TR_MODEL_LOADING";
    pub const TR_MEMORY_ERROR: &str = "TR_MEMORY_ERROR";
    pub const TR_BACKEND_FAILURE: &str = "TR_BACKEND_FAILURE";
    pub const TR_UNKNOWN_MODEL: &str = "TR_UNKNOWN_MODEL";
    pub const TR_MISSING_CREDENTIALS: &str = "TR_MISSING_CREDENTIALS";
    pub const VL_TEMP_UNAVAILABLE: &str = "VL_TEMP_UNAVAILABLE";
    pub const VL_INVALID_AUDIO: &str = "VL_INVALID_AUDIO";
}

/// Stage-specific context carried by a [`DomainError`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "error_type")]
pub enum ErrorKind {
    /// Media transcoding failed (missing tool, timeout, bad input).
    #[serde(rename = "ConversionError")]
    Conversion {
        input_path: Option<PathBuf>,
        output_path: Option<PathBuf>,
    },

    /// A backend failed to produce text.
    #[serde(rename = "TranscriptionError")]
    Transcription {
        audio_path: Option<PathBuf>,
        chunk_index: Option<usize>,
        duration_seconds: Option<f64>,
    },

    /// The audio file is unusable.
    #[serde(rename = "ValidationError")]
    Validation {
        file_path: Option<PathBuf>,
        issues: Vec<String>,
    },
}

impl ErrorKind {
    /// Short human name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Conversion { .. } => "ConversionError",
            ErrorKind::Transcription { .. } => "TranscriptionError",
            ErrorKind::Validation { .. } => "ValidationError",
        }
    }
}

/// A classified failure raised at the point of failure inside a stage.
///
/// `can_retry` is the explicit retry flag set by the raising stage. When it
/// is `None` the recovery manager falls back to its list of transient error
/// codes; when it is `Some(false)` the error is never retried.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct DomainError {
    #[serde(flatten)]
    pub kind: ErrorKind,
    pub message: String,
    pub error_code: Option<String>,
    pub recovery_suggestion: Option<String>,
    #[serde(skip)]
    pub can_retry: Option<bool>,
    #[serde(skip)]
    pub max_retries: u32,
}

impl DomainError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            error_code: None,
            recovery_suggestion: None,
            can_retry: None,
            max_retries: 0,
        }
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Conversion {
                input_path: None,
                output_path: None,
            },
            msg,
        )
    }

    pub fn transcription(msg: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Transcription {
                audio_path: None,
                chunk_index: None,
                duration_seconds: None,
            },
            msg,
        )
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Validation {
                file_path: None,
                issues: Vec::new(),
            },
            msg,
        )
    }

    /// Attach input/output paths. No-op for non-conversion errors.
    pub fn with_paths(mut self, input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        if let ErrorKind::Conversion {
            input_path,
            output_path,
        } = &mut self.kind
        {
            *input_path = Some(input.into());
            *output_path = Some(output.into());
        }
        self
    }

    /// Attach the audio path. Applies to transcription and validation errors.
    pub fn with_audio_path(mut self, path: impl Into<PathBuf>) -> Self {
        match &mut self.kind {
            ErrorKind::Transcription { audio_path, .. } => *audio_path = Some(path.into()),
            ErrorKind::Validation { file_path, .. } => *file_path = Some(path.into()),
            ErrorKind::Conversion { .. } => {}
        }
        self
    }

    /// Attach the failing chunk and its window length.
    pub fn with_chunk(mut self, index: usize, window_secs: f64) -> Self {
        if let ErrorKind::Transcription {
            chunk_index,
            duration_seconds,
            ..
        } = &mut self.kind
        {
            *chunk_index = Some(index);
            *duration_seconds = Some(window_secs);
        }
        self
    }

    pub fn with_issues(mut self, list: Vec<String>) -> Self {
        if let ErrorKind::Validation { issues, .. } = &mut self.kind {
            *issues = list;
        }
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.recovery_suggestion = Some(suggestion.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Mark the error as eligible for automatic re-attempt.
    pub fn retryable(mut self) -> Self {
        self.can_retry = Some(true);
        self
    }

    /// Mark the error as fatal. Overrides any transient error code.
    pub fn fatal(mut self) -> Self {
        self.can_retry = Some(false);
        self
    }

    /// Explicit retry flag, `false` when unset.
    pub fn can_retry(&self) -> bool {
        self.can_retry.unwrap_or(false)
    }

    pub fn code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn is_conversion(&self) -> bool {
        matches!(self.kind, ErrorKind::Conversion { .. })
    }

    pub fn is_transcription(&self) -> bool {
        matches!(self.kind, ErrorKind::Transcription { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind, ErrorKind::Validation { .. })
    }

    /// Serialize the error with its kind context.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({
                "error_type": self.kind.name(),
                "message": self.message,
            })
        })
    }
}

/// Top-level error type for MediaScribe operations.
#[derive(Debug, thiserror::Error)]
pub enum MediascribeError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Unsupported file type: {extension}. Supported extensions: {supported}")]
    UnsupportedFormat { extension: String, supported: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using MediascribeError.
pub type MediascribeResult<T> = Result<T, MediascribeError>;

impl MediascribeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// The classified stage error, if this is one.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            MediascribeError::Domain(e) => Some(e),
            _ => None,
        }
    }
}
