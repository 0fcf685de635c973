//! The capability contract shared by every backend.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mediascribe_common::{codes, DomainError};

use crate::catalog::ModelMetadata;
use crate::status::ServiceStatus;

pub const NOT_READY_MESSAGE: &str = "Service not ready. Call load_model() first.";

/// Metadata key carrying the index of the window that failed.
pub const FAILED_CHUNK_KEY: &str = "failed_chunk";

/// What a backend returns from one transcription call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptionOutcome {
    pub success: bool,
    pub transcription: Option<String>,
    pub input_path: PathBuf,
    pub model_used: String,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
    pub metadata: BTreeMap<String, Value>,
}

impl TranscriptionOutcome {
    pub fn succeeded(input: &Path, model_used: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            success: true,
            transcription: Some(text.into()),
            input_path: input.to_path_buf(),
            model_used: model_used.into(),
            duration_seconds: None,
            error_message: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn failed(input: &Path, model_used: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            transcription: None,
            input_path: input.to_path_buf(),
            model_used: model_used.into(),
            duration_seconds: None,
            error_message: Some(message.into()),
            metadata: BTreeMap::new(),
        }
    }

    pub fn not_ready(input: &Path, model_used: impl Into<String>) -> Self {
        Self::failed(input, model_used, NOT_READY_MESSAGE)
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Uniform lifecycle over heterogeneous transcription backends.
///
/// `transcribe` on a backend that is not [`ServiceStatus::Ready`] returns a
/// failed outcome carrying [`NOT_READY_MESSAGE`] and does no work.
#[async_trait]
pub trait TranscriptionBackend: Send {
    fn status(&self) -> ServiceStatus;

    fn is_ready(&self) -> bool {
        self.status() == ServiceStatus::Ready
    }

    /// Unloaded → Loading → Ready | Error. Returns `true` when Ready.
    async fn load_model(&mut self) -> bool;

    /// Release everything and return to Unloaded. Safe to call repeatedly.
    async fn unload_model(&mut self) -> bool;

    async fn transcribe(&mut self, audio_path: &Path) -> TranscriptionOutcome;

    fn metadata(&self) -> ModelMetadata;

    /// Why the last load failed, if it did.
    fn load_error(&self) -> Option<String> {
        None
    }
}

/// Load, transcribe and unload, converting failures into [`DomainError`]s.
///
/// The backend is unloaded on every return path. If the returned future is
/// dropped mid-flight the backend is left loaded; its owner releases it on drop.
pub async fn run_scoped(
    backend: &mut dyn TranscriptionBackend,
    audio_path: &Path,
) -> Result<TranscriptionOutcome, DomainError> {
    let result = load_and_transcribe(backend, audio_path).await;
    if !backend.unload_model().await || backend.status() != ServiceStatus::Unloaded {
        tracing::warn!(status = %backend.status(), "Backend did not unload cleanly");
    }
    result
}

async fn load_and_transcribe(
    backend: &mut dyn TranscriptionBackend,
    audio_path: &Path,
) -> Result<TranscriptionOutcome, DomainError> {
    let name = backend.metadata().name;

    if !backend.load_model().await {
        let reason = backend
            .load_error()
            .unwrap_or_else(|| format!("status {}", backend.status()));
        return Err(DomainError::transcription(format!(
            "Failed to load model {name}: {reason}"
        ))
        .with_audio_path(audio_path)
        .with_code(codes::TR_MODEL_LOADING)
        .retryable());
    }

    tracing::info!(model = %name, path = %audio_path.display(), "Transcribing");
    let outcome = backend.transcribe(audio_path).await;

    if outcome.success {
        return Ok(outcome);
    }

    let message = outcome
        .error_message
        .clone()
        .unwrap_or_else(|| "Transcription failed".to_string());
    let mut error = DomainError::transcription(message)
        .with_audio_path(audio_path)
        .with_code(codes::TR_BACKEND_FAILURE)
        .retryable();
    if let Some(index) = outcome.metadata.get(FAILED_CHUNK_KEY).and_then(Value::as_u64) {
        let window = outcome
            .metadata
            .get("chunk_length_sec")
            .and_then(Value::as_f64)
            .unwrap_or_default();
        error = error.with_chunk(index as usize, window);
    }
    Err(error)
}
