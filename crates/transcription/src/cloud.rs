//! OpenAI transcription API backend.
//!
//! The API key must be present when the backend is constructed. Files over
//! the upload limit are rejected before any request is made. Duration and
//! cost are estimated from file size.

use async_trait::async_trait;
use reqwest::multipart;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mediascribe_common::{codes, CloudConfig, DomainError};

use crate::backend::{TranscriptionBackend, TranscriptionOutcome};
use crate::catalog::{BackendDescriptor, ModelMetadata};
use crate::status::{Lifecycle, ServiceStatus};

/// Seconds of audio assumed per MB of upload.
const SECONDS_PER_MB: f64 = 10.0;
const RESPONSE_FORMAT: &str = "text";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("request failed: {0}")]
    Transport(String),
}

/// One upload.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub model: String,
    pub language: Option<String>,
    pub temperature: f32,
}

/// Remote speech-to-text endpoint.
#[async_trait]
pub trait TranscriptionApi: Send + Sync {
    async fn transcribe(&self, request: ApiRequest) -> Result<String, ApiError>;
}

/// reqwest client for `<base_url>/audio/transcriptions`.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| ApiError::Transport(format!("client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn mime_for(file_name: &str) -> &'static str {
    match Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("mp4") | Some("m4a") => "audio/mp4",
        Some("webm") => "audio/webm",
        _ => "audio/mpeg",
    }
}

#[async_trait]
impl TranscriptionApi for OpenAiClient {
    async fn transcribe(&self, request: ApiRequest) -> Result<String, ApiError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let file_part = multipart::Part::bytes(request.bytes)
            .file_name(request.file_name.clone())
            .mime_str(mime_for(&request.file_name))
            .map_err(|e| ApiError::Transport(format!("mime: {e}")))?;

        let mut form = multipart::Form::new()
            .text("model", request.model.clone())
            .text("response_format", RESPONSE_FORMAT)
            .text("temperature", request.temperature.to_string())
            .part("file", file_part);
        if let Some(language) = request.language {
            form = form.text("language", language);
        }

        tracing::debug!(model = %request.model, "Sending audio to OpenAI transcription API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            let detail = format!("status {status}: {}", body.trim());
            return Err(match status.as_u16() {
                429 => ApiError::RateLimited(detail),
                401 | 403 => ApiError::Unauthorized(detail),
                _ => ApiError::Api(detail),
            });
        }

        let transcript = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("body: {e}")))?;

        tracing::info!(chars = transcript.len(), "OpenAI transcription completed");
        Ok(transcript.trim().to_string())
    }
}

/// Running usage totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostTracker {
    total_cost: f64,
    total_minutes: f64,
    request_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostSummary {
    pub total_cost: f64,
    pub total_minutes: f64,
    pub request_count: u64,
    pub average_cost_per_request: f64,
}

impl CostTracker {
    pub fn add_usage(&mut self, duration_minutes: f64, cost_per_minute: f64) {
        self.total_cost += duration_minutes * cost_per_minute;
        self.total_minutes += duration_minutes;
        self.request_count += 1;
    }

    pub fn summary(&self) -> CostSummary {
        CostSummary {
            total_cost: self.total_cost,
            total_minutes: self.total_minutes,
            request_count: self.request_count,
            average_cost_per_request: if self.request_count > 0 {
                self.total_cost / self.request_count as f64
            } else {
                0.0
            },
        }
    }
}

/// Read a non-empty credential from the environment.
pub fn read_api_key(env_name: &str) -> Result<String, DomainError> {
    std::env::var(env_name)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| missing_key_error(env_name))
}

fn missing_key_error(env_name: &str) -> DomainError {
    DomainError::transcription(format!(
        "OpenAI API key required. Set {env_name} environment variable."
    ))
    .with_code(codes::TR_MISSING_CREDENTIALS)
    .fatal()
}

pub struct OpenAiBackend {
    descriptor: BackendDescriptor,
    cloud: CloudConfig,
    api_key: String,
    injected: Option<Arc<dyn TranscriptionApi>>,
    client: Option<Arc<dyn TranscriptionApi>>,
    lifecycle: Lifecycle,
    costs: CostTracker,
}

impl OpenAiBackend {
    /// Fails fast when the credential variable is unset.
    pub fn new(descriptor: BackendDescriptor, cloud: CloudConfig) -> Result<Self, DomainError> {
        let api_key = read_api_key(&cloud.api_key_env)?;
        Ok(Self::build(descriptor, cloud, api_key, None))
    }

    /// Use a specific API implementation instead of the HTTP client.
    pub fn with_api(
        descriptor: BackendDescriptor,
        cloud: CloudConfig,
        api_key: String,
        api: Arc<dyn TranscriptionApi>,
    ) -> Result<Self, DomainError> {
        if api_key.trim().is_empty() {
            return Err(missing_key_error(&cloud.api_key_env));
        }
        Ok(Self::build(descriptor, cloud, api_key, Some(api)))
    }

    fn build(
        descriptor: BackendDescriptor,
        cloud: CloudConfig,
        api_key: String,
        injected: Option<Arc<dyn TranscriptionApi>>,
    ) -> Self {
        Self {
            descriptor,
            cloud,
            api_key,
            injected,
            client: None,
            lifecycle: Lifecycle::default(),
            costs: CostTracker::default(),
        }
    }

    pub fn cost_summary(&self) -> CostSummary {
        self.costs.summary()
    }

    fn estimated_cost(&self, duration_seconds: f64) -> f64 {
        duration_seconds / 60.0 * self.cloud.cost_per_minute
    }
}

#[async_trait]
impl TranscriptionBackend for OpenAiBackend {
    fn status(&self) -> ServiceStatus {
        self.lifecycle.status()
    }

    async fn load_model(&mut self) -> bool {
        if self.lifecycle.is_ready() {
            return true;
        }
        self.lifecycle.begin_loading();

        let client: Arc<dyn TranscriptionApi> = match &self.injected {
            Some(api) => Arc::clone(api),
            None => match OpenAiClient::new(self.api_key.clone(), &self.cloud.base_url) {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    self.lifecycle.mark_failed(e.to_string());
                    return false;
                }
            },
        };
        self.client = Some(client);
        self.lifecycle.mark_ready();
        tracing::info!(model = %self.descriptor.model_name, "OpenAI API client ready");
        true
    }

    async fn unload_model(&mut self) -> bool {
        self.client = None;
        self.lifecycle.mark_unloaded();
        true
    }

    async fn transcribe(&mut self, audio_path: &Path) -> TranscriptionOutcome {
        let model_used = self.descriptor.model_name.clone();
        let client = match (self.is_ready(), &self.client) {
            (true, Some(client)) => Arc::clone(client),
            _ => return TranscriptionOutcome::not_ready(audio_path, model_used),
        };

        let size_bytes = match tokio::fs::metadata(audio_path).await {
            Ok(meta) => meta.len(),
            Err(_) => {
                return TranscriptionOutcome::failed(
                    audio_path,
                    model_used,
                    format!("File not found: {}", audio_path.display()),
                )
            }
        };
        let size_mb = size_bytes as f64 / (1024.0 * 1024.0);
        if size_mb > self.cloud.max_file_size_mb {
            return TranscriptionOutcome::failed(
                audio_path,
                model_used,
                format!(
                    "File size {:.1}MB exceeds maximum file size {}MB for OpenAI API",
                    size_mb, self.cloud.max_file_size_mb
                ),
            );
        }

        let bytes = match tokio::fs::read(audio_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return TranscriptionOutcome::failed(
                    audio_path,
                    model_used,
                    format!("Failed to read {}: {e}", audio_path.display()),
                )
            }
        };

        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();
        let request = ApiRequest {
            file_name,
            bytes,
            model: model_used.clone(),
            language: self.descriptor.language_hint().map(str::to_string),
            temperature: self.descriptor.temperature,
        };

        let text = match client.transcribe(request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "OpenAI transcription request failed");
                return TranscriptionOutcome::failed(audio_path, model_used, e.to_string());
            }
        };

        let estimated_seconds = size_mb * SECONDS_PER_MB;
        let cost = self.estimated_cost(estimated_seconds);
        self.costs
            .add_usage(estimated_seconds / 60.0, self.cloud.cost_per_minute);

        TranscriptionOutcome::succeeded(audio_path, model_used.clone(), text)
            .with_duration(estimated_seconds)
            .with_meta("file_size_mb", size_mb)
            .with_meta("estimated_duration_seconds", estimated_seconds)
            .with_meta("cost", cost)
            .with_meta("cost_per_minute", self.cloud.cost_per_minute)
            .with_meta("api_model", model_used)
            .with_meta("response_format", RESPONSE_FORMAT)
    }

    fn metadata(&self) -> ModelMetadata {
        let mut metadata = ModelMetadata::for_descriptor(&self.descriptor);
        metadata.additional_info.insert(
            "max_file_size_mb".to_string(),
            Value::from(self.cloud.max_file_size_mb),
        );
        metadata.additional_info.insert(
            "cost_per_minute".to_string(),
            Value::from(self.cloud.cost_per_minute),
        );
        metadata
    }

    fn load_error(&self) -> Option<String> {
        self.lifecycle.last_error().map(str::to_string)
    }
}
