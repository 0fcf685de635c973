//! Maps a model identifier to a constructed backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mediascribe_common::{AppConfig, CloudConfig, DomainError, ModelPreferences};

use crate::backend::TranscriptionBackend;
use crate::catalog::{BackendDescriptor, ModelType};
use crate::chunked::ChunkedLocalBackend;
use crate::cloud::OpenAiBackend;
use crate::engine::{default_engine, SpeechEngine};
use crate::whisper::WhisperFamilyBackend;

/// Builds a fresh, unloaded backend for a descriptor.
pub trait BackendFactory: Send + Sync {
    fn create(
        &self,
        descriptor: &BackendDescriptor,
    ) -> Result<Box<dyn TranscriptionBackend>, DomainError>;
}

/// Default factory over the three backend families.
pub struct BackendSelector {
    models_dir: PathBuf,
    cloud: CloudConfig,
    engine: Arc<dyn SpeechEngine>,
}

impl BackendSelector {
    pub fn new(models_dir: impl Into<PathBuf>, cloud: CloudConfig) -> Self {
        Self {
            models_dir: models_dir.into(),
            cloud,
            engine: default_engine(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.models_dir.clone(), config.cloud.clone())
    }

    /// Replace the local inference engine.
    pub fn with_engine(mut self, engine: Arc<dyn SpeechEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Construct the backend for an already-resolved descriptor.
    ///
    /// Fails only when the backend cannot exist at all, e.g. a cloud
    /// backend without credentials.
    pub fn select_and_construct(
        &self,
        descriptor: &BackendDescriptor,
    ) -> Result<Box<dyn TranscriptionBackend>, DomainError> {
        tracing::debug!(model = descriptor.model_type.id(), "Constructing backend");
        let backend: Box<dyn TranscriptionBackend> = match descriptor.model_type {
            ModelType::LocalBreeze => Box::new(ChunkedLocalBackend::new(
                descriptor.clone(),
                &self.models_dir,
                Arc::clone(&self.engine),
            )),
            ModelType::LocalWhisperBase
            | ModelType::LocalWhisperSmall
            | ModelType::LocalWhisperMedium
            | ModelType::LocalWhisperLarge => Box::new(WhisperFamilyBackend::new(
                descriptor.clone(),
                &self.models_dir,
                Arc::clone(&self.engine),
            )),
            ModelType::OpenAiApi => Box::new(OpenAiBackend::new(
                descriptor.clone(),
                self.cloud.clone(),
            )?),
        };
        Ok(backend)
    }

    /// Parse `model_id`, apply preferences and construct.
    pub fn select(
        &self,
        model_id: &str,
        prefs: &ModelPreferences,
    ) -> Result<Box<dyn TranscriptionBackend>, DomainError> {
        let model_type: ModelType = model_id.parse()?;
        self.select_and_construct(&BackendDescriptor::with_preferences(model_type, prefs))
    }
}

impl BackendFactory for BackendSelector {
    fn create(
        &self,
        descriptor: &BackendDescriptor,
    ) -> Result<Box<dyn TranscriptionBackend>, DomainError> {
        self.select_and_construct(descriptor)
    }
}
