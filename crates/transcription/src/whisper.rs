//! Whisper model family: one whole-file decode per call.
//!
//! Size variants share the code path and differ only in weights file,
//! memory footprint and reported metadata.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use mediascribe_media::audio;

use crate::backend::{TranscriptionBackend, TranscriptionOutcome};
use crate::catalog::{BackendDescriptor, ModelMetadata};
use crate::engine::{run_model, DecodeOptions, LocalModelSlot, SpeechEngine};
use crate::status::ServiceStatus;

pub struct WhisperFamilyBackend {
    descriptor: BackendDescriptor,
    slot: LocalModelSlot,
}

impl WhisperFamilyBackend {
    pub fn new(descriptor: BackendDescriptor, models_dir: &Path, engine: Arc<dyn SpeechEngine>) -> Self {
        let weights = descriptor
            .model_type
            .weights_filename()
            .map(|f| models_dir.join(f))
            .unwrap_or_else(|| models_dir.to_path_buf());
        let slot = LocalModelSlot::new(
            engine,
            weights,
            descriptor.model_name.clone(),
            &descriptor.device,
        );
        Self { descriptor, slot }
    }

    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            language: self.descriptor.language_hint().map(str::to_string),
            temperature: self.descriptor.temperature,
            beam_size: self.descriptor.beam_size,
        }
    }
}

#[async_trait]
impl TranscriptionBackend for WhisperFamilyBackend {
    fn status(&self) -> ServiceStatus {
        self.slot.lifecycle.status()
    }

    async fn load_model(&mut self) -> bool {
        self.slot.load().await
    }

    async fn unload_model(&mut self) -> bool {
        self.slot.unload();
        true
    }

    async fn transcribe(&mut self, audio_path: &Path) -> TranscriptionOutcome {
        let model_used = self.descriptor.identifier();
        let model = match (self.is_ready(), self.slot.model()) {
            (true, Some(model)) => model,
            _ => return TranscriptionOutcome::not_ready(audio_path, model_used),
        };

        if !audio_path.exists() {
            return TranscriptionOutcome::failed(
                audio_path,
                model_used,
                format!("File not found: {}", audio_path.display()),
            );
        }

        let options = self.decode_options();
        let path = audio_path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || {
            let pcm = audio::decode_to_mono_16k(&path).map_err(|e| e.to_string())?;
            let duration = pcm.len() as f64 / audio::TARGET_SAMPLE_RATE as f64;
            let text = run_model(&model, &pcm, &options).map_err(|e| e.to_string())?;
            Ok::<_, String>((text, duration))
        })
        .await;

        let device = self.slot.device().map(|d| d.as_str()).unwrap_or("unknown");
        match result {
            Ok(Ok((text, duration))) => {
                TranscriptionOutcome::succeeded(audio_path, model_used, text.trim())
                    .with_duration(duration)
                    .with_meta(
                        "language",
                        self.descriptor.language_hint().unwrap_or("auto"),
                    )
                    .with_meta("device", device)
                    .with_meta(
                        "model_size",
                        self.descriptor.model_type.whisper_size().unwrap_or("unknown"),
                    )
            }
            Ok(Err(message)) => TranscriptionOutcome::failed(audio_path, model_used, message),
            Err(e) => TranscriptionOutcome::failed(
                audio_path,
                model_used,
                format!("transcription task failed: {e}"),
            ),
        }
    }

    fn metadata(&self) -> ModelMetadata {
        let mut metadata = ModelMetadata::for_descriptor(&self.descriptor);
        for key in ["multilingual", "supports_language_detection", "supports_timestamps"] {
            metadata.additional_info.insert(key.to_string(), Value::from(true));
        }
        metadata
    }

    fn load_error(&self) -> Option<String> {
        self.slot.lifecycle.last_error().map(str::to_string)
    }
}
