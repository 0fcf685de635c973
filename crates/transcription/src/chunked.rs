//! Chunked local backend (Breeze-ASR-25 and other long-form local models).
//!
//! Audio is decoded to 16 kHz mono, split into fixed windows, and each
//! window is transcribed independently. Non-empty window texts are joined
//! with single spaces.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use mediascribe_media::audio;

use crate::backend::{TranscriptionBackend, TranscriptionOutcome, FAILED_CHUNK_KEY};
use crate::catalog::{BackendDescriptor, ModelMetadata};
use crate::engine::{run_model, DecodeOptions, LocalModelSlot, SpeechEngine};
use crate::status::ServiceStatus;

pub struct ChunkedLocalBackend {
    descriptor: BackendDescriptor,
    slot: LocalModelSlot,
}

enum ChunkRunError {
    Audio(String),
    Window { index: usize, message: String },
}

impl ChunkedLocalBackend {
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

    pub fn chunk_length_secs(&self) -> u32 {
        self.descriptor.chunk_length_seconds.max(1)
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
impl TranscriptionBackend for ChunkedLocalBackend {
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
        let model_used = self.descriptor.model_name.clone();
        let model = match (self.is_ready(), self.slot.model()) {
            (true, Some(model)) => model,
            _ => return TranscriptionOutcome::not_ready(audio_path, model_used),
        };

        let chunk_secs = self.chunk_length_secs();
        let options = self.decode_options();
        let path: PathBuf = audio_path.to_path_buf();
        let started = Instant::now();

        let joined = tokio::task::spawn_blocking(move || {
            let pcm = audio::decode_to_mono_16k(&path).map_err(|e| ChunkRunError::Audio(e.to_string()))?;
            let duration = pcm.len() as f64 / audio::TARGET_SAMPLE_RATE as f64;

            let mut parts = Vec::new();
            let mut num_chunks = 0usize;
            for (index, window) in audio::split_windows(&pcm, chunk_secs).enumerate() {
                num_chunks += 1;
                let text = run_model(&model, window, &options).map_err(|e| ChunkRunError::Window {
                    index,
                    message: e.to_string(),
                })?;
                let text = text.trim();
                if !text.is_empty() {
                    parts.push(text.to_string());
                }
            }
            Ok::<_, ChunkRunError>((parts.join(" "), num_chunks, duration))
        })
        .await;

        let device = self.slot.device().map(|d| d.as_str()).unwrap_or("unknown");
        match joined {
            Ok(Ok((text, num_chunks, duration))) => {
                tracing::info!(
                    num_chunks,
                    duration_secs = duration,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "Chunked transcription finished"
                );
                TranscriptionOutcome::succeeded(audio_path, model_used, text)
                    .with_duration(duration)
                    .with_meta("num_chunks", num_chunks)
                    .with_meta("chunk_length_sec", chunk_secs)
                    .with_meta("device", device)
            }
            Ok(Err(ChunkRunError::Audio(message))) => {
                TranscriptionOutcome::failed(audio_path, model_used, message)
            }
            Ok(Err(ChunkRunError::Window { index, message })) => {
                TranscriptionOutcome::failed(audio_path, model_used, format!("Chunk {index} failed: {message}"))
                    .with_meta(FAILED_CHUNK_KEY, index)
                    .with_meta("chunk_length_sec", chunk_secs)
            }
            Err(e) => TranscriptionOutcome::failed(audio_path, model_used, format!("transcription task failed: {e}")),
        }
    }

    fn metadata(&self) -> ModelMetadata {
        let mut metadata = ModelMetadata::for_descriptor(&self.descriptor);
        metadata
            .additional_info
            .insert("chunk_length_sec".to_string(), Value::from(self.chunk_length_secs()));
        metadata
            .additional_info
            .insert("supports_streaming".to_string(), Value::from(false));
        metadata
    }

    fn load_error(&self) -> Option<String> {
        self.slot.lifecycle.last_error().map(str::to_string)
    }
}
