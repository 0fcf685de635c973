//! Local inference seam.
//!
//! Backends own the lifecycle and the audio plumbing; a [`SpeechEngine`]
//! turns a weights file into a [`SpeechModel`] that maps 16 kHz mono PCM
//! to text. The whisper.cpp engine is compiled in with the `whisper`
//! feature.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use mediascribe_platform::{DeviceManager, DevicePreference, ResolvedDevice};

use crate::status::Lifecycle;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("model weights not found at {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("model load failed: {0}")]
    Load(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("local model inference is not compiled in (rebuild with --features whisper)")]
    NotCompiled,
}

/// What to load and where.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub model_path: PathBuf,
    pub model_name: String,
    pub device: ResolvedDevice,
}

/// Decoding parameters for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOptions {
    /// `None` means auto-detect.
    pub language: Option<String>,
    pub temperature: f32,
    pub beam_size: u32,
}

pub trait SpeechEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Blocking. Called from a blocking task.
    fn load(&self, request: &LoadRequest) -> Result<Box<dyn SpeechModel>, EngineError>;
}

pub trait SpeechModel: Send {
    /// Blocking. `samples` are mono f32 at 16 kHz.
    fn transcribe_pcm(&mut self, samples: &[f32], options: &DecodeOptions) -> Result<String, EngineError>;
}

/// Engine used when nothing else is injected.
pub fn default_engine() -> Arc<dyn SpeechEngine> {
    #[cfg(feature = "whisper")]
    {
        Arc::new(whisper_cpp::WhisperCppEngine)
    }
    #[cfg(not(feature = "whisper"))]
    {
        Arc::new(UnavailableEngine)
    }
}

/// Stand-in when no inference library is linked.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableEngine;

impl SpeechEngine for UnavailableEngine {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn load(&self, _request: &LoadRequest) -> Result<Box<dyn SpeechModel>, EngineError> {
        Err(EngineError::NotCompiled)
    }
}

pub(crate) type SharedModel = Arc<Mutex<Box<dyn SpeechModel>>>;

/// Loaded-model bookkeeping shared by the local backends.
pub(crate) struct LocalModelSlot {
    engine: Arc<dyn SpeechEngine>,
    weights_path: PathBuf,
    model_name: String,
    device_preference: DevicePreference,
    pub(crate) lifecycle: Lifecycle,
    model: Option<SharedModel>,
    device: Option<ResolvedDevice>,
}

impl LocalModelSlot {
    pub(crate) fn new(
        engine: Arc<dyn SpeechEngine>,
        weights_path: PathBuf,
        model_name: String,
        device: &str,
    ) -> Self {
        let device_preference = device.parse().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to automatic device selection");
            DevicePreference::Auto
        });
        Self {
            engine,
            weights_path,
            model_name,
            device_preference,
            lifecycle: Lifecycle::default(),
            model: None,
            device: None,
        }
    }

    pub(crate) fn model(&self) -> Option<SharedModel> {
        self.model.clone()
    }

    pub(crate) fn device(&self) -> Option<ResolvedDevice> {
        self.device
    }

    /// Resolve the device once and load the weights off the async runtime.
    pub(crate) async fn load(&mut self) -> bool {
        if self.lifecycle.is_ready() {
            return true;
        }
        self.lifecycle.begin_loading();

        let device = DeviceManager::resolve(self.device_preference);
        let request = LoadRequest {
            model_path: self.weights_path.clone(),
            model_name: self.model_name.clone(),
            device,
        };
        tracing::info!(
            engine = self.engine.name(),
            model = %request.model_name,
            weights = %request.model_path.display(),
            %device,
            "Loading local model"
        );

        let engine = Arc::clone(&self.engine);
        match tokio::task::spawn_blocking(move || engine.load(&request)).await {
            Ok(Ok(model)) => {
                self.model = Some(Arc::new(Mutex::new(model)));
                self.device = Some(device);
                self.lifecycle.mark_ready();
                true
            }
            Ok(Err(e)) => {
                self.lifecycle.mark_failed(e.to_string());
                false
            }
            Err(e) => {
                self.lifecycle.mark_failed(format!("model load task failed: {e}"));
                false
            }
        }
    }

    pub(crate) fn unload(&mut self) {
        if self.model.take().is_some() {
            tracing::debug!(model = %self.model_name, "Released local model");
        }
        self.device = None;
        self.lifecycle.mark_unloaded();
    }
}

/// Run `samples` through a shared model on the current (blocking) thread.
pub(crate) fn run_model(
    model: &SharedModel,
    samples: &[f32],
    options: &DecodeOptions,
) -> Result<String, EngineError> {
    let mut guard = model
        .lock()
        .map_err(|_| EngineError::Inference("model lock poisoned".to_string()))?;
    guard.transcribe_pcm(samples, options)
}

#[cfg(feature = "whisper")]
mod whisper_cpp {
    use super::{DecodeOptions, EngineError, LoadRequest, SpeechEngine, SpeechModel};
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    pub struct WhisperCppEngine;

    impl SpeechEngine for WhisperCppEngine {
        fn name(&self) -> &'static str {
            "whisper.cpp"
        }

        fn load(&self, request: &LoadRequest) -> Result<Box<dyn SpeechModel>, EngineError> {
            if !request.model_path.exists() {
                return Err(EngineError::ModelNotFound(request.model_path.clone()));
            }
            let path = request
                .model_path
                .to_str()
                .ok_or_else(|| EngineError::Load("model path is not valid UTF-8".to_string()))?;

            let ctx = WhisperContext::new_with_params(path, WhisperContextParameters::default())
                .map_err(|e| EngineError::Load(e.to_string()))?;

            Ok(Box::new(WhisperCppModel { ctx }))
        }
    }

    struct WhisperCppModel {
        ctx: WhisperContext,
    }

    impl SpeechModel for WhisperCppModel {
        fn transcribe_pcm(
            &mut self,
            samples: &[f32],
            options: &DecodeOptions,
        ) -> Result<String, EngineError> {
            let mut state = self
                .ctx
                .create_state()
                .map_err(|e| EngineError::Inference(e.to_string()))?;

            let strategy = if options.beam_size > 1 {
                SamplingStrategy::BeamSearch {
                    beam_size: options.beam_size as i32,
                    patience: -1.0,
                }
            } else {
                SamplingStrategy::Greedy { best_of: 1 }
            };

            let mut params = FullParams::new(strategy);
            params.set_language(Some(options.language.as_deref().unwrap_or("auto")));
            params.set_temperature(options.temperature);
            params.set_translate(false);
            params.set_print_special(false);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);
            params.set_n_threads(num_threads());

            state
                .full(params, samples)
                .map_err(|e| EngineError::Inference(e.to_string()))?;

            let num_segments = state
                .full_n_segments()
                .map_err(|e| EngineError::Inference(e.to_string()))?;

            let mut text = String::new();
            for i in 0..num_segments {
                let segment = state
                    .full_get_segment_text(i)
                    .map_err(|e| EngineError::Inference(e.to_string()))?;
                let segment = segment.trim();
                if !segment.is_empty() {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(segment);
                }
            }
            Ok(text)
        }
    }

    fn num_threads() -> i32 {
        std::thread::available_parallelism()
            .map(|n| n.get() as i32)
            .unwrap_or(4)
            .min(8)
    }
}
