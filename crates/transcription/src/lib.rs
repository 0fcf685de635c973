//! MediaScribe Transcription Backends
//!
//! Every backend implements [`TranscriptionBackend`], a uniform
//! load → transcribe → unload lifecycle tracked by [`ServiceStatus`]:
//! - **Chunked local** ([`ChunkedLocalBackend`]): fixed windows, joined text
//! - **Whisper family** ([`WhisperFamilyBackend`]): whole-file decode, size variants
//! - **Cloud** ([`OpenAiBackend`]): OpenAI transcription API with cost tracking
//!
//! [`BackendSelector`] maps a [`ModelType`] to a constructed backend.

pub mod backend;
pub mod catalog;
pub mod chunked;
pub mod cloud;
pub mod engine;
pub mod selector;
pub mod status;
pub mod whisper;

#[cfg(test)]
mod test_support;

pub use backend::{run_scoped, TranscriptionBackend, TranscriptionOutcome, NOT_READY_MESSAGE};
pub use catalog::{BackendDescriptor, ModelMetadata, ModelType};
pub use chunked::ChunkedLocalBackend;
pub use cloud::{ApiError, ApiRequest, CostSummary, CostTracker, OpenAiBackend, OpenAiClient, TranscriptionApi};
pub use engine::{default_engine, DecodeOptions, EngineError, LoadRequest, SpeechEngine, SpeechModel};
pub use selector::{BackendFactory, BackendSelector};
pub use status::{Lifecycle, ServiceStatus};
pub use whisper::WhisperFamilyBackend;
