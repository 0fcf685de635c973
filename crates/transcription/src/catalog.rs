//! Model catalog: identifiers, per-model defaults and metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use mediascribe_common::{codes, DomainError, ModelPreferences};

pub const BREEZE_MODEL_NAME: &str = "MediaTek-Research/Breeze-ASR-25";
pub const OPENAI_API_MODEL_NAME: &str = "whisper-1";

pub const DEFAULT_CHUNK_LENGTH: u32 = 30;
pub const DEFAULT_DEVICE: &str = "auto";
pub const DEFAULT_LANGUAGE: &str = "auto";

/// Languages reported for Whisper-family models (the most common of the 99 supported).
pub const WHISPER_LANGUAGES: &[&str] = &[
    "en", "zh", "ja", "ko", "es", "fr", "de", "it", "pt", "ru", "ar", "hi", "th", "vi", "id",
    "ms", "tl", "tr", "pl", "nl", "sv", "da", "no", "fi", "cs", "sk", "hu", "ro", "bg", "hr",
    "uk", "el", "he", "fa", "ur", "bn", "ta", "te",
];

/// The closed set of selectable models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    #[serde(rename = "LOCAL_BREEZE")]
    LocalBreeze,
    #[serde(rename = "LOCAL_WHISPER_BASE")]
    LocalWhisperBase,
    #[serde(rename = "LOCAL_WHISPER_SMALL")]
    LocalWhisperSmall,
    #[serde(rename = "LOCAL_WHISPER_MEDIUM")]
    LocalWhisperMedium,
    #[serde(rename = "LOCAL_WHISPER_LARGE")]
    LocalWhisperLarge,
    #[serde(rename = "OPENAI_API")]
    OpenAiApi,
}

impl ModelType {
    pub const ALL: [ModelType; 6] = [
        ModelType::LocalBreeze,
        ModelType::LocalWhisperBase,
        ModelType::LocalWhisperSmall,
        ModelType::LocalWhisperMedium,
        ModelType::LocalWhisperLarge,
        ModelType::OpenAiApi,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ModelType::LocalBreeze => "LOCAL_BREEZE",
            ModelType::LocalWhisperBase => "LOCAL_WHISPER_BASE",
            ModelType::LocalWhisperSmall => "LOCAL_WHISPER_SMALL",
            ModelType::LocalWhisperMedium => "LOCAL_WHISPER_MEDIUM",
            ModelType::LocalWhisperLarge => "LOCAL_WHISPER_LARGE",
            ModelType::OpenAiApi => "OPENAI_API",
        }
    }

    pub fn is_local(&self) -> bool {
        self.id().starts_with("LOCAL_")
    }

    pub fn is_api(&self) -> bool {
        self.id().ends_with("_API")
    }

    /// Size variant for the Whisper family.
    pub fn whisper_size(&self) -> Option<&'static str> {
        match self {
            ModelType::LocalWhisperBase => Some("base"),
            ModelType::LocalWhisperSmall => Some("small"),
            ModelType::LocalWhisperMedium => Some("medium"),
            ModelType::LocalWhisperLarge => Some("large"),
            _ => None,
        }
    }

    /// Upstream model name used by default.
    pub fn default_model_name(&self) -> &'static str {
        match self {
            ModelType::LocalBreeze => BREEZE_MODEL_NAME,
            ModelType::LocalWhisperBase => "openai/whisper-base",
            ModelType::LocalWhisperSmall => "openai/whisper-small",
            ModelType::LocalWhisperMedium => "openai/whisper-medium",
            ModelType::LocalWhisperLarge => "openai/whisper-large",
            ModelType::OpenAiApi => OPENAI_API_MODEL_NAME,
        }
    }

    /// ggml weights file expected under the models directory.
    pub fn weights_filename(&self) -> Option<&'static str> {
        match self {
            ModelType::LocalBreeze => Some("ggml-breeze-asr-25.bin"),
            ModelType::LocalWhisperBase => Some("ggml-base.bin"),
            ModelType::LocalWhisperSmall => Some("ggml-small.bin"),
            ModelType::LocalWhisperMedium => Some("ggml-medium.bin"),
            ModelType::LocalWhisperLarge => Some("ggml-large.bin"),
            ModelType::OpenAiApi => None,
        }
    }

    /// Approximate working memory in MB.
    pub fn memory_requirements_mb(&self) -> u32 {
        match self {
            ModelType::LocalBreeze => 2048,
            ModelType::LocalWhisperBase => 1024,
            ModelType::LocalWhisperSmall => 2048,
            ModelType::LocalWhisperMedium => 4096,
            ModelType::LocalWhisperLarge => 8192,
            ModelType::OpenAiApi => 0,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::LocalBreeze => "MediaTek Breeze-ASR-25",
            ModelType::LocalWhisperBase => "OpenAI Whisper Base",
            ModelType::LocalWhisperSmall => "OpenAI Whisper Small",
            ModelType::LocalWhisperMedium => "OpenAI Whisper Medium",
            ModelType::LocalWhisperLarge => "OpenAI Whisper Large",
            ModelType::OpenAiApi => "OpenAI Whisper API",
        }
    }

    pub fn supported_languages(&self) -> Vec<String> {
        match self {
            ModelType::LocalBreeze => ["zh", "en", "ja", "ko"].map(String::from).to_vec(),
            _ => WHISPER_LANGUAGES.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn benchmark(&self) -> BTreeMap<String, f64> {
        let (wer_en, wer_zh, rtf) = match self {
            ModelType::LocalBreeze => (0.12, 0.08, 1.0),
            ModelType::OpenAiApi => (0.03, 0.08, 0.1),
            _ => (0.05, 0.10, 0.8),
        };
        BTreeMap::from([
            ("wer_en".to_string(), wer_en),
            ("wer_zh".to_string(), wer_zh),
            ("rtf".to_string(), rtf),
        ])
    }

    fn available_ids() -> String {
        Self::ALL.iter().map(|m| m.id()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelType {
    type Err = DomainError;

    /// Accepts catalog ids in any case and short aliases like `whisper-small`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "LOCAL_BREEZE" | "BREEZE" => Ok(ModelType::LocalBreeze),
            "LOCAL_WHISPER_BASE" | "WHISPER_BASE" => Ok(ModelType::LocalWhisperBase),
            "LOCAL_WHISPER_SMALL" | "WHISPER_SMALL" => Ok(ModelType::LocalWhisperSmall),
            "LOCAL_WHISPER_MEDIUM" | "WHISPER_MEDIUM" => Ok(ModelType::LocalWhisperMedium),
            "LOCAL_WHISPER_LARGE" | "WHISPER_LARGE" => Ok(ModelType::LocalWhisperLarge),
            "OPENAI_API" | "OPENAI" | "WHISPER_1" | "API" => Ok(ModelType::OpenAiApi),
            _ => Err(DomainError::transcription(format!(
                "Unknown model type: {s}. Available models: {}",
                Self::available_ids()
            ))
            .with_code(codes::TR_UNKNOWN_MODEL)
            .fatal()),
        }
    }
}

/// Everything needed to construct one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub model_type: ModelType,
    pub model_name: String,
    pub device: String,
    pub language: String,
    pub temperature: f32,
    pub beam_size: u32,
    pub chunk_length_seconds: u32,
    #[serde(default)]
    pub extra_params: BTreeMap<String, Value>,
}

impl BackendDescriptor {
    /// Catalog defaults for a model.
    pub fn for_model(model_type: ModelType) -> Self {
        Self {
            model_type,
            model_name: model_type.default_model_name().to_string(),
            device: if model_type.is_api() {
                "api".to_string()
            } else {
                DEFAULT_DEVICE.to_string()
            },
            language: DEFAULT_LANGUAGE.to_string(),
            temperature: 0.0,
            beam_size: 1,
            chunk_length_seconds: DEFAULT_CHUNK_LENGTH,
            extra_params: BTreeMap::new(),
        }
    }

    /// Defaults for `model_type` overlaid with configured preferences.
    pub fn with_preferences(model_type: ModelType, prefs: &ModelPreferences) -> Self {
        let mut descriptor = Self::for_model(model_type);
        if model_type.is_local() {
            descriptor.device = prefs.device.clone();
        }
        descriptor.language = prefs.language.clone();
        descriptor.temperature = prefs.temperature;
        descriptor.beam_size = prefs.beam_size.max(1);
        descriptor.chunk_length_seconds = prefs.chunk_length_secs.max(1);
        descriptor
    }

    /// Parse the configured default model and apply the preferences.
    pub fn from_preferences(prefs: &ModelPreferences) -> Result<Self, DomainError> {
        let model_type: ModelType = prefs.default_model.parse()?;
        Ok(Self::with_preferences(model_type, prefs))
    }

    /// `None` when the language should be auto-detected.
    pub fn language_hint(&self) -> Option<&str> {
        let lang = self.language.trim();
        if lang.is_empty() || lang.eq_ignore_ascii_case("auto") {
            None
        } else {
            Some(lang)
        }
    }

    /// Short identifier reported as `model_used`.
    pub fn identifier(&self) -> String {
        match self.model_type.whisper_size() {
            Some(size) => format!("whisper-{size}"),
            None => self.model_name.clone(),
        }
    }
}

/// Descriptive information about a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    pub version: String,
    pub model_type: ModelType,
    pub languages_supported: Vec<String>,
    pub memory_requirements_mb: u32,
    pub performance_benchmark: BTreeMap<String, f64>,
    pub additional_info: BTreeMap<String, Value>,
}

impl ModelMetadata {
    /// Catalog metadata for a descriptor, before any backend-specific additions.
    pub fn for_descriptor(descriptor: &BackendDescriptor) -> Self {
        let model_type = descriptor.model_type;
        let mut additional_info = BTreeMap::new();
        additional_info.insert("model_name".to_string(), Value::from(descriptor.model_name.clone()));
        if let Some(size) = model_type.whisper_size() {
            additional_info.insert("model_size".to_string(), Value::from(size));
            additional_info.insert("model_identifier".to_string(), Value::from(descriptor.identifier()));
        }
        if let Some(weights) = model_type.weights_filename() {
            additional_info.insert("weights_file".to_string(), Value::from(weights));
        }
        additional_info.insert("api_based".to_string(), Value::from(model_type.is_api()));

        Self {
            name: model_type.display_name().to_string(),
            version: "1.0".to_string(),
            model_type,
            languages_supported: model_type.supported_languages(),
            memory_requirements_mb: model_type.memory_requirements_mb(),
            performance_benchmark: model_type.benchmark(),
            additional_info,
        }
    }
}
