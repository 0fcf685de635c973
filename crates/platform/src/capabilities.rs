//! Capability detection and guidance.
//!
//! MediaScribe needs different things depending on the input and the
//! backend: ffmpeg for video, model weights for local backends, an API
//! key for the cloud backend.

use std::path::PathBuf;

use mediascribe_common::AppConfig;

use crate::device::DeviceManager;
use crate::memory::system_memory_mb;

/// A host capability MediaScribe may need.
#[derive(Debug, Clone)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub available: bool,
    pub required: bool,
    pub fix_instructions: Option<String>,
}

/// What to probe for.
#[derive(Debug, Clone)]
pub struct CapabilityInputs {
    pub ffmpeg_binary: String,
    pub models_dir: PathBuf,
    pub api_key_env: String,
    /// Working memory the selected model needs, when known.
    pub model_memory_mb: Option<u32>,
}

impl CapabilityInputs {
    /// Check host memory against `required_mb` as well.
    pub fn with_model_memory(mut self, required_mb: u32) -> Self {
        self.model_memory_mb = Some(required_mb);
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            ffmpeg_binary: config.conversion.ffmpeg_binary(),
            models_dir: config.models_dir.clone(),
            api_key_env: config.cloud.api_key_env.clone(),
            model_memory_mb: None,
        }
    }
}

/// Check all capabilities and report status.
pub fn check_capabilities(inputs: &CapabilityInputs) -> Vec<Capability> {
    let mut capabilities = vec![
        check_ffmpeg(&inputs.ffmpeg_binary),
        check_models_dir(&inputs.models_dir),
        check_accelerator(),
        check_api_key(&inputs.api_key_env),
    ];
    if let Some(required_mb) = inputs.model_memory_mb.filter(|mb| *mb > 0) {
        capabilities.push(check_model_memory(required_mb, system_memory_mb()));
    }
    capabilities
}

fn check_ffmpeg(binary: &str) -> Capability {
    let available = crate::command_exists(binary);

    Capability {
        name: "FFmpeg".to_string(),
        description: "Extracts audio tracks from video containers".to_string(),
        available,
        required: true,
        fix_instructions: if available {
            None
        } else {
            Some(install_hint().to_string())
        },
    }
}

fn check_models_dir(dir: &std::path::Path) -> Capability {
    let has_models = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .any(|e| e.path().extension().is_some_and(|ext| ext == "bin"))
        })
        .unwrap_or(false);

    Capability {
        name: "Local Model Weights".to_string(),
        description: format!("ggml model files under {}", dir.display()),
        available: has_models,
        required: false,
        fix_instructions: if has_models {
            None
        } else {
            Some(format!(
                "Download a model, e.g. ggml-small.bin, into {}",
                dir.display()
            ))
        },
    }
}

fn check_accelerator() -> Capability {
    let device = DeviceManager::best_device();

    Capability {
        name: "GPU Acceleration".to_string(),
        description: format!("Best local inference device: {device}"),
        available: device.is_accelerated(),
        required: false,
        fix_instructions: if device.is_accelerated() {
            None
        } else {
            Some("Local models will run on CPU. Install NVIDIA drivers for CUDA support.".to_string())
        },
    }
}

fn check_api_key(env_name: &str) -> Capability {
    let available = std::env::var(env_name)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);

    Capability {
        name: "Cloud API Key".to_string(),
        description: format!("{env_name} for the OpenAI transcription backend"),
        available,
        required: false,
        fix_instructions: if available {
            None
        } else {
            Some(format!("export {env_name}=<your key>"))
        },
    }
}

fn check_model_memory(required_mb: u32, total_mb: Option<f64>) -> Capability {
    let available = total_mb.is_some_and(|total| total >= f64::from(required_mb));
    let description = match total_mb {
        Some(total) => format!("Model needs ~{required_mb} MB, host has {total:.0} MB"),
        None => format!("Model needs ~{required_mb} MB, host memory unknown"),
    };

    Capability {
        name: "Model Memory".to_string(),
        description,
        available,
        required: false,
        fix_instructions: if available {
            None
        } else {
            Some("Choose a smaller model (e.g. whisper-base) or the OPENAI_API backend.".to_string())
        },
    }
}

/// One line per missing required capability.
pub fn requirement_issues(capabilities: &[Capability]) -> Vec<String> {
    capabilities
        .iter()
        .filter(|c| c.required && !c.available)
        .map(|c| match &c.fix_instructions {
            Some(fix) => format!("{} not available. {fix}", c.name),
            None => format!("{} not available.", c.name),
        })
        .collect()
}

/// Platform-specific ffmpeg install hint.
pub fn install_hint() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install FFmpeg: brew install ffmpeg"
    } else if cfg!(target_os = "windows") {
        "Install FFmpeg: winget install ffmpeg (or download from https://ffmpeg.org/download.html)"
    } else {
        "Install FFmpeg: sudo apt install ffmpeg (Debian/Ubuntu) or sudo dnf install ffmpeg (Fedora)"
    }
}

/// Print a user-friendly capability report.
pub fn print_capability_report(capabilities: &[Capability]) {
    println!("MediaScribe System Capabilities:");
    println!("{}", "-".repeat(60));

    for cap in capabilities {
        let status = if cap.available {
            "[OK]"
        } else if cap.required {
            "[MISSING - REQUIRED]"
        } else {
            "[MISSING - OPTIONAL]"
        };

        println!("  {} {}: {}", status, cap.name, cap.description);

        if let Some(ref fix) = cap.fix_instructions {
            println!("    Fix: {fix}");
        }
    }
}

/// True when no required capability is missing.
pub fn all_required_available(capabilities: &[Capability]) -> bool {
    capabilities.iter().all(|c| c.available || !c.required)
}
