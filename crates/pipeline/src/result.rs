use serde::Serialize;
use std::path::{Path, PathBuf};

/// Outcome of one [`crate::WorkflowPipeline::process_file`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowResult {
    pub success: bool,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub transcription: Option<String>,
    pub error_message: Option<String>,
    /// Audio duration reported by validation.
    pub duration_seconds: Option<f64>,
}

impl WorkflowResult {
    pub fn succeeded(
        input: &Path,
        output: &Path,
        transcription: String,
        duration_seconds: Option<f64>,
    ) -> Self {
        Self {
            success: true,
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            transcription: Some(transcription),
            error_message: None,
            duration_seconds,
        }
    }

    pub fn failed(input: &Path, output: &Path, message: impl Into<String>) -> Self {
        Self {
            success: false,
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            transcription: None,
            error_message: Some(message.into()),
            duration_seconds: None,
        }
    }
}
