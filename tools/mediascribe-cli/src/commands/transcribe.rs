//! Transcribe one media file.

use std::path::PathBuf;

use mediascribe_common::AppConfig;
use mediascribe_pipeline::{default_output_path, WorkflowPipeline};

pub struct TranscribeArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub model: Option<String>,
    pub device: Option<String>,
    pub language: Option<String>,
    pub max_retries: Option<u32>,
    pub print: bool,
}

pub async fn run(mut config: AppConfig, args: TranscribeArgs) -> anyhow::Result<()> {
    if let Some(model) = args.model {
        config.model.default_model = model;
    }
    if let Some(device) = args.device {
        config.model.device = device;
    }
    if let Some(language) = args.language {
        config.model.language = language;
    }
    if let Some(max_retries) = args.max_retries {
        config.retry.max_retries = max_retries;
    }

    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));
    tracing::debug!(output = %output.display(), "Resolved output path");

    let mut pipeline = WorkflowPipeline::from_config(&config)?;
    println!(
        "Transcribing {} with {}",
        args.input.display(),
        pipeline.descriptor().model_type.display_name()
    );

    let result = pipeline.process_file(&args.input, &output).await;
    if !result.success {
        anyhow::bail!(
            "{}",
            result
                .error_message
                .unwrap_or_else(|| "Transcription failed".to_string())
        );
    }

    println!("Transcription saved to: {}", result.output_path.display());
    if let Some(duration) = result.duration_seconds {
        println!("  Audio duration: {duration:.1}s");
    }
    if args.print {
        if let Some(text) = &result.transcription {
            println!();
            println!("{text}");
        }
    }

    Ok(())
}
