//! Show metadata for one model.

use mediascribe_common::AppConfig;
use mediascribe_transcription::{BackendDescriptor, ModelMetadata, ModelType};

pub fn run(config: &AppConfig, model: &str, json: bool) -> anyhow::Result<()> {
    let model_type: ModelType = model.parse()?;
    let descriptor = BackendDescriptor::with_preferences(model_type, &config.model);
    let metadata = ModelMetadata::for_descriptor(&descriptor);

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    println!("Model: {}", metadata.name);
    println!("  ID: {}", model_type.id());
    println!("  Version: {}", metadata.version);
    println!("  Memory: {} MB", metadata.memory_requirements_mb);
    println!("  Device: {}", descriptor.device);
    println!("  Language: {}", descriptor.language);
    if model_type == ModelType::LocalBreeze {
        println!("  Chunk length: {}s", descriptor.chunk_length_seconds);
    }
    println!("  Languages supported: {}", metadata.languages_supported.len());
    println!();

    println!("Benchmark:");
    for (key, value) in &metadata.performance_benchmark {
        println!("  {key}: {value}");
    }
    println!();

    println!("Details:");
    for (key, value) in &metadata.additional_info {
        println!("  {key}: {value}");
    }

    Ok(())
}
