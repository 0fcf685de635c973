//! List available models.

use mediascribe_common::AppConfig;
use mediascribe_transcription::ModelType;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Available models");
    println!("{}", "=".repeat(50));

    for model in ModelType::ALL {
        let marker = if config.model.default_model.parse::<ModelType>().ok() == Some(model) {
            "*"
        } else {
            " "
        };
        let location = if model.is_api() { "cloud" } else { "local" };
        println!(
            "{marker} {:<22} {:<28} {location:<6} {} MB",
            model.id(),
            model.display_name(),
            model.memory_requirements_mb()
        );

        if let Some(weights) = model.weights_filename() {
            let path = config.models_dir.join(weights);
            let state = if path.exists() { "present" } else { "missing" };
            println!("    weights: {} ({state})", path.display());
        }
    }

    println!();
    println!("* = configured default");
    Ok(())
}
