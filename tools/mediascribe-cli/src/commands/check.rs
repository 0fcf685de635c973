//! Check system capabilities.

use mediascribe_common::AppConfig;
use mediascribe_media::FfmpegChecker;
use mediascribe_platform::{
    all_required_available, check_capabilities, memory_recommendations, print_capability_report,
    requirement_issues, system_memory_mb, CapabilityInputs, DeviceManager,
};
use mediascribe_transcription::ModelType;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("MediaScribe System Check");
    println!("{}", "=".repeat(50));

    let checker = FfmpegChecker::new(config.conversion.ffmpeg_binary());
    match checker.version() {
        Ok(version) if checker.meets_minimum() => println!("[OK] FFmpeg version: {version}"),
        Ok(version) => println!("[WARN] FFmpeg version {version} is older than 4.0"),
        Err(_) => println!("[WARN] FFmpeg version: unknown"),
    }

    let device = DeviceManager::best_device();
    println!("[OK] Best compute device: {device}");
    println!("[OK] Models directory: {}", config.models_dir.display());
    match system_memory_mb() {
        Some(total) => println!("[OK] System memory: {total:.0} MB"),
        None => println!("[WARN] System memory: unknown"),
    }

    let recommended = memory_recommendations(device);
    println!(
        "     Recommended RAM for local models on {device}: {} GB (minimum {} GB)",
        recommended.recommended_ram_gb, recommended.min_ram_gb
    );

    let mut inputs = CapabilityInputs::from_config(config);
    match config.model.default_model.parse::<ModelType>() {
        Ok(model) => inputs = inputs.with_model_memory(model.memory_requirements_mb()),
        Err(e) => println!("[WARN] Default model: {}", e.message),
    }

    let capabilities = check_capabilities(&inputs);
    println!();
    print_capability_report(&capabilities);

    println!();
    if all_required_available(&capabilities) {
        println!("All required capabilities are available. MediaScribe is ready.");
    } else {
        for issue in requirement_issues(&capabilities) {
            println!("  - {issue}");
        }
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}
