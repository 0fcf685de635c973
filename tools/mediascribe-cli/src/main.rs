//! MediaScribe CLI: command-line interface for media transcription.
//!
//! Usage:
//!   mediascribe transcribe <INPUT> [OUTPUT]   Transcribe a video or audio file
//!   mediascribe models                        List available models
//!   mediascribe describe <MODEL>              Show model metadata
//!   mediascribe formats                       List supported input formats
//!   mediascribe check                         Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mediascribe_common::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "mediascribe",
    about = "Convert video and audio files to text with local or cloud Whisper models",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $MEDIASCRIBE_CONFIG or ~/.config/mediascribe/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe a media file
    Transcribe {
        /// Input video or audio file
        input: PathBuf,

        /// Output text file (defaults to <input-stem>_transcription.txt)
        output: Option<PathBuf>,

        /// Model identifier, e.g. LOCAL_BREEZE, whisper-small, OPENAI_API
        #[arg(short, long)]
        model: Option<String>,

        /// Compute device: auto|cpu|cuda|metal
        #[arg(long)]
        device: Option<String>,

        /// Language hint (ISO 639-1) or auto
        #[arg(short, long)]
        language: Option<String>,

        /// Retries for retryable stages
        #[arg(long)]
        max_retries: Option<u32>,

        /// Also print the transcription to stdout
        #[arg(long)]
        print: bool,
    },

    /// List available models
    Models,

    /// Show metadata for one model
    Describe {
        /// Model identifier
        model: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List supported input formats
    Formats,

    /// Check system capabilities
    Check,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => Ok(AppConfig::load_from(path)?),
        None => Ok(AppConfig::load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    mediascribe_common::logging::init_logging_verbose(&config.logging, cli.verbose);

    match cli.command {
        Commands::Transcribe {
            input,
            output,
            model,
            device,
            language,
            max_retries,
            print,
        } => {
            commands::transcribe::run(
                config,
                commands::transcribe::TranscribeArgs {
                    input,
                    output,
                    model,
                    device,
                    language,
                    max_retries,
                    print,
                },
            )
            .await
        }
        Commands::Models => commands::models::run(&config),
        Commands::Describe { model, json } => commands::describe::run(&config, &model, json),
        Commands::Formats => commands::formats::run(),
        Commands::Check => commands::check::run(&config),
    }
}
