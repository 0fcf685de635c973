//! Audio extraction from video containers.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;

use mediascribe_common::{codes, ConversionConfig, DomainError, QualityLevel};

use crate::ffmpeg::FfmpegChecker;

/// Outcome of one conversion attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub success: bool,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub error_message: Option<String>,
    pub timed_out: bool,
    pub duration_seconds: Option<f64>,
}

impl ConversionResult {
    pub fn succeeded(input: &Path, output: &Path, elapsed: Duration) -> Self {
        Self {
            success: true,
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            error_message: None,
            timed_out: false,
            duration_seconds: Some(elapsed.as_secs_f64()),
        }
    }

    pub fn failed(input: &Path, output: &Path, message: impl Into<String>) -> Self {
        Self {
            success: false,
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            error_message: Some(message.into()),
            timed_out: false,
            duration_seconds: None,
        }
    }
}

/// Extracts an audio track into a standalone file.
#[async_trait]
pub trait MediaConverter: Send + Sync {
    /// Fails when the conversion tool itself is missing.
    async fn ensure_available(&self) -> Result<(), DomainError>;

    /// Convert `input` into `output`. Never leaves a partial `output` behind on failure.
    async fn convert(&self, input: &Path, output: &Path) -> ConversionResult;
}

/// ffmpeg-backed converter producing 16 kHz MP3.
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    checker: FfmpegChecker,
    quality: QualityLevel,
    timeout: Duration,
}

impl FfmpegConverter {
    pub fn new(checker: FfmpegChecker, quality: QualityLevel, timeout: Duration) -> Self {
        Self {
            checker,
            quality,
            timeout,
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Self::new(
            FfmpegChecker::new(config.ffmpeg_binary()),
            config.quality,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Arguments passed to ffmpeg (binary excluded).
    pub fn command_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-nostdin",
            "-i",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push(input.as_os_str().to_owned());
        args.extend(
            [
                "-vn",
                "-acodec",
                "libmp3lame",
                "-ac",
                "2",
                "-ab",
                self.quality.bitrate(),
                "-ar",
                "16000",
            ]
            .iter()
            .map(OsString::from),
        );
        args.push(output.as_os_str().to_owned());
        args
    }
}

fn remove_partial_output(output: &Path) {
    if output.exists() {
        if let Err(e) = std::fs::remove_file(output) {
            tracing::debug!(path = %output.display(), error = %e, "Failed to remove partial conversion output");
        }
    }
}

#[async_trait]
impl MediaConverter for FfmpegConverter {
    async fn ensure_available(&self) -> Result<(), DomainError> {
        let checker = self.checker.clone();
        tokio::task::spawn_blocking(move || checker.ensure_available())
            .await
            .map_err(|e| {
                DomainError::conversion(format!("ffmpeg availability check failed: {e}"))
                    .with_code(codes::CV_TOOL_MISSING)
                    .fatal()
            })?
    }

    async fn convert(&self, input: &Path, output: &Path) -> ConversionResult {
        let started = Instant::now();

        if !input.exists() {
            return ConversionResult::failed(
                input,
                output,
                format!("Input file not found: {}", input.display()),
            );
        }

        let args = self.command_args(input, output);
        tracing::debug!(?args, "Running ffmpeg");

        let mut child = match tokio::process::Command::new(self.checker.binary())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return ConversionResult::failed(
                    input,
                    output,
                    format!("Failed to start {}: {e}", self.checker.binary()),
                )
            }
        };

        tracing::info!(
            pid = child.id().unwrap_or_default(),
            input = %input.display(),
            output = %output.display(),
            quality = self.quality.bitrate(),
            "Conversion started"
        );

        // Drain stderr concurrently so a chatty child never blocks on a full pipe.
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                if let Err(err) = stderr.read_to_string(&mut buf).await {
                    return format!("<failed to read stderr: {err}>");
                }
            }
            buf
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                stderr_task.abort();
                remove_partial_output(output);
                return ConversionResult::failed(
                    input,
                    output,
                    format!("Failed to wait on conversion process: {e}"),
                );
            }
            Err(_) => {
                // kill() also reaps the child.
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill timed-out conversion process");
                }
                stderr_task.abort();
                remove_partial_output(output);
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs_f64(),
                    input = %input.display(),
                    "Conversion timed out"
                );
                return ConversionResult {
                    timed_out: true,
                    ..ConversionResult::failed(
                        input,
                        output,
                        format!(
                            "Conversion timeout after {} seconds",
                            self.timeout.as_secs()
                        ),
                    )
                };
            }
        };

        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if status.success() && output.exists() {
            tracing::info!(
                elapsed_secs = started.elapsed().as_secs_f64(),
                output = %output.display(),
                "Conversion finished"
            );
            return ConversionResult::succeeded(input, output, started.elapsed());
        }

        remove_partial_output(output);
        let detail = stderr_output.trim();
        let message = if status.success() {
            "Conversion produced no output file".to_string()
        } else if detail.is_empty() {
            format!("Conversion failed (status {status})")
        } else {
            format!("Conversion failed (status {status}): {detail}")
        };
        ConversionResult::failed(input, output, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args_layout() {
        let converter = FfmpegConverter::new(
            FfmpegChecker::new("ffmpeg"),
            QualityLevel::High,
            Duration::from_secs(600),
        );
        let args: Vec<String> = converter
            .command_args(Path::new("/in/talk.webm"), Path::new("/tmp/talk.mp3"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "-hide_banner", "-loglevel", "error", "-y", "-nostdin", "-i", "/in/talk.webm",
                "-vn", "-acodec", "libmp3lame", "-ac", "2", "-ab", "256k", "-ar", "16000",
                "/tmp/talk.mp3",
            ]
        );
    }

    #[test]
    fn test_from_config_uses_timeout_and_quality() {
        let config = ConversionConfig {
            quality: QualityLevel::Low,
            timeout_secs: 42,
            ..ConversionConfig::default()
        };
        let converter = FfmpegConverter::from_config(&config);
        assert_eq!(converter.timeout(), Duration::from_secs(42));
        assert_eq!(converter.quality, QualityLevel::Low);
    }

    #[tokio::test]
    async fn test_missing_input_fails_without_spawning() {
        let converter = FfmpegConverter::new(
            FfmpegChecker::new("/nonexistent/ffmpeg"),
            QualityLevel::Medium,
            Duration::from_secs(1),
        );
        let result = converter
            .convert(Path::new("/nonexistent/a.webm"), Path::new("/tmp/a.mp3"))
            .await;
        assert!(!result.success);
        assert!(!result.timed_out);
        assert!(result
            .error_message
            .unwrap()
            .starts_with("Input file not found"));
    }
}
