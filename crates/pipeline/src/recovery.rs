//! Retry with backoff, temp-file cleanup and recovery suggestions.

use rand::Rng;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use mediascribe_common::{codes, DomainError, ErrorKind, MediascribeError, RetryConfig};

use crate::temp_files::TempFileTracker;

/// Error codes treated as transient when a [`DomainError`] carries no
/// explicit retry flag.
pub const TRANSIENT_ERROR_CODES: [&str; 6] = [
    codes::CV_TIMEOUT,
    codes::CV_NETWORK,
    codes::CV_TEMP_FAILURE,
    codes::TR_MODEL_LOADING,
    codes::TR_MEMORY_ERROR,
    codes::VL_TEMP_UNAVAILABLE,
];

/// Explicit flag first, then the transient code list.
pub fn is_retryable(error: &DomainError) -> bool {
    match error.can_retry {
        Some(flag) => flag,
        None => error
            .code()
            .map(|code| TRANSIENT_ERROR_CODES.contains(&code))
            .unwrap_or(false),
    }
}

/// Delay before the `attempt`-th retry, without jitter. Never exceeds `max_delay`.
pub fn capped_delay(attempt: u32, config: &RetryConfig) -> f64 {
    let delay = if config.exponential_backoff {
        // Clamp the exponent; anything past 2^1023 is infinite anyway.
        config.base_delay * 2f64.powi(attempt.min(1023) as i32)
    } else {
        config.base_delay
    };
    delay.min(config.max_delay).max(0.0)
}

/// [`capped_delay`] plus up to 10% uniform jitter when enabled.
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> f64 {
    let delay = capped_delay(attempt, config);
    if config.jitter && delay > 0.0 && delay.is_finite() {
        delay + rand::thread_rng().gen_range(0.0..=delay * 0.1)
    } else {
        delay
    }
}

/// Seconds to a sleepable [`Duration`], saturating at [`Duration::MAX`].
pub fn backoff_duration(delay: f64) -> Duration {
    Duration::try_from_secs_f64(delay).unwrap_or(if delay > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

/// Retries stage operations and owns the run's temp files.
#[derive(Debug, Default)]
pub struct ErrorRecoveryManager {
    config: RetryConfig,
    temp_files: TempFileTracker,
}

impl ErrorRecoveryManager {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            temp_files: TempFileTracker::new(),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn temp_files(&self) -> &TempFileTracker {
        &self.temp_files
    }

    pub fn track_temp_file(&mut self, path: impl Into<PathBuf>) {
        self.temp_files.track(path);
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_retries + 1` attempts have been made.
    ///
    /// Only [`MediascribeError::Domain`] errors are candidates for retry;
    /// anything else is returned after the first attempt. The last error is
    /// returned unchanged.
    pub async fn retry_operation<T, F, Fut>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, MediascribeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MediascribeError>>,
    {
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation = operation_name, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let retryable = error.as_domain().map(is_retryable).unwrap_or(false);
            if !retryable {
                tracing::debug!(operation = operation_name, attempt, error = %error, "Not retrying");
                return Err(error);
            }
            if attempt >= max_attempts {
                tracing::warn!(
                    operation = operation_name,
                    attempts = attempt,
                    error = %error,
                    "Giving up after exhausting retries"
                );
                return Err(error);
            }

            let delay = calculate_delay(attempt, &self.config);
            tracing::warn!(
                operation = operation_name,
                attempt,
                max_attempts,
                delay_secs = delay,
                error = %error,
                "Operation failed, retrying"
            );
            tokio::time::sleep(backoff_duration(delay)).await;
        }
    }

    /// Delete every tracked temp file. Never fails.
    pub fn cleanup_temp_files(&mut self) -> usize {
        let removed = self.temp_files.cleanup();
        if removed > 0 {
            tracing::debug!(removed, "Cleaned up temp files");
        }
        removed
    }

    /// Actionable remediation text for a classified error.
    pub fn get_recovery_suggestion(&self, error: &DomainError) -> String {
        recovery_suggestion(error)
    }
}

/// See [`ErrorRecoveryManager::get_recovery_suggestion`]. An explicit
/// suggestion on the error wins over the kind-based text.
pub fn recovery_suggestion(error: &DomainError) -> String {
    if let Some(explicit) = &error.recovery_suggestion {
        return explicit.clone();
    }
    let message = error.message.to_lowercase();
    let text = match &error.kind {
        ErrorKind::Conversion { .. } => {
            if error.code() == Some(codes::CV_TOOL_MISSING) || message.contains("ffmpeg") {
                "FFmpeg is required for media conversion. Install it using: brew install ffmpeg (macOS) or sudo apt install ffmpeg (Ubuntu/Debian)"
            } else if message.contains("timeout") {
                "Conversion timed out. Try with a smaller file or increase the timeout limit in configuration."
            } else {
                "Check that the input file is valid and not corrupted. Ensure sufficient disk space for output file."
            }
        }
        ErrorKind::Validation { .. } => {
            if message.contains("format") {
                "Check that the audio file is in a supported format (MP3, WAV, FLAC, OGG, AAC, M4A)."
            } else if message.contains("corrupted") {
                "The audio file appears to be corrupted. Try with a different file or re-download the original."
            } else {
                "Check the audio file properties and ensure it's a valid audio file."
            }
        }
        ErrorKind::Transcription { .. } => {
            if message.contains("model") {
                "Check internet connection for model download. Ensure sufficient disk space for model files (~2GB)."
            } else if message.contains("memory") {
                "Insufficient memory for transcription. Try with shorter audio segments or reduce concurrent processing."
            } else {
                "Check audio quality and ensure the file is not silent or corrupted. Try with a different audio file."
            }
        }
    };
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn no_jitter(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: 1.0,
            max_delay: 30.0,
            exponential_backoff: true,
            jitter: false,
        }
    }

    #[test]
    fn test_exponential_delays_double() {
        let config = no_jitter(3);
        assert_eq!(capped_delay(1, &config), 2.0);
        assert_eq!(capped_delay(2, &config), 4.0);
        assert_eq!(capped_delay(3, &config), 8.0);
        assert_eq!(calculate_delay(3, &config), 8.0);
    }

    #[test]
    fn test_fixed_delay_when_backoff_disabled() {
        let config = RetryConfig {
            exponential_backoff: false,
            ..no_jitter(3)
        };
        for attempt in 1..6 {
            assert_eq!(calculate_delay(attempt, &config), 1.0);
        }
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig {
            max_delay: 5.0,
            ..no_jitter(3)
        };
        assert_eq!(calculate_delay(10, &config), 5.0);
        assert_eq!(calculate_delay(u32::MAX, &config), 5.0);
    }

    #[test]
    fn test_jitter_only_adds_up_to_ten_percent() {
        let config = RetryConfig {
            jitter: true,
            ..no_jitter(3)
        };
        for _ in 0..200 {
            let delay = calculate_delay(2, &config);
            assert!((4.0..=4.4 + 1e-9).contains(&delay), "delay {delay}");
        }
    }

    #[test]
    fn test_backoff_duration_saturates() {
        assert_eq!(backoff_duration(1.5), Duration::from_millis(1500));
        assert_eq!(backoff_duration(1e20), Duration::MAX);
        assert_eq!(backoff_duration(f64::INFINITY), Duration::MAX);
        assert_eq!(backoff_duration(f64::NAN), Duration::ZERO);
    }

    #[test]
    fn test_unbounded_delay_skips_jitter() {
        let config = RetryConfig {
            base_delay: 1e300,
            max_delay: f64::INFINITY,
            jitter: true,
            ..no_jitter(3)
        };
        assert!(config.validate().is_ok());
        assert_eq!(calculate_delay(30, &config), f64::INFINITY);
        assert_eq!(backoff_duration(calculate_delay(30, &config)), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_valid_delay_does_not_panic() {
        let config = RetryConfig {
            max_retries: 1,
            base_delay: 1e20,
            max_delay: 1e20,
            exponential_backoff: true,
            jitter: false,
        };
        assert!(config.validate().is_ok());

        let manager = ErrorRecoveryManager::new(config);
        let calls = AtomicUsize::new(0);
        let result = manager
            .retry_operation("slow_backoff", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(MediascribeError::from(DomainError::conversion("x").retryable()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_explicit_flag_beats_transient_code() {
        let fatal_timeout = DomainError::conversion("slow")
            .with_code(codes::CV_TIMEOUT)
            .fatal();
        assert!(!is_retryable(&fatal_timeout));

        let coded = DomainError::conversion("slow").with_code(codes::CV_TIMEOUT);
        assert!(is_retryable(&coded));

        let plain = DomainError::transcription("nope").with_code("SOMETHING_ELSE");
        assert!(!is_retryable(&plain));
        assert!(is_retryable(&plain.retryable()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_is_max_retries_plus_one() {
        let manager = ErrorRecoveryManager::new(no_jitter(2));
        let calls = AtomicUsize::new(0);

        let result: Result<(), _> = manager
            .retry_operation("always_fails", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(MediascribeError::from(DomainError::transcription("flaky").retryable())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_runs_once_and_is_returned_unchanged() {
        let manager = ErrorRecoveryManager::new(no_jitter(5));
        let calls = AtomicUsize::new(0);

        let err = manager
            .retry_operation("fatal", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(MediascribeError::from(
                        DomainError::validation("bad header")
                            .with_code(codes::VL_INVALID_AUDIO)
                            .fatal(),
                    ))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let domain = err.as_domain().unwrap();
        assert_eq!(domain.message, "bad header");
        assert_eq!(domain.code(), Some(codes::VL_INVALID_AUDIO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclassified_error_is_not_retried() {
        let manager = ErrorRecoveryManager::new(no_jitter(5));
        let calls = AtomicUsize::new(0);

        let err = manager
            .retry_operation("io", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(MediascribeError::config("broken")) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(err.as_domain().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_between_attempts() {
        let manager = ErrorRecoveryManager::new(no_jitter(2));
        let started = tokio::time::Instant::now();

        let _ = manager
            .retry_operation("timed", || async {
                Err::<(), _>(MediascribeError::from(DomainError::conversion("x").retryable()))
            })
            .await;

        // 2s before the first retry, 4s before the second.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(7), "{elapsed:?}");
    }

    #[test]
    fn test_suggestions_by_kind() {
        let manager = ErrorRecoveryManager::default();

        let missing = DomainError::conversion("tool gone").with_code(codes::CV_TOOL_MISSING);
        assert!(manager.get_recovery_suggestion(&missing).starts_with("FFmpeg is required"));

        let timeout = DomainError::conversion("Conversion timeout after 600 seconds");
        assert!(manager.get_recovery_suggestion(&timeout).starts_with("Conversion timed out"));

        let corrupt = DomainError::validation("file is corrupted");
        assert!(manager.get_recovery_suggestion(&corrupt).contains("re-download"));

        let memory = DomainError::transcription("out of memory");
        assert!(manager.get_recovery_suggestion(&memory).starts_with("Insufficient memory"));

        let model = DomainError::transcription("Failed to load model whisper-small");
        assert!(manager.get_recovery_suggestion(&model).contains("~2GB"));

        let explicit = DomainError::transcription("x").with_suggestion("Set the key.");
        assert_eq!(manager.get_recovery_suggestion(&explicit), "Set the key.");
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut manager = ErrorRecoveryManager::default();
        assert_eq!(manager.cleanup_temp_files(), 0);
        manager.track_temp_file("/nonexistent/mediascribe-temp.mp3");
        assert_eq!(manager.cleanup_temp_files(), 0);
        assert_eq!(manager.cleanup_temp_files(), 0);
        assert!(manager.temp_files().is_empty());
    }
}
