//! The staged media → text workflow.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mediascribe_common::{
    codes, AppConfig, ConversionConfig, DomainError, MediascribeError, RetryConfig,
};
use mediascribe_media::{
    AudioValidationResult, AudioValidator, FfmpegConverter, FileType, FileTypeDetector,
    MediaConverter, ProbeAudioValidator, ValidationStatus,
};
use mediascribe_transcription::{run_scoped, BackendDescriptor, BackendFactory, BackendSelector};

use crate::monitor::{PerformanceMonitor, PerformanceReport};
use crate::recovery::ErrorRecoveryManager;
use crate::result::WorkflowResult;
use crate::temp_files::TempFileTracker;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// `<dir>/<stem>_transcription.txt` next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}_transcription.txt"))
}

/// Runs one input file through every stage.
///
/// One instance handles one call at a time. Independent instances can run
/// concurrently; each owns its temp files and constructs its own backends.
pub struct WorkflowPipeline {
    descriptor: BackendDescriptor,
    factory: Box<dyn BackendFactory>,
    converter: Box<dyn MediaConverter>,
    validator: Arc<dyn AudioValidator>,
    detector: FileTypeDetector,
    recovery: ErrorRecoveryManager,
    monitor: PerformanceMonitor,
    stage_reports: Vec<PerformanceReport>,
    temp_dir: PathBuf,
}

impl WorkflowPipeline {
    /// Pipeline with default collaborators and the given backend factory.
    pub fn new(descriptor: BackendDescriptor, factory: Box<dyn BackendFactory>) -> Self {
        Self {
            descriptor,
            factory,
            converter: Box::new(FfmpegConverter::from_config(&ConversionConfig::default())),
            validator: Arc::new(ProbeAudioValidator::default()),
            detector: FileTypeDetector::default(),
            recovery: ErrorRecoveryManager::new(RetryConfig::default()),
            monitor: PerformanceMonitor::default(),
            stage_reports: Vec::new(),
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Build every collaborator from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, DomainError> {
        let descriptor = BackendDescriptor::from_preferences(&config.model)?;
        let temp_dir = config
            .conversion
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        Ok(
            Self::new(descriptor, Box::new(BackendSelector::from_config(config)))
                .with_converter(Box::new(FfmpegConverter::from_config(&config.conversion)))
                .with_validator(Box::new(ProbeAudioValidator::from_config(&config.validation)))
                .with_retry_config(config.retry.clone())
                .with_performance_monitor(PerformanceMonitor::from_config(&config.performance))
                .with_temp_dir(temp_dir),
        )
    }

    pub fn with_converter(mut self, converter: Box<dyn MediaConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_validator(mut self, validator: Box<dyn AudioValidator>) -> Self {
        self.validator = Arc::from(validator);
        self
    }

    pub fn with_detector(mut self, detector: FileTypeDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.recovery = ErrorRecoveryManager::new(config);
        self
    }

    pub fn with_performance_monitor(mut self, monitor: PerformanceMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    /// Directory for intermediate audio extracted from video.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    pub fn recovery(&self) -> &ErrorRecoveryManager {
        &self.recovery
    }

    /// Reports for the stages the last call ran, in order.
    pub fn stage_reports(&self) -> &[PerformanceReport] {
        &self.stage_reports
    }

    /// Transcribe `input` into `output` with the pinned backend descriptor.
    pub async fn process_file(&mut self, input: &Path, output: &Path) -> WorkflowResult {
        let descriptor = self.descriptor.clone();
        self.process_file_with(input, output, &descriptor).await
    }

    /// Transcribe with a call-scoped descriptor.
    pub async fn process_file_with(
        &mut self,
        input: &Path,
        output: &Path,
        descriptor: &BackendDescriptor,
    ) -> WorkflowResult {
        self.stage_reports.clear();
        if !input.exists() {
            return WorkflowResult::failed(
                input,
                output,
                format!("Input file not found: {}", input.display()),
            );
        }

        // Deletes this call's temp files even if the future is dropped mid-run.
        let mut local_temps = TempFileTracker::new();
        let result = self
            .run_stages(input, output, descriptor, &mut local_temps)
            .await;

        self.recovery.cleanup_temp_files();
        local_temps.cleanup();

        match result {
            Ok((text, duration)) => {
                tracing::info!(
                    input = %input.display(),
                    output = %output.display(),
                    chars = text.len(),
                    "Transcription workflow complete"
                );
                WorkflowResult::succeeded(input, output, text, duration)
            }
            Err(error) => {
                let message = self.failure_message(&error);
                tracing::error!(input = %input.display(), error = %message, "Transcription workflow failed");
                WorkflowResult::failed(input, output, message)
            }
        }
    }

    async fn run_stages(
        &mut self,
        input: &Path,
        output: &Path,
        descriptor: &BackendDescriptor,
        local_temps: &mut TempFileTracker,
    ) -> Result<(String, Option<f64>), MediascribeError> {
        let file_type = self.detector.detect(input)?;
        tracing::info!(input = %input.display(), file_type = %file_type, "Detected input type");

        let monitor = self.monitor;
        let audio_path = if file_type.is_video() {
            let (converted, report) = monitor
                .monitor_operation("media_conversion", self.convert_stage(input, local_temps))
                .await;
            self.stage_reports.push(report);
            converted?
        } else {
            input.to_path_buf()
        };

        let (validation, report) = monitor
            .monitor_operation("audio_validation", self.validate_stage(&audio_path))
            .await;
        self.stage_reports.push(report);
        let validation = validation?;

        let (text, report) = monitor
            .monitor_operation(
                "audio_transcription",
                self.transcribe_stage(&audio_path, descriptor),
            )
            .await;
        self.stage_reports.push(report);
        let text = text?;

        persist(output, &text)?;

        Ok((text, Some(validation.duration)))
    }

    async fn convert_stage(
        &mut self,
        input: &Path,
        local_temps: &mut TempFileTracker,
    ) -> Result<PathBuf, MediascribeError> {
        self.converter.ensure_available().await?;

        let temp_audio = self.temp_audio_path(input);
        self.recovery.track_temp_file(&temp_audio);
        local_temps.track(&temp_audio);

        let converter = &self.converter;
        let target = temp_audio.as_path();
        self.recovery
            .retry_operation("media_conversion", || async move {
                let result = converter.convert(input, target).await;
                if result.success {
                    return Ok(result);
                }
                let message = result
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Conversion failed".to_string());
                let code = if result.timed_out {
                    codes::CV_TIMEOUT
                } else {
                    codes::CV_FAILED
                };
                Err(MediascribeError::from(
                    DomainError::conversion(message)
                        .with_paths(input, target)
                        .with_code(code)
                        .retryable(),
                ))
            })
            .await?;

        tracing::info!(audio = %temp_audio.display(), "Extracted audio track");
        Ok(temp_audio)
    }

    async fn validate_stage(
        &self,
        audio_path: &Path,
    ) -> Result<AudioValidationResult, MediascribeError> {
        let result = self
            .recovery
            .retry_operation("audio_validation", || {
                let validator = Arc::clone(&self.validator);
                let path = audio_path.to_path_buf();
                async move {
                    // Probing may decode the whole file.
                    let result = tokio::task::spawn_blocking({
                        let path = path.clone();
                        move || validator.validate(&path)
                    })
                    .await
                    .map_err(|e| {
                        MediascribeError::from(
                            DomainError::validation(format!("Audio validation task failed: {e}"))
                                .with_audio_path(&path)
                                .with_code(codes::VL_TEMP_UNAVAILABLE),
                        )
                    })?;
                    if result.status == ValidationStatus::Error {
                        let message = result
                            .error_message
                            .clone()
                            .unwrap_or_else(|| "Validation failed".to_string());
                        return Err(MediascribeError::from(
                            DomainError::validation(message.clone())
                                .with_audio_path(&path)
                                .with_issues(vec![message])
                                .with_code(codes::VL_INVALID_AUDIO)
                                .fatal(),
                        ));
                    }
                    Ok(result)
                }
            })
            .await?;

        if result.status == ValidationStatus::Warning {
            tracing::warn!(
                audio = %audio_path.display(),
                warning = result.error_message.as_deref().unwrap_or(""),
                "Audio validation warning, continuing"
            );
        }
        Ok(result)
    }

    async fn transcribe_stage(
        &self,
        audio_path: &Path,
        descriptor: &BackendDescriptor,
    ) -> Result<String, MediascribeError> {
        let factory = self.factory.as_ref();
        let outcome = self
            .recovery
            .retry_operation("audio_transcription", || async move {
                // A fresh backend per attempt, unloaded before the attempt returns.
                let mut backend = factory.create(descriptor)?;
                let outcome = run_scoped(backend.as_mut(), audio_path).await?;
                Ok::<_, MediascribeError>(outcome)
            })
            .await?;

        Ok(outcome.transcription.unwrap_or_default())
    }

    fn temp_audio_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let ext = FileType::Mp3.extension();
        self.temp_dir.join(format!(
            "mediascribe-{stem}-{}-{stamp}-{n}.{ext}",
            std::process::id()
        ))
    }

    fn failure_message(&self, error: &MediascribeError) -> String {
        match error.as_domain() {
            Some(domain) => format!(
                "{}. {}",
                domain.message.trim_end_matches('.'),
                self.recovery.get_recovery_suggestion(domain)
            ),
            None => error.to_string(),
        }
    }
}

fn persist(output: &Path, text: &str) -> Result<(), MediascribeError> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, text)
    };
    write().map_err(|e| {
        MediascribeError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to write transcription to {}: {e}", output.display()),
        ))
    })
}
