use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mediascribe_common::{codes, DomainError, RetryConfig};
use mediascribe_media::{
    AudioValidationResult, AudioValidator, ConversionResult, MediaConverter, ValidationStatus,
};
use mediascribe_pipeline::WorkflowPipeline;
use mediascribe_transcription::{
    BackendDescriptor, BackendFactory, ModelMetadata, ModelType, ServiceStatus,
    TranscriptionBackend, TranscriptionOutcome,
};

/// Shared record of what the collaborators were asked to do.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<&'static str>>,
    conversions: AtomicUsize,
    conversion_targets: Mutex<Vec<PathBuf>>,
    validations: AtomicUsize,
    validation_threads: Mutex<Vec<std::thread::ThreadId>>,
    backends_created: AtomicUsize,
    loads: AtomicUsize,
    transcribes: AtomicUsize,
    dropped_statuses: Mutex<Vec<ServiceStatus>>,
}

impl Recorder {
    fn event(&self, name: &'static str) {
        self.events.lock().unwrap().push(name);
    }

    fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum ConvertBehavior {
    Succeed,
    FailTimes(usize),
    AlwaysTimeOut,
    Hang,
}

struct MockConverter {
    recorder: Arc<Recorder>,
    behavior: ConvertBehavior,
    tool_available: bool,
}

#[async_trait]
impl MediaConverter for MockConverter {
    async fn ensure_available(&self) -> Result<(), DomainError> {
        if self.tool_available {
            Ok(())
        } else {
            Err(DomainError::conversion("Conversion tool not found on PATH")
                .with_code(codes::CV_TOOL_MISSING)
                .fatal())
        }
    }

    async fn convert(&self, input: &Path, output: &Path) -> ConversionResult {
        let n = self.recorder.conversions.fetch_add(1, Ordering::SeqCst);
        self.recorder.event("convert");
        self.recorder
            .conversion_targets
            .lock()
            .unwrap()
            .push(output.to_path_buf());
        std::fs::write(output, b"fake mp3").unwrap();

        match self.behavior {
            ConvertBehavior::Succeed => ConversionResult::succeeded(input, output, Duration::ZERO),
            ConvertBehavior::FailTimes(k) if n < k => {
                ConversionResult::failed(input, output, "Conversion failed (status 1): broken pipe")
            }
            ConvertBehavior::FailTimes(_) => {
                ConversionResult::succeeded(input, output, Duration::ZERO)
            }
            ConvertBehavior::AlwaysTimeOut => {
                let mut result =
                    ConversionResult::failed(input, output, "Conversion timeout after 600 seconds");
                result.timed_out = true;
                result
            }
            ConvertBehavior::Hang => std::future::pending().await,
        }
    }
}

struct MockValidator {
    recorder: Arc<Recorder>,
    status: ValidationStatus,
}

impl AudioValidator for MockValidator {
    fn validate(&self, path: &Path) -> AudioValidationResult {
        self.recorder.validations.fetch_add(1, Ordering::SeqCst);
        self.recorder
            .validation_threads
            .lock()
            .unwrap()
            .push(std::thread::current().id());
        self.recorder.event("validate");
        match self.status {
            ValidationStatus::Error => {
                AudioValidationResult::error(path, "Failed to load audio file: corrupted header")
            }
            status => AudioValidationResult {
                status,
                file_path: path.to_path_buf(),
                duration: 12.5,
                sample_rate: 16_000,
                channels: 1,
                error_message: (status == ValidationStatus::Warning)
                    .then(|| "Audio sample rate mismatch: 44100Hz (expected: 16000Hz)".to_string()),
            },
        }
    }
}

#[derive(Clone)]
struct BackendScript {
    load_failures: usize,
    transcribe_failures: usize,
    text: &'static str,
}

impl Default for BackendScript {
    fn default() -> Self {
        Self {
            load_failures: 0,
            transcribe_failures: 0,
            text: "Hello world",
        }
    }
}

struct MockBackend {
    recorder: Arc<Recorder>,
    script: BackendScript,
    descriptor: BackendDescriptor,
    status: ServiceStatus,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.recorder.dropped_statuses.lock().unwrap().push(self.status);
    }
}

#[async_trait]
impl TranscriptionBackend for MockBackend {
    fn status(&self) -> ServiceStatus {
        self.status
    }

    async fn load_model(&mut self) -> bool {
        let n = self.recorder.loads.fetch_add(1, Ordering::SeqCst);
        self.status = ServiceStatus::Loading;
        if n < self.script.load_failures {
            self.status = ServiceStatus::Error;
            return false;
        }
        self.status = ServiceStatus::Ready;
        true
    }

    async fn unload_model(&mut self) -> bool {
        self.status = ServiceStatus::Unloaded;
        true
    }

    async fn transcribe(&mut self, audio_path: &Path) -> TranscriptionOutcome {
        if !self.is_ready() {
            return TranscriptionOutcome::not_ready(audio_path, "mock");
        }
        let n = self.recorder.transcribes.fetch_add(1, Ordering::SeqCst);
        self.recorder.event("transcribe");
        if n < self.script.transcribe_failures {
            return TranscriptionOutcome::failed(audio_path, "mock", "decoder glitch");
        }
        TranscriptionOutcome::succeeded(audio_path, "mock", self.script.text)
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata::for_descriptor(&self.descriptor)
    }

    fn load_error(&self) -> Option<String> {
        (self.status == ServiceStatus::Error).then(|| "weights unavailable".to_string())
    }
}

struct MockFactory {
    recorder: Arc<Recorder>,
    script: BackendScript,
    construct_error: Option<DomainError>,
}

impl BackendFactory for MockFactory {
    fn create(
        &self,
        descriptor: &BackendDescriptor,
    ) -> Result<Box<dyn TranscriptionBackend>, DomainError> {
        self.recorder.backends_created.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.construct_error {
            return Err(err.clone());
        }
        Ok(Box::new(MockBackend {
            recorder: Arc::clone(&self.recorder),
            script: self.script.clone(),
            descriptor: descriptor.clone(),
            status: ServiceStatus::Unloaded,
        }))
    }
}

struct Harness {
    recorder: Arc<Recorder>,
    converter: ConvertBehavior,
    tool_available: bool,
    validation: ValidationStatus,
    script: BackendScript,
    construct_error: Option<DomainError>,
    retry: RetryConfig,
    dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        Self {
            recorder: Arc::new(Recorder::default()),
            converter: ConvertBehavior::Succeed,
            tool_available: true,
            validation: ValidationStatus::Valid,
            script: BackendScript::default(),
            construct_error: None,
            retry: RetryConfig {
                max_retries: 2,
                ..RetryConfig::default()
            },
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn temp_dir(&self) -> PathBuf {
        let dir = self.dir.path().join("tmp");
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn input(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"media bytes").unwrap();
        path
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("out").join("nested").join("result.txt")
    }

    fn pipeline(&self) -> WorkflowPipeline {
        let factory = MockFactory {
            recorder: Arc::clone(&self.recorder),
            script: self.script.clone(),
            construct_error: self.construct_error.clone(),
        };
        WorkflowPipeline::new(
            BackendDescriptor::for_model(ModelType::LocalWhisperBase),
            Box::new(factory),
        )
        .with_converter(Box::new(MockConverter {
            recorder: Arc::clone(&self.recorder),
            behavior: self.converter,
            tool_available: self.tool_available,
        }))
        .with_validator(Box::new(MockValidator {
            recorder: Arc::clone(&self.recorder),
            status: self.validation,
        }))
        .with_retry_config(self.retry.clone())
        .with_temp_dir(self.temp_dir())
    }

    fn temp_dir_is_empty(&self) -> bool {
        std::fs::read_dir(self.temp_dir()).unwrap().next().is_none()
    }

    fn all_backends_unloaded(&self) -> bool {
        self.recorder
            .dropped_statuses
            .lock()
            .unwrap()
            .iter()
            .all(|s| *s == ServiceStatus::Unloaded)
    }
}

#[tokio::test(start_paused = true)]
async fn missing_input_short_circuits_without_side_effects() {
    let harness = Harness::new();
    let mut pipeline = harness.pipeline();

    let result = pipeline
        .process_file(Path::new("/nonexistent/x.webm"), &harness.output())
        .await;

    assert!(!result.success);
    assert!(result.error_message.unwrap().contains("not found"));
    assert_eq!(Recorder::count(&harness.recorder.conversions), 0);
    assert_eq!(Recorder::count(&harness.recorder.backends_created), 0);
}

#[tokio::test(start_paused = true)]
async fn audio_input_succeeds_end_to_end() {
    let harness = Harness::new();
    let input = harness.input("talk.mp3");
    let output = harness.output();
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &output).await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.transcription.as_deref(), Some("Hello world"));
    assert_eq!(result.duration_seconds, Some(12.5));
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "Hello world");
    assert!(pipeline.recovery().temp_files().is_empty());

    assert_eq!(Recorder::count(&harness.recorder.conversions), 0);
    assert_eq!(harness.recorder.events(), vec!["validate", "transcribe"]);
    assert_eq!(Recorder::count(&harness.recorder.backends_created), 1);
    assert!(harness.all_backends_unloaded());
}

#[tokio::test(start_paused = true)]
async fn video_input_converts_once_before_validation_and_cleans_up() {
    let harness = Harness::new();
    let input = harness.input("screencast.webm");
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &harness.output()).await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(harness.recorder.events(), vec!["convert", "validate", "transcribe"]);

    let targets = harness.recorder.conversion_targets.lock().unwrap().clone();
    assert_eq!(targets.len(), 1);
    assert!(targets[0].starts_with(harness.temp_dir()));
    assert!(!targets[0].exists());
    assert!(harness.temp_dir_is_empty());
    assert!(pipeline.recovery().temp_files().is_empty());
}

#[tokio::test(start_paused = true)]
async fn conversion_retries_then_succeeds() {
    let mut harness = Harness::new();
    harness.converter = ConvertBehavior::FailTimes(1);
    let input = harness.input("clip.mp4");
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &harness.output()).await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(Recorder::count(&harness.recorder.conversions), 2);
    assert!(harness.temp_dir_is_empty());
}

#[tokio::test(start_paused = true)]
async fn backend_retries_then_succeeds_with_fresh_backend() {
    let mut harness = Harness::new();
    harness.script.transcribe_failures = 1;
    let input = harness.input("talk.wav");
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &harness.output()).await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(Recorder::count(&harness.recorder.transcribes), 2);
    assert_eq!(Recorder::count(&harness.recorder.backends_created), 2);
    assert!(harness.all_backends_unloaded());
}

#[tokio::test(start_paused = true)]
async fn persistent_backend_failure_exhausts_retries_and_unloads() {
    let mut harness = Harness::new();
    harness.script.transcribe_failures = usize::MAX;
    let input = harness.input("talk.flac");
    let output = harness.output();
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &output).await;

    assert!(!result.success);
    assert_eq!(Recorder::count(&harness.recorder.transcribes), 3);
    assert_eq!(
        result.error_message.as_deref(),
        Some(
            "decoder glitch. Check audio quality and ensure the file is not silent or corrupted. \
             Try with a different audio file."
        )
    );
    assert!(harness.all_backends_unloaded());
    assert!(!output.exists());
}

#[tokio::test(start_paused = true)]
async fn model_load_failure_is_retried_with_model_guidance() {
    let mut harness = Harness::new();
    harness.script.load_failures = usize::MAX;
    let input = harness.input("talk.mp3");
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &harness.output()).await;

    assert!(!result.success);
    assert_eq!(Recorder::count(&harness.recorder.loads), 3);
    assert_eq!(Recorder::count(&harness.recorder.transcribes), 0);
    let message = result.error_message.unwrap();
    assert!(message.contains("Failed to load model"), "{message}");
    assert!(message.contains("weights unavailable"), "{message}");
    assert!(message.contains("~2GB"), "{message}");
    assert!(harness.all_backends_unloaded());
}

#[tokio::test(start_paused = true)]
async fn fatal_construction_error_is_not_retried() {
    let mut harness = Harness::new();
    harness.construct_error = Some(
        DomainError::transcription("OpenAI API key required. Set OPENAI_API_KEY environment variable.")
            .with_code(codes::TR_MISSING_CREDENTIALS)
            .fatal(),
    );
    let input = harness.input("talk.mp3");
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &harness.output()).await;

    assert!(!result.success);
    assert_eq!(Recorder::count(&harness.recorder.backends_created), 1);
    assert!(result
        .error_message
        .unwrap()
        .starts_with("OpenAI API key required."));
}

#[tokio::test(start_paused = true)]
async fn validation_error_is_fatal_and_cleans_converted_audio() {
    let mut harness = Harness::new();
    harness.validation = ValidationStatus::Error;
    let input = harness.input("screencast.mkv");
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &harness.output()).await;

    assert!(!result.success);
    assert_eq!(Recorder::count(&harness.recorder.validations), 1);
    assert_eq!(Recorder::count(&harness.recorder.backends_created), 0);
    assert_eq!(
        result.error_message.as_deref(),
        Some(
            "Failed to load audio file: corrupted header. The audio file appears to be corrupted. \
             Try with a different file or re-download the original."
        )
    );
    assert!(harness.temp_dir_is_empty());
}

#[tokio::test(start_paused = true)]
async fn each_stage_is_timed_in_order() {
    let harness = Harness::new();
    let input = harness.input("lecture.mkv");
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &harness.output()).await;
    assert!(result.success, "{:?}", result.error_message);

    let stages: Vec<&str> = pipeline
        .stage_reports()
        .iter()
        .map(|r| r.operation.as_str())
        .collect();
    assert_eq!(
        stages,
        vec!["media_conversion", "audio_validation", "audio_transcription"]
    );
    assert!(pipeline.stage_reports().iter().all(|r| r.duration_seconds >= 0.0));

    let audio = harness.input("memo.flac");
    let result = pipeline.process_file(&audio, &harness.output()).await;
    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(pipeline.stage_reports().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn validation_runs_on_the_blocking_pool() {
    let harness = Harness::new();
    let input = harness.input("talk.wav");
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &harness.output()).await;

    assert!(result.success, "{:?}", result.error_message);
    let threads = harness.recorder.validation_threads.lock().unwrap().clone();
    assert_eq!(threads.len(), 1);
    assert_ne!(threads[0], std::thread::current().id());
}

#[tokio::test(start_paused = true)]
async fn validation_warning_does_not_fail() {
    let mut harness = Harness::new();
    harness.validation = ValidationStatus::Warning;
    let input = harness.input("talk.mp3");
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &harness.output()).await;
    assert!(result.success, "{:?}", result.error_message);
}

#[tokio::test(start_paused = true)]
async fn missing_conversion_tool_fails_before_converting() {
    let mut harness = Harness::new();
    harness.tool_available = false;
    let input = harness.input("clip.avi");
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &harness.output()).await;

    assert!(!result.success);
    assert_eq!(Recorder::count(&harness.recorder.conversions), 0);
    assert!(result
        .error_message
        .unwrap()
        .contains("FFmpeg is required for media conversion"));
}

#[tokio::test(start_paused = true)]
async fn conversion_timeout_is_retried_and_leaves_no_partial_output() {
    let mut harness = Harness::new();
    harness.converter = ConvertBehavior::AlwaysTimeOut;
    let input = harness.input("long.webm");
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &harness.output()).await;

    assert!(!result.success);
    assert_eq!(Recorder::count(&harness.recorder.conversions), 3);
    assert!(result
        .error_message
        .unwrap()
        .contains("Conversion timed out. Try with a smaller file"));
    assert!(harness.temp_dir_is_empty());
}

#[tokio::test(start_paused = true)]
async fn unsupported_type_reports_raw_message() {
    let harness = Harness::new();
    let input = harness.input("notes.txt");
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &harness.output()).await;

    assert!(!result.success);
    let message = result.error_message.unwrap();
    assert!(message.starts_with("Unsupported file type: .txt"), "{message}");
    assert!(!message.contains("Check"), "{message}");
    assert_eq!(Recorder::count(&harness.recorder.validations), 0);
}

#[tokio::test(start_paused = true)]
async fn persistence_failure_fails_the_run() {
    let harness = Harness::new();
    let input = harness.input("talk.mp3");
    let blocker = harness.input("blocker");
    let output = blocker.join("result.txt");
    let mut pipeline = harness.pipeline();

    let result = pipeline.process_file(&input, &output).await;

    assert!(!result.success);
    assert!(result
        .error_message
        .unwrap()
        .starts_with("Failed to write transcription to"));
    assert!(harness.all_backends_unloaded());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_run_removes_temp_audio() {
    let mut harness = Harness::new();
    harness.converter = ConvertBehavior::Hang;
    let input = harness.input("stuck.webm");
    let mut pipeline = harness.pipeline();

    let output = harness.output();
    let run = pipeline.process_file(&input, &output);
    let outcome = tokio::time::timeout(Duration::from_secs(5), run).await;
    assert!(outcome.is_err());

    let targets = harness.recorder.conversion_targets.lock().unwrap().clone();
    assert_eq!(targets.len(), 1);
    assert!(!targets[0].exists());
}

#[tokio::test(start_paused = true)]
async fn call_scoped_descriptor_overrides_pinned_one() {
    let harness = Harness::new();
    let input = harness.input("talk.mp3");
    let mut pipeline = harness.pipeline();
    let descriptor = BackendDescriptor::for_model(ModelType::LocalWhisperLarge);

    let result = pipeline
        .process_file_with(&input, &harness.output(), &descriptor)
        .await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(
        pipeline.descriptor().model_type,
        ModelType::LocalWhisperBase
    );
}
