//! MediaScribe Workflow Pipeline
//!
//! [`WorkflowPipeline::process_file`] runs one input through
//! detection → conversion (video only) → validation → transcription →
//! persistence. Retryable stages go through [`ErrorRecoveryManager`], and
//! intermediate files are tracked by [`TempFileTracker`] and removed on
//! every exit path. Each retryable stage runs inside a [`PerformanceMonitor`]
//! span that records its time and memory delta.

pub mod monitor;
pub mod recovery;
pub mod result;
pub mod temp_files;
pub mod workflow;

pub use recovery::{backoff_duration, calculate_delay, capped_delay, is_retryable, ErrorRecoveryManager, TRANSIENT_ERROR_CODES};
pub use monitor::{PerformanceMonitor, PerformanceReport};
pub use result::WorkflowResult;
pub use temp_files::TempFileTracker;
pub use workflow::{default_output_path, WorkflowPipeline};
