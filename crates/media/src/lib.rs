//! MediaScribe Media Handling
//!
//! The I/O collaborators the workflow pipeline drives:
//! - [`FileTypeDetector`]: extension-based classification into video/audio
//! - [`FfmpegChecker`] / [`FfmpegConverter`]: audio extraction from video
//! - [`audio`]: probing and decoding via symphonia
//! - [`ProbeAudioValidator`]: duration and sample-rate checks

pub mod audio;
pub mod converter;
pub mod ffmpeg;
pub mod file_type;
pub mod validator;

pub use audio::{AudioError, AudioProperties};
pub use converter::{ConversionResult, FfmpegConverter, MediaConverter};
pub use ffmpeg::FfmpegChecker;
pub use file_type::{FileCategory, FileType, FileTypeDetector};
pub use validator::{
    AudioValidationResult, AudioValidator, FileIssue, ProbeAudioValidator, ValidationStatus,
    ValidationSummary,
};
