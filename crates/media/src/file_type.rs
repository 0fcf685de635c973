//! Extension-based file type detection.

use serde::{Deserialize, Serialize};
use std::path::Path;

use mediascribe_common::{MediascribeError, MediascribeResult};

/// Supported input containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Webm,
    Mp4,
    Mkv,
    Avi,
    Mp3,
    Wav,
    Flac,
}

/// Whether a file needs audio extraction before transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Video,
    Audio,
}

impl FileType {
    pub const ALL: [FileType; 7] = [
        FileType::Webm,
        FileType::Mp4,
        FileType::Mkv,
        FileType::Avi,
        FileType::Mp3,
        FileType::Wav,
        FileType::Flac,
    ];

    /// Extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Webm => "webm",
            FileType::Mp4 => "mp4",
            FileType::Mkv => "mkv",
            FileType::Avi => "avi",
            FileType::Mp3 => "mp3",
            FileType::Wav => "wav",
            FileType::Flac => "flac",
        }
    }

    /// Case-insensitive lookup, with or without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.extension() == ext)
    }

    pub fn category(&self) -> FileCategory {
        match self {
            FileType::Webm | FileType::Mp4 | FileType::Mkv | FileType::Avi => FileCategory::Video,
            FileType::Mp3 | FileType::Wav | FileType::Flac => FileCategory::Audio,
        }
    }

    pub fn is_video(&self) -> bool {
        self.category() == FileCategory::Video
    }

    pub fn is_audio(&self) -> bool {
        self.category() == FileCategory::Audio
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Classifies inputs and enforces the input size limit.
#[derive(Debug, Clone)]
pub struct FileTypeDetector {
    max_file_size_bytes: u64,
}

impl Default for FileTypeDetector {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl FileTypeDetector {
    pub fn new(max_file_size_gb: f64) -> Self {
        Self {
            max_file_size_bytes: (max_file_size_gb * 1024.0 * 1024.0 * 1024.0) as u64,
        }
    }

    /// Detect the type of an existing file from its extension.
    pub fn detect(&self, path: &Path) -> MediascribeResult<FileType> {
        if !path.exists() {
            return Err(MediascribeError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or_default();

        FileType::from_extension(&extension).ok_or_else(|| MediascribeError::UnsupportedFormat {
            extension: if extension.is_empty() {
                "<none>".to_string()
            } else {
                extension
            },
            supported: Self::supported_extensions().join(", "),
        })
    }

    /// Whether the file is within the configured size limit.
    pub fn check_file_size(&self, path: &Path) -> bool {
        std::fs::metadata(path)
            .map(|m| m.len() <= self.max_file_size_bytes)
            .unwrap_or(false)
    }

    /// All accepted extensions, dotted, in catalog order.
    pub fn supported_extensions() -> Vec<String> {
        FileType::ALL
            .iter()
            .map(|t| format!(".{}", t.extension()))
            .collect()
    }
}
