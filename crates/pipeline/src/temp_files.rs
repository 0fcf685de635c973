//! Bookkeeping for intermediate files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Paths pending deletion.
///
/// [`TempFileTracker::cleanup`] deletes whatever still exists, drops every
/// entry and never fails. Dropping the tracker runs the same cleanup.
#[derive(Debug, Default)]
pub struct TempFileTracker {
    paths: BTreeSet<PathBuf>,
}

impl TempFileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path. The file does not need to exist yet.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.insert(path.into());
    }

    /// Stop tracking a path without deleting it.
    pub fn untrack(&mut self, path: &Path) -> bool {
        self.paths.remove(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    /// Delete every tracked file that exists. Returns how many were removed.
    pub fn cleanup(&mut self) -> usize {
        let mut removed = 0;
        for path in std::mem::take(&mut self.paths) {
            if !path.exists() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Ignoring temp file cleanup failure");
                }
            }
        }
        removed
    }
}

impl Drop for TempFileTracker {
    fn drop(&mut self) {
        if !self.paths.is_empty() {
            self.cleanup();
        }
    }
}
