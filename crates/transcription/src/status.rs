//! Backend lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a backend is in its load/unload cycle.
///
/// Unloaded → Loading → Ready | Error, and Ready | Error → Unloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    #[default]
    Unloaded,
    Loading,
    Ready,
    Error,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::Unloaded => "UNLOADED",
            ServiceStatus::Loading => "LOADING",
            ServiceStatus::Ready => "READY",
            ServiceStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Status plus the reason for the last failed load.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    status: ServiceStatus,
    last_error: Option<String>,
}

impl Lifecycle {
    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == ServiceStatus::Ready
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn begin_loading(&mut self) {
        tracing::debug!(from = %self.status, "Backend loading");
        self.status = ServiceStatus::Loading;
        self.last_error = None;
    }

    pub fn mark_ready(&mut self) {
        self.status = ServiceStatus::Ready;
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(%reason, "Backend failed to load");
        self.status = ServiceStatus::Error;
        self.last_error = Some(reason);
    }

    pub fn mark_unloaded(&mut self) {
        self.status = ServiceStatus::Unloaded;
    }
}
