//! The non-blocking notification sink.
//!
//! Background tasks report non-fatal outcomes here (a failed
//! confirmation, a reverted deployment) for the UI to display. The core
//! never blocks on the sink and never reads anything back from it —
//! `notify` is synchronous fire-and-forget, so an implementation that
//! needs async delivery should enqueue internally.

/// How loudly the UI should present a notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A user-facing status or error notice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    /// Short, human-readable summary ("Transfer failed").
    pub summary: String,
    /// Optional technical detail for a disclosure section.
    pub detail: Option<String>,
}

impl Notice {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: Some(detail.into()),
        }
    }

    pub fn info(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            summary: summary.into(),
            detail: None,
        }
    }
}

/// Collaborator trait for the UI notification surface.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}
