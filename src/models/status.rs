//! Status line models

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// How a status message should be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusSeverity {
    Info,
    Busy,
    Success,
    Warning,
    Error,
}

/// Human-readable status published after each step of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub message: String,
    pub severity: StatusSeverity,
}

impl SyncStatus {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: StatusSeverity::Info,
        }
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: StatusSeverity::Busy,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: StatusSeverity::Success,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: StatusSeverity::Warning,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: StatusSeverity::Error,
        }
    }

    /// Terminal status for a failed operation.
    ///
    /// A user declining a confirmation is an outcome, not a failure, so
    /// `ConflictAbort` surfaces as a warning rather than an error.
    pub fn from_error(error: &SyncError) -> Self {
        match error {
            SyncError::ConflictAbort(message) => Self::warning(message.clone()),
            other => Self::error(other.to_string()),
        }
    }
}
