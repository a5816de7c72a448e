//! Error types for texsync

use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Unexpected content: {0}")]
    ContentType(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Cancelled: {0}")]
    ConflictAbort(String),

    #[error("Project identity error: {0}")]
    Identity(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Open {0} in the editor to apply this change")]
    ApplyBlocked(String),

    #[error("All proxy routes failed: {0}")]
    AllProxiesFailed(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl SyncError {
    fn code(&self) -> &'static str {
        match self {
            SyncError::Git(_) => "GIT_ERROR",
            SyncError::Io(_) => "IO_ERROR",
            SyncError::Http(_) => "HTTP_ERROR",
            SyncError::Serialization(_) => "SERIALIZATION_ERROR",
            SyncError::Archive(_) => "ARCHIVE_ERROR",
            SyncError::Config(_) => "CONFIG_ERROR",
            SyncError::Network(_) => "NETWORK_ERROR",
            SyncError::AuthRequired(_) => "AUTH_REQUIRED",
            SyncError::ContentType(_) => "CONTENT_TYPE",
            SyncError::Integrity(_) => "INTEGRITY_ERROR",
            SyncError::ConflictAbort(_) => "CONFLICT_ABORT",
            SyncError::Identity(_) => "IDENTITY_ERROR",
            SyncError::BranchNotFound(_) => "BRANCH_NOT_FOUND",
            SyncError::ApplyBlocked(_) => "APPLY_BLOCKED",
            SyncError::AllProxiesFailed(_) => "ALL_PROXIES_FAILED",
            SyncError::OperationFailed(_) => "OPERATION_FAILED",
        }
    }
}

/// Serializable error response for the extension UI boundary
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl From<SyncError> for ErrorResponse {
    fn from(error: SyncError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
            details: None,
        }
    }
}

impl serde::Serialize for SyncError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let response = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            details: None,
        };
        response.serialize(serializer)
    }
}

/// Result type alias for texsync operations
pub type Result<T> = std::result::Result<T, SyncError>;
