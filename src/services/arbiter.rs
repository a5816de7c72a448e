//! Time-based conflict arbitration

use async_trait::async_trait;

use crate::error::{Result, SyncError};

/// Clock skew allowance between editor and Git server timestamps
pub const TOLERANCE_MILLIS: u64 = 2000;

/// Capability for asking the user a yes/no question
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

fn format_millis(millis: u64) -> String {
    chrono::DateTime::from_timestamp_millis(millis as i64)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Gate a push when the remote looks newer than the editor's last save.
/// Either timestamp being unknown (0) skips the check entirely.
pub async fn check_push_conflict(
    prompt: &dyn ConfirmPrompt,
    local_millis: u64,
    remote_millis: u64,
) -> Result<()> {
    if local_millis == 0 || remote_millis == 0 {
        return Ok(());
    }
    if remote_millis > local_millis + TOLERANCE_MILLIS {
        let message = format!(
            "Remote ({}) is newer than local ({}). Force push and overwrite the remote?",
            format_millis(remote_millis),
            format_millis(local_millis)
        );
        tracing::warn!("Push conflict: remote is ahead of the editor save time");
        if !prompt.confirm(&message).await {
            return Err(SyncError::ConflictAbort("Push Cancelled".to_string()));
        }
    }
    Ok(())
}

/// Gate a pull when the editor looks newer than the remote tip.
pub async fn check_pull_conflict(
    prompt: &dyn ConfirmPrompt,
    local_millis: u64,
    remote_millis: u64,
) -> Result<()> {
    if local_millis == 0 || remote_millis == 0 {
        return Ok(());
    }
    if local_millis > remote_millis + TOLERANCE_MILLIS {
        let message = format!(
            "Local ({}) is newer than remote ({}). Pull anyway?",
            format_millis(local_millis),
            format_millis(remote_millis)
        );
        tracing::warn!("Pull conflict: the editor is ahead of the remote tip");
        if !prompt.confirm(&message).await {
            return Err(SyncError::ConflictAbort("Pull Cancelled".to_string()));
        }
    }
    Ok(())
}
