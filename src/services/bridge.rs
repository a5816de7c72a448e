//! Review session bridging remote content into the editor

use std::sync::Arc;

use crate::error::{Result, SyncError};
use crate::models::{Change, ChangeSet, ChangeStatus};
use crate::services::host::EditorHost;
use crate::services::workspace::EphemeralWorkspace;

/// Pending changes from the last pull together with the remote
/// checkout they were computed against.
///
/// The workspace lives exactly as long as the review: dropping the
/// bridge removes the checked-out files.
pub struct ReviewBridge {
    workspace: EphemeralWorkspace,
    changes: Arc<ChangeSet>,
}

impl ReviewBridge {
    pub fn new(workspace: EphemeralWorkspace, changes: Vec<Change>) -> Self {
        let set = ChangeSet::default();
        set.replace(changes);
        Self {
            workspace,
            changes: Arc::new(set),
        }
    }

    pub fn changes(&self) -> Arc<ChangeSet> {
        Arc::clone(&self.changes)
    }

    pub fn pending(&self) -> Vec<Change> {
        self.changes.snapshot()
    }

    /// Push the remote version of `path` into the editor and clear the
    /// change from the pending list.
    ///
    /// The editor can only write to the file it has open, so the apply
    /// is refused unless `path` is the open file.
    pub fn apply(&self, path: &str, host: &dyn EditorHost) -> Result<()> {
        let change = self
            .changes
            .get(path)
            .ok_or_else(|| SyncError::OperationFailed(format!("No pending change for {path}")))?;

        if change.status == ChangeStatus::Deleted {
            return Err(SyncError::OperationFailed(format!(
                "{path} was removed on the remote, delete it in the editor"
            )));
        }

        let open = host.current_open_path();
        if open.as_deref() != Some(path) {
            return Err(SyncError::ApplyBlocked(path.to_string()));
        }

        let content = self.workspace.read_to_string_opt(path)?.ok_or_else(|| {
            SyncError::OperationFailed(format!("{path} is missing from the remote checkout"))
        })?;

        host.apply_content(&content);
        self.changes.remove(path);
        tracing::info!("Applied remote content of {} into the editor", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedHost;

    fn bridge_with(files: &[(&str, &str)], changes: Vec<Change>) -> ReviewBridge {
        let ws = EphemeralWorkspace::new().expect("workspace");
        for (path, content) in files {
            std::fs::write(ws.path().join(path), content).expect("write");
        }
        ReviewBridge::new(ws, changes)
    }

    fn modified(path: &str) -> Change {
        Change {
            path: path.to_string(),
            status: ChangeStatus::Modified,
            diff: String::new(),
        }
    }

    #[test]
    fn test_apply_writes_remote_content_and_clears_change() {
        let bridge = bridge_with(&[("main.tex", "remote text")], vec![modified("main.tex")]);
        let host = ScriptedHost::new("/project/abc", "<html></html>");
        host.set_open_path(Some("main.tex"));

        bridge.apply("main.tex", &host).expect("apply");
        assert_eq!(host.applied(), vec!["remote text".to_string()]);
        assert!(bridge.pending().is_empty());
    }

    #[test]
    fn test_apply_requires_the_file_to_be_open() {
        let bridge = bridge_with(&[("main.tex", "remote text")], vec![modified("main.tex")]);
        let host = ScriptedHost::new("/project/abc", "");
        host.set_open_path(Some("other.tex"));

        let err = bridge.apply("main.tex", &host).unwrap_err();
        assert!(matches!(err, SyncError::ApplyBlocked(_)));
        assert_eq!(bridge.pending().len(), 1);
    }

    #[test]
    fn test_apply_with_nothing_open_is_blocked() {
        let bridge = bridge_with(&[("main.tex", "x")], vec![modified("main.tex")]);
        let host = ScriptedHost::new("/project/abc", "");
        let err = bridge.apply("main.tex", &host).unwrap_err();
        assert!(matches!(err, SyncError::ApplyBlocked(_)));
    }

    #[test]
    fn test_apply_unknown_path_fails() {
        let bridge = bridge_with(&[], vec![]);
        let host = ScriptedHost::new("/project/abc", "");
        let err = bridge.apply("main.tex", &host).unwrap_err();
        assert!(matches!(err, SyncError::OperationFailed(_)));
    }

    #[test]
    fn test_apply_deleted_change_is_refused() {
        let change = Change {
            path: "gone.tex".to_string(),
            status: ChangeStatus::Deleted,
            diff: String::new(),
        };
        let bridge = bridge_with(&[], vec![change]);
        let host = ScriptedHost::new("/project/abc", "");
        host.set_open_path(Some("gone.tex"));
        let err = bridge.apply("gone.tex", &host).unwrap_err();
        assert!(matches!(err, SyncError::OperationFailed(_)));
    }

    #[test]
    fn test_workspace_lives_with_the_bridge() {
        let ws = EphemeralWorkspace::new().expect("workspace");
        std::fs::write(ws.path().join("main.tex"), "x").expect("write");
        let root = ws.path().to_path_buf();

        let bridge = ReviewBridge::new(ws, vec![modified("main.tex")]);
        assert!(root.exists());
        drop(bridge);
        assert!(!root.exists());
    }
}
