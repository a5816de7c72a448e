//! Pending change models

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Direction of a reconciled file change, remote relative to the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeStatus {
    /// Present on the remote, absent in the editor
    #[serde(rename = "new")]
    New,
    /// Present on both sides with differing content
    #[serde(rename = "mod")]
    Modified,
    /// Present in the editor, deleted on the remote
    #[serde(rename = "del")]
    Deleted,
}

/// One reconciled file difference awaiting user review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    /// Project-relative path, forward slashes
    pub path: String,
    pub status: ChangeStatus,
    /// Unified diff of editor content against remote content
    pub diff: String,
}

/// Observable set of pending changes.
///
/// Consumers subscribe once and re-render from each published snapshot,
/// so there is no per-row mutation protocol to keep in step.
pub struct ChangeSet {
    tx: watch::Sender<Vec<Change>>,
}

impl ChangeSet {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self { tx }
    }

    /// Replace the whole set, publishing a new snapshot.
    pub fn replace(&self, changes: Vec<Change>) {
        self.tx.send_replace(changes);
    }

    /// Remove a single entry by path. Returns whether it was present.
    pub fn remove(&self, path: &str) -> bool {
        let mut removed = false;
        self.tx.send_modify(|changes| {
            let before = changes.len();
            changes.retain(|c| c.path != path);
            removed = changes.len() != before;
        });
        removed
    }

    pub fn snapshot(&self) -> Vec<Change> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Change>> {
        self.tx.subscribe()
    }

    pub fn get(&self, path: &str) -> Option<Change> {
        self.tx.borrow().iter().find(|c| c.path == path).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }
}

impl Default for ChangeSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(path: &str, status: ChangeStatus) -> Change {
        Change {
            path: path.to_string(),
            status,
            diff: String::new(),
        }
    }

    #[test]
    fn test_status_serializes_to_short_codes() {
        let json = serde_json::to_string(&change("main.tex", ChangeStatus::Modified))
            .expect("serialize");
        assert!(json.contains("\"status\":\"mod\""));

        let json = serde_json::to_string(&change("old.bib", ChangeStatus::Deleted))
            .expect("serialize");
        assert!(json.contains("\"status\":\"del\""));
    }

    #[test]
    fn test_replace_publishes_snapshot() {
        let set = ChangeSet::new();
        let mut rx = set.subscribe();
        assert!(set.is_empty());

        set.replace(vec![change("a.tex", ChangeStatus::New)]);
        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(rx.borrow_and_update().len(), 1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_remove_by_path() {
        let set = ChangeSet::new();
        set.replace(vec![
            change("a.tex", ChangeStatus::New),
            change("b.tex", ChangeStatus::Modified),
        ]);

        assert!(set.remove("a.tex"));
        assert!(!set.remove("a.tex"));
        assert_eq!(set.snapshot().len(), 1);
        assert_eq!(set.snapshot()[0].path, "b.tex");
    }

    #[test]
    fn test_get_finds_entry() {
        let set = ChangeSet::new();
        set.replace(vec![change("ch/intro.tex", ChangeStatus::Modified)]);
        assert!(set.get("ch/intro.tex").is_some());
        assert!(set.get("intro.tex").is_none());
    }
}
