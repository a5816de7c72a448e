//! Diff and reconciliation engine

use std::collections::BTreeSet;

use similar::TextDiff;

use crate::error::Result;
use crate::models::{Change, ChangeStatus};
use crate::services::workspace::EphemeralWorkspace;

const TEXT_EXTENSIONS: [&str; 6] = ["tex", "bib", "txt", "cls", "sty", "md"];

fn is_text_candidate(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            TEXT_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn normalize(content: &str) -> String {
    content.replace("\r\n", "\n")
}

/// Compare the remote checkout against the editor snapshot and produce
/// the pending change list.
///
/// Walks the union of both file listings so deletions on either side are
/// visible: `New` is remote-only, `Deleted` is editor-only. Contents are
/// CRLF-normalized before comparison; files equal after normalization
/// produce no change. An empty result means fully synchronized.
pub fn reconcile(
    remote: &EphemeralWorkspace,
    snapshot: &EphemeralWorkspace,
) -> Result<Vec<Change>> {
    let mut paths = BTreeSet::new();
    for path in remote.list_files()? {
        if is_text_candidate(&path) {
            paths.insert(path);
        }
    }
    for path in snapshot.list_files()? {
        if is_text_candidate(&path) {
            paths.insert(path);
        }
    }

    let mut changes = Vec::new();
    for path in paths {
        let remote_content = remote.read_to_string_opt(&path)?.map(|c| normalize(&c));
        let local_content = snapshot.read_to_string_opt(&path)?.map(|c| normalize(&c));

        if remote_content == local_content {
            continue;
        }

        let status = match (&local_content, &remote_content) {
            (None, Some(_)) => ChangeStatus::New,
            (Some(_), None) => ChangeStatus::Deleted,
            _ => ChangeStatus::Modified,
        };

        let old = local_content.unwrap_or_default();
        let new = remote_content.unwrap_or_default();
        let diff = TextDiff::from_lines(&old, &new)
            .unified_diff()
            .context_radius(3)
            .header(&path, &path)
            .to_string();

        changes.push(Change { path, status, diff });
    }

    tracing::info!("Reconciliation produced {} change(s)", changes.len());
    Ok(changes)
}
