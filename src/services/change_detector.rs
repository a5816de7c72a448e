//! Commit change detection

/// Whether `commit_oid` actually changed anything relative to its first
/// parent. Parentless commits always count as changes. History read
/// errors fail open so a real update is never silently dropped.
pub fn commit_has_changes(repo: &git2::Repository, commit_oid: git2::Oid) -> bool {
    let compared = (|| -> Result<bool, git2::Error> {
        let commit = repo.find_commit(commit_oid)?;
        let parent = match commit.parent(0) {
            Ok(parent) => parent,
            Err(_) => return Ok(true),
        };
        Ok(commit.tree_id() != parent.tree_id())
    })();

    match compared {
        Ok(has_changes) => {
            if !has_changes {
                tracing::info!("Commit {} matches its parent tree, no changes", commit_oid);
            }
            has_changes
        }
        Err(e) => {
            tracing::warn!("Change detection failed for {}: {}", commit_oid, e);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestRepo;

    #[test]
    fn test_parentless_commit_has_changes() {
        let repo = TestRepo::new();
        let oid = repo.create_commit("init", &[("main.tex", "x")]);
        assert!(commit_has_changes(&repo.repo(), oid));
    }

    #[test]
    fn test_identical_tree_has_no_changes() {
        let repo = TestRepo::new();
        repo.create_commit("init", &[("main.tex", "x")]);
        // Same content again: the new commit's tree equals its parent's
        let oid = repo.create_commit("noop", &[("main.tex", "x")]);
        assert!(!commit_has_changes(&repo.repo(), oid));
    }

    #[test]
    fn test_modified_tree_has_changes() {
        let repo = TestRepo::new();
        repo.create_commit("init", &[("main.tex", "x")]);
        let oid = repo.create_commit("edit", &[("main.tex", "y")]);
        assert!(commit_has_changes(&repo.repo(), oid));
    }

    #[test]
    fn test_unknown_commit_fails_open() {
        let repo = TestRepo::new();
        repo.create_commit("init", &[("main.tex", "x")]);
        let missing = git2::Oid::from_str("0123456789012345678901234567890123456789")
            .expect("oid");
        assert!(commit_has_changes(&repo.repo(), missing));
    }
}
