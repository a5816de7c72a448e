//! Ephemeral workspaces and per-operation repositories

use std::io::Cursor;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::services::identity::Platform;

const BOT_NAME: &str = "Bot";
const BOT_EMAIL: &str = "bot@qstat.site";

/// Default commit message when the user supplies none.
pub fn default_commit_message(platform: Platform, auto: bool) -> String {
    let auto_marker = if auto { " (Auto)" } else { "" };
    format!(
        "{} Sync{}: {}",
        platform.display_name(),
        auto_marker,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

/// A uniquely named scratch directory, destroyed on drop.
///
/// Every operation gets its own root so crashed or concurrent runs can
/// never see each other's files.
pub struct EphemeralWorkspace {
    _temp: TempDir,
    root: PathBuf,
}

impl EphemeralWorkspace {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let root = temp.path().join(format!(
            "sync-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4()
        ));
        std::fs::create_dir_all(&root)?;
        Ok(Self { _temp: temp, root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Extract all non-directory archive entries under the workspace
    /// root, creating parent directories as needed. Returns the number
    /// of files written.
    pub fn extract_archive(&self, bytes: &[u8]) -> Result<usize> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut written = 0;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let rel = entry.enclosed_name().ok_or_else(|| {
                SyncError::Integrity(format!("Unsafe archive path: {}", entry.name()))
            })?;
            let dest = self.root.join(rel);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(&dest)?;
            std::io::copy(&mut entry, &mut out)?;
            written += 1;
        }

        tracing::info!("Extracted {} files into {}", written, self.root.display());
        Ok(written)
    }

    /// Project-relative paths of all files, forward slashes, sorted.
    /// The `.git` directory is not part of the project content.
    pub fn list_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        collect_files(&self.root, &self.root, &mut files)?;
        files.sort();
        Ok(files)
    }

    /// Read a project-relative file as text, `None` when absent.
    pub fn read_to_string_opt(&self, rel_path: &str) -> Result<Option<String>> {
        let full = self.root.join(rel_path);
        match std::fs::read_to_string(&full) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn collect_files(dir: &Path, root: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            if path.file_name().is_some_and(|n| n == ".git") {
                continue;
            }
            collect_files(&path, root, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(rel);
        }
    }
    Ok(())
}

/// Git repository living inside an ephemeral workspace
pub struct SyncRepository {
    repo: git2::Repository,
}

impl SyncRepository {
    /// Initialize a fresh repository at `root` with `origin` attached.
    pub fn init(root: &Path, origin_url: &str) -> Result<Self> {
        let repo = git2::Repository::init(root)?;
        repo.remote("origin", origin_url)?;
        Ok(Self { repo })
    }

    pub fn repo(&self) -> &git2::Repository {
        &self.repo
    }

    /// Check out the fetched remote tip into a local branch of the same
    /// name and make it HEAD.
    pub fn checkout_remote_branch(&self, branch: &str) -> Result<()> {
        let reference = self
            .repo
            .find_reference(&format!("refs/remotes/origin/{branch}"))
            .map_err(|_| SyncError::BranchNotFound(branch.to_string()))?;
        let commit = reference.peel_to_commit()?;
        self.repo.branch(branch, &commit, true)?;
        self.repo.set_head(&format!("refs/heads/{branch}"))?;
        self.repo
            .checkout_head(Some(git2::build::CheckoutBuilder::default().force()))?;
        Ok(())
    }

    /// Point the unborn HEAD at `branch` so the first commit creates it.
    pub fn prepare_unborn_branch(&self, branch: &str) -> Result<()> {
        self.repo.set_head(&format!("refs/heads/{branch}"))?;
        Ok(())
    }

    /// Stage every file in the work tree.
    pub fn stage_all(&self) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"], git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;
        Ok(())
    }

    /// Commit the staged index on HEAD as the sync bot.
    pub fn commit(&self, message: &str) -> Result<git2::Oid> {
        let mut index = self.repo.index()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;
        let sig = git2::Signature::now(BOT_NAME, BOT_EMAIL)?;

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.as_ref().into_iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        Ok(oid)
    }

    /// Committer time of the fetched remote tip in epoch millis.
    /// 0 means unknown; the arbiter treats that as "skip the check".
    pub fn remote_tip_millis(&self, branch: &str) -> u64 {
        let time = self
            .repo
            .find_reference(&format!("refs/remotes/origin/{branch}"))
            .and_then(|r| r.peel_to_commit())
            .map(|c| c.time().seconds().max(0) as u64 * 1000);
        match time {
            Ok(millis) => millis,
            Err(e) => {
                tracing::warn!("Could not read remote tip time for {}: {}", branch, e);
                0
            }
        }
    }
}
