//! Test utilities: temporary git repositories, archive fixtures and
//! scripted trait implementations

#![cfg(test)]

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::services::arbiter::ConfirmPrompt;
use crate::services::host::EditorHost;

/// A temporary git repository for testing
pub struct TestRepo {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TestRepo {
    /// Create a new empty git repository
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().to_path_buf();

        let repo = git2::Repository::init(&path).expect("Failed to init repo");

        // Configure user for commits
        let mut config = repo.config().expect("Failed to get config");
        config
            .set_str("user.name", "Test User")
            .expect("Failed to set user.name");
        config
            .set_str("user.email", "test@example.com")
            .expect("Failed to set user.email");

        Self { dir, path }
    }

    /// Create a new empty bare repository
    pub fn new_bare() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().to_path_buf();
        git2::Repository::init_bare(&path).expect("Failed to init bare repo");
        Self { dir, path }
    }

    /// Get the repository path as a string
    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    /// Get the git2 repository
    pub fn repo(&self) -> git2::Repository {
        git2::Repository::open(&self.path).expect("Failed to open repo")
    }

    /// Create a file with content
    pub fn create_file(&self, name: &str, content: &str) {
        let file_path = self.path.join(name);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
    }

    /// Stage a file
    pub fn stage_file(&self, name: &str) {
        let repo = self.repo();
        let mut index = repo.index().expect("Failed to get index");
        index
            .add_path(std::path::Path::new(name))
            .expect("Failed to stage file");
        index.write().expect("Failed to write index");
    }

    /// Create a commit with the given files
    pub fn create_commit(&self, message: &str, files: &[(&str, &str)]) -> git2::Oid {
        let repo = self.repo();

        // Create and stage files
        for (name, content) in files {
            self.create_file(name, content);
            self.stage_file(name);
        }

        // Create commit
        let mut index = repo.index().expect("Failed to get index");
        let tree_oid = index.write_tree().expect("Failed to write tree");
        let tree = repo.find_tree(tree_oid).expect("Failed to find tree");
        let sig = repo.signature().expect("Failed to get signature");

        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.as_ref().into_iter().collect();

        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Create or re-point a branch at the current HEAD
    pub fn create_branch(&self, name: &str) -> git2::Oid {
        let repo = self.repo();
        let head = repo.head().expect("Failed to get HEAD");
        let commit = head.peel_to_commit().expect("Failed to get commit");
        // Force, since init may have named the default branch already
        repo.branch(name, &commit, true)
            .expect("Failed to create branch");
        commit.id()
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

/// Deflated ZIP archive holding the given files
pub fn zip_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in files {
            writer.start_file(*name, options).expect("Failed to start entry");
            writer
                .write_all(content.as_bytes())
                .expect("Failed to write entry");
        }
        writer.finish().expect("Failed to finish archive");
    }
    cursor.into_inner()
}

/// Confirmation prompt with a fixed answer and a question counter
pub struct ScriptedPrompt {
    answer: bool,
    asked: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn accepting() -> Self {
        Self {
            answer: true,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn refusing() -> Self {
        Self {
            answer: false,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfirmPrompt for ScriptedPrompt {
    async fn confirm(&self, _message: &str) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

/// Editor host with a fixed page and a recording apply sink
pub struct ScriptedHost {
    url_path: String,
    html: String,
    open_path: Mutex<Option<String>>,
    applied: Mutex<Vec<String>>,
}

impl ScriptedHost {
    pub fn new(url_path: &str, html: &str) -> Self {
        Self {
            url_path: url_path.to_string(),
            html: html.to_string(),
            open_path: Mutex::new(None),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn set_open_path(&self, path: Option<&str>) {
        *self.open_path.lock().expect("lock") = path.map(|p| p.to_string());
    }

    /// Contents handed to `apply_content`, in order
    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().expect("lock").clone()
    }
}

impl EditorHost for ScriptedHost {
    fn url_path(&self) -> String {
        self.url_path.clone()
    }

    fn page_html(&self) -> String {
        self.html.clone()
    }

    fn current_open_path(&self) -> Option<String> {
        self.open_path.lock().expect("lock").clone()
    }

    fn apply_content(&self, content: &str) {
        self.applied.lock().expect("lock").push(content.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_repo() {
        let repo = TestRepo::new();
        assert!(repo.path.exists());
        assert!(repo.path.join(".git").exists());
    }

    #[test]
    fn test_create_commit() {
        let repo = TestRepo::new();
        repo.create_commit("Initial commit", &[("main.tex", "x")]);
        let git_repo = repo.repo();
        let head = git_repo.head().expect("No HEAD");
        assert!(head.target().is_some());
    }

    #[test]
    fn test_zip_archive_round_trips() {
        let bytes = zip_archive(&[("a.tex", "alpha"), ("dir/b.tex", "beta")]);
        let mut archive =
            zip::ZipArchive::new(std::io::Cursor::new(bytes)).expect("valid archive");
        assert_eq!(archive.len(), 2);
        let mut entry = archive.by_name("dir/b.tex").expect("entry");
        let mut content = String::new();
        std::io::Read::read_to_string(&mut entry, &mut content).expect("read");
        assert_eq!(content, "beta");
    }

    #[tokio::test]
    async fn test_scripted_prompt_counts_questions() {
        let prompt = ScriptedPrompt::accepting();
        assert!(prompt.confirm("sure?").await);
        assert!(prompt.confirm("again?").await);
        assert_eq!(prompt.asked(), 2);
    }

    #[test]
    fn test_scripted_host_records_applies() {
        let host = ScriptedHost::new("/project/p1", "<html></html>");
        assert_eq!(host.current_open_path(), None);
        host.set_open_path(Some("main.tex"));
        host.apply_content("new text");
        assert_eq!(host.current_open_path(), Some("main.tex".to_string()));
        assert_eq!(host.applied(), vec!["new text".to_string()]);
    }
}
