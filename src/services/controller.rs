//! Sync orchestration
//! Push and pull pipelines, status publishing and the auto-sync timer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::error::{Result, SyncError};
use crate::models::{Change, ConfigStore, RemoteRefs, SyncStatus, MIN_INTERVAL_MINUTES};
use crate::services::arbiter::{check_pull_conflict, check_push_conflict, ConfirmPrompt};
use crate::services::bridge::ReviewBridge;
use crate::services::change_detector::commit_has_changes;
use crate::services::host::EditorHost;
use crate::services::identity::{resolve_project_id, IdentityResolver, Platform};
use crate::services::reconcile::reconcile;
use crate::services::snapshot::SnapshotFetcher;
use crate::services::transport::{
    candidate_routes, fetch_branch, push_branch, select_working_proxy, GitAuth, ProxySelection,
};
use crate::services::workspace::{default_commit_message, EphemeralWorkspace, SyncRepository};

/// Per-invocation push settings
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Commit message override; blank or absent uses the generated one
    pub commit_message: Option<String>,
    /// Timer-initiated runs skip the conflict gate and are marked in
    /// the commit message
    pub auto: bool,
}

/// Releases the in-flight flag when the operation ends, however it ends
struct OpGuard {
    flag: Arc<AtomicBool>,
}

impl OpGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Runs libgit2 and archive work off the async executor
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SyncError::OperationFailed(format!("Task failed: {e}")))?
}

/// Orchestrates sync operations for one editor project.
///
/// Owns the HTTP services, the pending review and the auto-sync timer.
/// At most one push and one pull run at a time; overlapping requests
/// are rejected immediately instead of queued.
pub struct SyncController {
    platform: Platform,
    project_id: String,
    host: Arc<dyn EditorHost>,
    prompt: Arc<dyn ConfirmPrompt>,
    config_store: Arc<dyn ConfigStore>,
    resolver: IdentityResolver,
    fetcher: SnapshotFetcher,
    push_in_flight: Arc<AtomicBool>,
    pull_in_flight: Arc<AtomicBool>,
    auto_task: Mutex<Option<JoinHandle<()>>>,
    review: Mutex<Option<ReviewBridge>>,
    status: watch::Sender<SyncStatus>,
}

impl SyncController {
    pub fn new(
        platform: Platform,
        host: Arc<dyn EditorHost>,
        prompt: Arc<dyn ConfirmPrompt>,
        config_store: Arc<dyn ConfigStore>,
    ) -> Result<Arc<Self>> {
        let resolver = IdentityResolver::new()?;
        let fetcher = SnapshotFetcher::new()?;
        Self::with_services(platform, host, prompt, config_store, resolver, fetcher)
    }

    /// Build with pre-configured HTTP services, e.g. ones pointed at a
    /// local test server.
    pub fn with_services(
        platform: Platform,
        host: Arc<dyn EditorHost>,
        prompt: Arc<dyn ConfirmPrompt>,
        config_store: Arc<dyn ConfigStore>,
        resolver: IdentityResolver,
        fetcher: SnapshotFetcher,
    ) -> Result<Arc<Self>> {
        let project_id = resolve_project_id(platform, &host.url_path(), &host.page_html())?;
        let (status, _) = watch::channel(SyncStatus::info("Idle"));
        Ok(Arc::new(Self {
            platform,
            project_id,
            host,
            prompt,
            config_store,
            resolver,
            fetcher,
            push_in_flight: Arc::new(AtomicBool::new(false)),
            pull_in_flight: Arc::new(AtomicBool::new(false)),
            auto_task: Mutex::new(None),
            review: Mutex::new(None),
            status,
        }))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn current_status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    fn publish(&self, status: SyncStatus) {
        self.status.send_replace(status);
    }

    /// Capture the editor content and push it to the remote as one
    /// commit. Returns the terminal status, which is also published.
    pub async fn push(&self, options: SyncOptions) -> SyncStatus {
        let Some(_guard) = OpGuard::acquire(&self.push_in_flight) else {
            tracing::warn!("Push dropped, a sync is already running");
            return SyncStatus::busy("Sync already in progress");
        };

        let status = match self.push_inner(&options).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!("Push failed: {}", e);
                SyncStatus::from_error(&e)
            }
        };
        self.publish(status.clone());
        status
    }

    async fn push_inner(&self, options: &SyncOptions) -> Result<SyncStatus> {
        let config = self
            .config_store
            .load(&self.project_id)
            .await?
            .ok_or_else(|| SyncError::Config("Missing Repo/Token".to_string()))?;
        config.validate()?;

        self.publish(SyncStatus::busy("Checking remote..."));
        let auth = GitAuth {
            username: config.username.clone(),
            token: config.token.clone(),
        };
        let repo_url = config.repo.trim().to_string();
        let routes = candidate_routes(config.proxy.as_deref());
        let listing = {
            let repo_url = repo_url.clone();
            let routes = routes.clone();
            let auth = auth.clone();
            run_blocking(move || select_working_proxy(&repo_url, &routes, &auth)).await
        };
        let selection = match listing {
            Ok(selection) => selection,
            Err(SyncError::AllProxiesFailed(reason)) => {
                // Listing is advisory on push: the branch is treated as
                // unborn and force-created on the remote
                tracing::warn!("Remote listing unavailable ({}), continuing blind", reason);
                ProxySelection {
                    route: routes[0].clone(),
                    refs: RemoteRefs::default(),
                }
            }
            Err(e) => return Err(e),
        };

        let mut branch = config.branch.trim().to_string();
        if !selection.refs.has_branch(&branch) {
            if let Some(alternate) = selection.refs.available_alternate(&branch) {
                let message =
                    format!("Branch '{branch}' not found, use '{alternate}' instead?");
                if !self.prompt.confirm(&message).await {
                    return Err(SyncError::ConflictAbort("Push Cancelled".to_string()));
                }
                self.config_store
                    .save(&self.project_id, &config.with_branch(alternate))
                    .await?;
                branch = alternate.to_string();
            }
        }

        let origin_url = selection.route.rewrite(&repo_url)?;
        let has_branch = selection.refs.has_branch(&branch);
        if has_branch {
            self.publish(SyncStatus::busy("Fetching..."));
        }
        let (workspace, repo, remote_millis) = {
            let branch = branch.clone();
            let auth = auth.clone();
            run_blocking(move || {
                let workspace = EphemeralWorkspace::new()?;
                let repo = SyncRepository::init(workspace.path(), &origin_url)?;
                let remote_millis = if has_branch {
                    fetch_branch(repo.repo(), &branch, &auth)?;
                    repo.checkout_remote_branch(&branch)?;
                    repo.remote_tip_millis(&branch)
                } else {
                    repo.prepare_unborn_branch(&branch)?;
                    0
                };
                Ok((workspace, repo, remote_millis))
            })
            .await?
        };

        if !options.auto {
            let local_millis = self
                .resolver
                .last_modified_millis(self.platform, &self.project_id)
                .await;
            check_push_conflict(self.prompt.as_ref(), local_millis, remote_millis).await?;
        }

        self.publish(SyncStatus::busy("Downloading ZIP..."));
        let coords = self.resolver.download_coordinates(
            self.platform,
            &self.project_id,
            &self.host.url_path(),
            &self.host.page_html(),
        )?;
        let bytes = self.fetcher.fetch_snapshot(&coords).await?;

        self.publish(SyncStatus::busy("Extracting..."));
        let workspace = run_blocking(move || {
            workspace.extract_archive(&bytes)?;
            Ok(workspace)
        })
        .await?;

        self.publish(SyncStatus::busy("Committing..."));
        let message = options
            .commit_message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_commit_message(self.platform, options.auto));
        let (repo, changed) = run_blocking(move || {
            repo.stage_all()?;
            let oid = repo.commit(&message)?;
            let changed = commit_has_changes(repo.repo(), oid);
            Ok((repo, changed))
        })
        .await?;

        if !changed {
            return Ok(SyncStatus::success("No updates found."));
        }

        self.publish(SyncStatus::busy("Pushing..."));
        run_blocking(move || push_branch(repo.repo(), &branch, &auth)).await?;
        // The checkout directory must outlive the push
        drop(workspace);

        Ok(SyncStatus::success(format!(
            "Success: {}",
            chrono::Local::now().format("%H:%M:%S")
        )))
    }

    /// Fetch the remote, diff it against the editor content and open a
    /// review session over the differences.
    pub async fn pull(&self) -> SyncStatus {
        let Some(_guard) = OpGuard::acquire(&self.pull_in_flight) else {
            tracing::warn!("Pull dropped, a sync is already running");
            return SyncStatus::busy("Sync already in progress");
        };

        let status = match self.pull_inner().await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!("Pull failed: {}", e);
                SyncStatus::from_error(&e)
            }
        };
        self.publish(status.clone());
        status
    }

    async fn pull_inner(&self) -> Result<SyncStatus> {
        let config = self
            .config_store
            .load(&self.project_id)
            .await?
            .ok_or_else(|| SyncError::Config("Missing Repo/Token".to_string()))?;
        config.validate()?;

        self.publish(SyncStatus::busy("Checking remote..."));
        let auth = GitAuth {
            username: config.username.clone(),
            token: config.token.clone(),
        };
        let repo_url = config.repo.trim().to_string();
        let routes = candidate_routes(config.proxy.as_deref());
        // There is nothing to diff against without a reachable remote
        let selection = {
            let repo_url = repo_url.clone();
            let auth = auth.clone();
            run_blocking(move || select_working_proxy(&repo_url, &routes, &auth)).await?
        };

        let mut branch = config.branch.trim().to_string();
        if !selection.refs.has_branch(&branch) {
            match selection.refs.available_alternate(&branch) {
                Some(alternate) => {
                    let message =
                        format!("Branch '{branch}' not found, use '{alternate}' instead?");
                    if !self.prompt.confirm(&message).await {
                        return Err(SyncError::ConflictAbort("Pull Cancelled".to_string()));
                    }
                    self.config_store
                        .save(&self.project_id, &config.with_branch(alternate))
                        .await?;
                    branch = alternate.to_string();
                }
                None => return Err(SyncError::BranchNotFound(branch)),
            }
        }

        self.publish(SyncStatus::busy("Fetching..."));
        let origin_url = selection.route.rewrite(&repo_url)?;
        let (remote_ws, remote_millis) = run_blocking(move || {
            let remote_ws = EphemeralWorkspace::new()?;
            let repo = SyncRepository::init(remote_ws.path(), &origin_url)?;
            fetch_branch(repo.repo(), &branch, &auth)?;
            repo.checkout_remote_branch(&branch)?;
            let remote_millis = repo.remote_tip_millis(&branch);
            Ok((remote_ws, remote_millis))
        })
        .await?;

        let local_millis = self
            .resolver
            .last_modified_millis(self.platform, &self.project_id)
            .await;
        check_pull_conflict(self.prompt.as_ref(), local_millis, remote_millis).await?;

        self.publish(SyncStatus::busy("Downloading ZIP..."));
        let coords = self.resolver.download_coordinates(
            self.platform,
            &self.project_id,
            &self.host.url_path(),
            &self.host.page_html(),
        )?;
        let bytes = self.fetcher.fetch_snapshot(&coords).await?;

        self.publish(SyncStatus::busy("Extracting..."));
        let snapshot_ws = run_blocking(move || {
            let snapshot_ws = EphemeralWorkspace::new()?;
            snapshot_ws.extract_archive(&bytes)?;
            Ok(snapshot_ws)
        })
        .await?;

        self.publish(SyncStatus::busy("Calculating Diff..."));
        let (remote_ws, changes) = run_blocking(move || {
            let changes = reconcile(&remote_ws, &snapshot_ws)?;
            Ok((remote_ws, changes))
        })
        .await?;
        if changes.is_empty() {
            *self.review.lock().await = None;
            return Ok(SyncStatus::success("No updates found."));
        }

        *self.review.lock().await = Some(ReviewBridge::new(remote_ws, changes));
        Ok(SyncStatus::info("Review changes"))
    }

    /// Apply one reviewed change into the editor.
    pub async fn apply(&self, path: &str) -> Result<()> {
        let review = self.review.lock().await;
        let bridge = review
            .as_ref()
            .ok_or_else(|| SyncError::OperationFailed("No review in progress".to_string()))?;
        bridge.apply(path, self.host.as_ref())
    }

    /// Changes still awaiting review; empty when no review is open.
    pub async fn pending_changes(&self) -> Vec<Change> {
        self.review
            .lock()
            .await
            .as_ref()
            .map(|bridge| bridge.pending())
            .unwrap_or_default()
    }

    pub async fn auto_sync_active(&self) -> bool {
        self.auto_task.lock().await.is_some()
    }

    /// Start or stop the auto-sync timer. Replacing an existing timer
    /// aborts it first so intervals never overlap. Ticks that land
    /// while a sync is running are dropped by the in-flight guard.
    pub async fn set_auto_sync(self: &Arc<Self>, enabled: bool, interval_minutes: u64) {
        let mut task = self.auto_task.lock().await;
        if let Some(handle) = task.take() {
            handle.abort();
            tracing::info!("Stopped the auto-sync timer");
        }
        if !enabled {
            return;
        }

        let minutes = interval_minutes.max(MIN_INTERVAL_MINUTES);
        let period = Duration::from_secs(minutes * 60);
        tracing::info!("Auto-sync every {} minute(s)", minutes);

        // The timer must not keep the controller alive on its own
        let weak = Arc::downgrade(self);
        *task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                let Some(controller) = weak.upgrade() else { break };
                controller
                    .push(SyncOptions {
                        commit_message: None,
                        auto: true,
                    })
                    .await;
            }
        }));
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        if let Some(handle) = self.auto_task.get_mut().take() {
            handle.abort();
        }
    }
}
