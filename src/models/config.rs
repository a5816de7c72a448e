//! Sync configuration models

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Result, SyncError};

/// Prefix for per-project persisted configuration keys
pub const STORAGE_KEY_PREFIX: &str = "git_config_";

/// Default remote branch when the user leaves the field empty
pub const DEFAULT_BRANCH: &str = "main";

/// Minimum auto-sync interval in minutes
pub const MIN_INTERVAL_MINUTES: u64 = 1;

/// Per-project synchronization settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Remote repository URL (https)
    pub repo: String,
    pub branch: String,
    /// Optional username; when absent the token doubles as the username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub token: String,
    #[serde(default)]
    pub auto_sync: bool,
    /// Auto-sync period in minutes, persisted as `interval`
    #[serde(default = "default_interval", rename = "interval")]
    pub interval_minutes: u64,
    /// Custom CORS proxy base URL; replaces the built-in candidates entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

fn default_interval() -> u64 {
    5
}

impl SyncConfig {
    /// Validate boundary input before any network or Git work starts.
    pub fn validate(&self) -> Result<()> {
        if self.repo.trim().is_empty() || self.token.trim().is_empty() {
            return Err(SyncError::Config("Missing Repo/Token".to_string()));
        }
        let parsed = url::Url::parse(self.repo.trim())
            .map_err(|e| SyncError::Config(format!("Invalid repository URL: {e}")))?;
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(SyncError::Config(format!(
                "Unsupported repository scheme: {}",
                parsed.scheme()
            )));
        }
        if self.branch.trim().is_empty() {
            return Err(SyncError::Config("Branch must not be empty".to_string()));
        }
        if self.interval_minutes < MIN_INTERVAL_MINUTES {
            return Err(SyncError::Config(format!(
                "Sync interval must be at least {MIN_INTERVAL_MINUTES} minute"
            )));
        }
        Ok(())
    }

    /// Storage key scoping this configuration to one project.
    pub fn storage_key(project_id: &str) -> String {
        format!("{STORAGE_KEY_PREFIX}{project_id}")
    }

    /// Copy of this configuration pointing at a different branch.
    ///
    /// Used when the user accepts the main/master substitution so the
    /// accepted name is what gets persisted.
    pub fn with_branch(&self, branch: &str) -> SyncConfig {
        SyncConfig {
            branch: branch.to_string(),
            ..self.clone()
        }
    }
}

/// Persistence boundary for per-project configuration
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self, project_id: &str) -> Result<Option<SyncConfig>>;

    async fn save(&self, project_id: &str, config: &SyncConfig) -> Result<()>;
}

/// In-memory store backed by a map of storage keys
#[derive(Default)]
pub struct MemoryConfigStore {
    entries: Mutex<HashMap<String, SyncConfig>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self, project_id: &str) -> Result<Option<SyncConfig>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(&SyncConfig::storage_key(project_id)).cloned())
    }

    async fn save(&self, project_id: &str, config: &SyncConfig) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(SyncConfig::storage_key(project_id), config.clone());
        Ok(())
    }
}
