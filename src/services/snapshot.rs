//! Snapshot download and validation

use std::io::Cursor;

use crate::error::{Result, SyncError};
use crate::services::identity::DownloadCoordinates;

/// Downloads below this size are rejected as truncated or error pages
pub const MIN_SNAPSHOT_BYTES: usize = 100;

/// Credentialed ZIP snapshot downloader
pub struct SnapshotFetcher {
    client: reqwest::Client,
}

impl SnapshotFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self { client })
    }

    /// Download the project snapshot, validating the response in layers
    /// before any byte reaches a workspace.
    pub async fn fetch_snapshot(&self, coords: &DownloadCoordinates) -> Result<Vec<u8>> {
        tracing::info!("Downloading snapshot from {}", coords.url);
        let response = self.client.get(&coords.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Network(format!("Download failed: {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        // An HTML body on the download endpoint is the login page
        if content_type.contains("text/html") {
            return Err(SyncError::AuthRequired(
                "Session expired, please re-login to the editor".to_string(),
            ));
        }

        if content_type.contains("application/json") {
            let body = response.text().await?;
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .or_else(|| v.get("error"))
                        .and_then(|m| m.as_str())
                        .map(|m| m.to_string())
                })
                .unwrap_or_else(|| "Server rejected the download".to_string());
            return Err(SyncError::ContentType(message));
        }

        let bytes = response.bytes().await?.to_vec();
        if bytes.len() < MIN_SNAPSHOT_BYTES {
            return Err(SyncError::Integrity(format!(
                "Snapshot too small ({} bytes)",
                bytes.len()
            )));
        }

        zip::ZipArchive::new(Cursor::new(&bytes))
            .map_err(|e| SyncError::Integrity(format!("Snapshot is not a valid archive: {e}")))?;

        tracing::info!("Snapshot downloaded: {} bytes", bytes.len());
        Ok(bytes)
    }
}
