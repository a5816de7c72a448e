//! Project identity resolution
//! Per-platform project ids, download coordinates and last-modified probes

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

const OVERLEAF_BASE: &str = "https://www.overleaf.com";
const TEXPAGE_BASE: &str = "https://www.texpage.com";

static UUID_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9a-fA-F-]{36})").expect("valid regex"));
static UUID_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/([0-9a-fA-F-]{36})/([0-9a-fA-F-]{36})").expect("valid regex"));
static PROJECT_KEY_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""projectKey"\s*:\s*"([0-9a-fA-F-]+)""#).expect("valid regex"));
static VERSION_NO_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""versionNo"\s*:\s*"([0-9a-fA-F-]+)""#).expect("valid regex"));
static PROJECTS_META: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"name="ol-prefetchedProjectsBlob"[^>]*content="([^"]*)""#).expect("valid regex")
});

/// Supported editor platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Overleaf,
    TexPage,
}

impl Platform {
    /// Name used in generated commit messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Overleaf => "Overleaf",
            Platform::TexPage => "TexPage",
        }
    }
}

/// Resolved snapshot download location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadCoordinates {
    pub url: String,
}

/// Extract the project id from the page URL path, falling back to the
/// page HTML where the platform embeds it there.
pub fn resolve_project_id(platform: Platform, url_path: &str, page_html: &str) -> Result<String> {
    let id = match platform {
        Platform::Overleaf => url_path
            .split('/')
            .nth(2)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string()),
        Platform::TexPage => UUID_SEGMENT
            .captures(url_path)
            .map(|c| c[1].to_string())
            .or_else(|| {
                PROJECT_KEY_FIELD
                    .captures(page_html)
                    .map(|c| c[1].to_string())
            })
            .or_else(|| {
                let slug = url_path.trim_matches('/').replace('/', "_");
                (!slug.is_empty()).then_some(slug)
            }),
    };

    id.ok_or_else(|| {
        SyncError::Identity(format!(
            "Could not determine {} project id from {url_path}",
            platform.display_name()
        ))
    })
}

/// Build the ZIP download location for a project.
pub fn resolve_download(
    platform: Platform,
    project_id: &str,
    url_path: &str,
    page_html: &str,
) -> Result<DownloadCoordinates> {
    build_download(
        OVERLEAF_BASE,
        TEXPAGE_BASE,
        platform,
        project_id,
        url_path,
        page_html,
    )
}

fn build_download(
    overleaf_base: &str,
    texpage_base: &str,
    platform: Platform,
    project_id: &str,
    url_path: &str,
    page_html: &str,
) -> Result<DownloadCoordinates> {
    let url = match platform {
        Platform::Overleaf => format!("{overleaf_base}/project/{project_id}/download/zip"),
        Platform::TexPage => {
            let (key, version) = if let Some(caps) = UUID_PAIR.captures(url_path) {
                (caps[1].to_string(), caps[2].to_string())
            } else {
                let key = PROJECT_KEY_FIELD
                    .captures(page_html)
                    .map(|c| c[1].to_string());
                let version = VERSION_NO_FIELD
                    .captures(page_html)
                    .map(|c| c[1].to_string());
                match (key, version) {
                    (Some(k), Some(v)) => (k, v),
                    _ => {
                        return Err(SyncError::Identity(
                            "Missing TexPage projectKey/versionNo".to_string(),
                        ))
                    }
                }
            };
            format!(
                "{texpage_base}/api/project/download?projectKey={key}&versionNo={version}&bbl=false"
            )
        }
    };

    Ok(DownloadCoordinates { url })
}

#[derive(Debug, Deserialize)]
struct ProjectsBlob {
    projects: Vec<ProjectEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectEntry {
    id: String,
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    result: Option<ListingResult>,
}

#[derive(Debug, Deserialize)]
struct ListingResult {
    list: Vec<ListingEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingEntry {
    project_key: String,
    update_at: Option<String>,
}

/// Probes the platform for a project's server-side last-modified time
pub struct IdentityResolver {
    client: reqwest::Client,
    overleaf_base: String,
    texpage_base: String,
}

impl IdentityResolver {
    pub fn new() -> Result<Self> {
        Self::with_bases(OVERLEAF_BASE, TEXPAGE_BASE)
    }

    /// Override the platform origins, e.g. to point at a local test server.
    pub fn with_bases(overleaf_base: &str, texpage_base: &str) -> Result<Self> {
        let client = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            overleaf_base: overleaf_base.trim_end_matches('/').to_string(),
            texpage_base: texpage_base.trim_end_matches('/').to_string(),
        })
    }

    /// Build the ZIP download location against this resolver's origins.
    pub fn download_coordinates(
        &self,
        platform: Platform,
        project_id: &str,
        url_path: &str,
        page_html: &str,
    ) -> Result<DownloadCoordinates> {
        build_download(
            &self.overleaf_base,
            &self.texpage_base,
            platform,
            project_id,
            url_path,
            page_html,
        )
    }

    /// Server-side last-modified time in epoch millis. 0 means unknown;
    /// this probe never fails the surrounding operation.
    pub async fn last_modified_millis(&self, platform: Platform, project_id: &str) -> u64 {
        let probed = match platform {
            Platform::Overleaf => self.overleaf_last_modified(project_id).await,
            Platform::TexPage => self.texpage_last_modified(project_id).await,
        };
        match probed {
            Ok(Some(millis)) => millis,
            Ok(None) => {
                tracing::warn!(
                    "No last-modified time for {} project {}",
                    platform.display_name(),
                    project_id
                );
                0
            }
            Err(e) => {
                tracing::warn!(
                    "Last-modified probe failed for {} project {}: {}",
                    platform.display_name(),
                    project_id,
                    e
                );
                0
            }
        }
    }

    async fn overleaf_last_modified(&self, project_id: &str) -> Result<Option<u64>> {
        let url = format!("{}/project", self.overleaf_base);
        let html = self.client.get(&url).send().await?.text().await?;

        let content = match PROJECTS_META.captures(&html) {
            Some(caps) => unescape_html_attr(&caps[1]),
            None => return Ok(None),
        };

        let blob: ProjectsBlob = serde_json::from_str(&content)?;
        Ok(blob
            .projects
            .iter()
            .find(|p| p.id == project_id)
            .and_then(|p| p.last_updated.as_deref())
            .and_then(parse_rfc3339_millis))
    }

    async fn texpage_last_modified(&self, project_id: &str) -> Result<Option<u64>> {
        // Cache-busting timestamp; the listing endpoint is otherwise cached
        let url = format!(
            "{}/api/project?t={}&page=1&projectName=&sortBy=updateAt&getType=all",
            self.texpage_base,
            chrono::Utc::now().timestamp_millis()
        );
        let response = self
            .client
            .get(&url)
            .header("Content-Type", "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }

        let listing: ListingResponse = response.json().await?;
        Ok(listing
            .result
            .map(|r| r.list)
            .unwrap_or_default()
            .iter()
            .find(|p| p.project_key == project_id)
            .and_then(|p| p.update_at.as_deref())
            .and_then(parse_rfc3339_millis))
    }
}

fn parse_rfc3339_millis(raw: &str) -> Option<u64> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.timestamp_millis().max(0) as u64)
}

fn unescape_html_attr(raw: &str) -> String {
    raw.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
