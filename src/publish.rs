//! Optional publishing of a finished lesson to a GitHub repository through the contents
//! API. One request, no retry; the local file is removed once the upload is accepted.

use crate::config::PublishSettings;
use crate::error::ApiError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const USER_AGENT: &str = concat!("lessonforge/", env!("CARGO_PKG_VERSION"));
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    content: Option<ContentInfo>,
}

#[derive(Debug, Deserialize)]
struct ContentInfo {
    download_url: Option<String>,
    html_url: Option<String>,
}

pub struct GitHubPublisher {
    client: Client,
    api_base: String,
    repository: String,
    token: String,
    branch: Option<String>,
    path_prefix: String,
}

impl GitHubPublisher {
    /// Build from config, falling back to `GITHUB_REPO` / `GITHUB_TOKEN`.
    pub fn from_settings(settings: &PublishSettings) -> Result<Self, ApiError> {
        Self::new(
            settings.resolve_repository(),
            settings.resolve_token(),
            settings,
        )
    }

    /// Fails with `ConfigError` when either credential is missing; no network access.
    pub fn new(
        repository: Option<String>,
        token: Option<String>,
        settings: &PublishSettings,
    ) -> Result<Self, ApiError> {
        let repository = repository.ok_or_else(|| {
            ApiError::ConfigError(
                "Publishing needs a repository (publish.repository or GITHUB_REPO)".to_string(),
            )
        })?;
        let token = token.ok_or_else(|| {
            ApiError::ConfigError(
                "Publishing needs an access token (publish.token or GITHUB_TOKEN)".to_string(),
            )
        })?;
        if repository.split('/').filter(|part| !part.is_empty()).count() != 2 {
            return Err(ApiError::ConfigError(format!(
                "Repository must look like 'owner/name' (got '{}')",
                repository
            )));
        }

        let client = Client::builder()
            .timeout(PUBLISH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::PublishFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            repository,
            token,
            branch: settings.branch.clone().filter(|b| !b.trim().is_empty()),
            path_prefix: settings.path_prefix.trim_matches('/').to_string(),
        })
    }

    /// Upload `local_path` and return its download URL. The local file is deleted after
    /// the upload is accepted.
    pub async fn publish(&self, local_path: &Path) -> Result<String, ApiError> {
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ApiError::PublishFailed(format!("Not a file path: {}", local_path.display()))
            })?;
        let bytes = fs::read(local_path)?;

        let remote_path = unique_remote_path(
            &self.path_prefix,
            &file_name,
            Utc::now(),
            &mut rand::thread_rng(),
        );
        let url = format!(
            "{}/repos/{}/contents/{}",
            self.api_base, self.repository, remote_path
        );
        let body = PutContentsRequest {
            message: format!("Upload video: {}", file_name),
            content: STANDARD.encode(&bytes),
            branch: self.branch.as_deref(),
        };

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::PublishFailed(format!("Upload request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::PublishFailed(format!(
                "Upload rejected with status {}: {}",
                status.as_u16(),
                text
            )));
        }

        let parsed: PutContentsResponse = response
            .json()
            .await
            .map_err(|e| ApiError::PublishFailed(format!("Unreadable upload response: {}", e)))?;
        let download_url = parsed
            .content
            .and_then(|c| c.download_url.or(c.html_url))
            .ok_or_else(|| {
                ApiError::PublishFailed("Upload response carried no download URL".to_string())
            })?;

        info!(
            repository = %self.repository,
            path = %remote_path,
            size_bytes = bytes.len(),
            "Artifact published"
        );
        if let Err(e) = fs::remove_file(local_path) {
            warn!(
                path = %local_path.display(),
                error = %e,
                "Published but could not remove local copy"
            );
        }
        Ok(download_url)
    }
}

/// `<prefix>/<YYYYmmdd_HHMMSS>_<6 hex>_<file_name>`, or without the prefix when empty.
pub fn unique_remote_path<R: Rng>(
    prefix: &str,
    file_name: &str,
    now: DateTime<Utc>,
    rng: &mut R,
) -> String {
    let suffix: u32 = rng.gen_range(0..0x100_0000);
    let name = format!("{}_{:06x}_{}", now.format("%Y%m%d_%H%M%S"), suffix, file_name);
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}
