use crate::config::NETWORK_TIMEOUT;
use crate::error::{InstallError, Result};
use crate::platform::Architecture;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

const GITHUB_API_BASE: &str = "https://api.github.com";

/// Tag used when the release metadata parses but carries no usable tag.
/// Advisory only: callers must not treat it as a real version.
pub const FALLBACK_TAG: &str = "latest";

/// One downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub download_url: String,
}

/// Latest-release metadata, fetched fresh each run and never cached.
#[derive(Debug, Clone)]
pub struct Release {
    pub tag: String,
    pub assets: Vec<Asset>,
}

/// Narrow seam over the release-metadata API so the pipeline can be tested
/// without the network and is insulated from upstream JSON-shape drift.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn latest_release(&self, repo: &str) -> Result<Release>;
}

pub struct GitHubReleases {
    client: Client,
    api_base: String,
}

impl GitHubReleases {
    pub fn new() -> Self {
        Self::with_base(GITHUB_API_BASE.to_string())
    }

    /// Point the client at a different API root. Test use.
    pub fn with_base(api_base: String) -> Self {
        Self {
            client: Client::builder()
                .user_agent(concat!(
                    env!("CARGO_PKG_NAME"),
                    "/",
                    env!("CARGO_PKG_VERSION")
                ))
                .timeout(NETWORK_TIMEOUT)
                .build()
                .expect("reqwest client"),
            api_base,
        }
    }

    fn parse_release(repo: &str, body: Value) -> Result<Release> {
        if !body.is_object() {
            return Err(InstallError::MalformedRelease {
                repo: repo.to_string(),
                message: "response is not a JSON object".to_string(),
            });
        }

        // A missing tag degrades to the "latest" marker; missing assets do
        // not, since without them nothing can be installed.
        let tag = match body.get("tag_name").and_then(Value::as_str) {
            Some(tag) if !tag.is_empty() => tag.to_string(),
            _ => {
                warn!(
                    "Release metadata for {} has no tag_name; falling back to \"{}\"",
                    repo, FALLBACK_TAG
                );
                FALLBACK_TAG.to_string()
            }
        };

        let raw_assets = body
            .get("assets")
            .and_then(Value::as_array)
            .ok_or_else(|| InstallError::MalformedRelease {
                repo: repo.to_string(),
                message: "missing assets list".to_string(),
            })?;

        let mut assets = Vec::with_capacity(raw_assets.len());
        for raw in raw_assets {
            let name = raw.get("name").and_then(Value::as_str);
            let url = raw.get("browser_download_url").and_then(Value::as_str);
            match (name, url) {
                (Some(name), Some(url)) => assets.push(Asset {
                    name: name.to_string(),
                    download_url: url.to_string(),
                }),
                _ => warn!("Skipping release asset with missing name or URL in {}", repo),
            }
        }

        Ok(Release { tag, assets })
    }
}

impl Default for GitHubReleases {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleases {
    async fn latest_release(&self, repo: &str) -> Result<Release> {
        let url = format!("{}/repos/{}/releases/latest", self.api_base, repo);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| InstallError::DownloadFailed {
                url: url.clone(),
                source: e,
            })?;

        if response.status().as_u16() == 404 {
            return Err(InstallError::ReleaseNotFound(repo.to_string()));
        }
        if !response.status().is_success() {
            return Err(InstallError::HttpStatus {
                url,
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await?;
        Self::parse_release(repo, body)
    }
}

/// Candidate asset names in priority order: tag-qualified, bare-version
/// qualified, os-and-arch only, bare name. When the tag is the "latest"
/// fallback the version-qualified forms are skipped outright, since a
/// literal "latest" can never appear in a real versioned asset name.
pub fn asset_candidates(base: &str, tag: &str, arch: Architecture) -> Vec<String> {
    let mut candidates = Vec::new();

    if tag != FALLBACK_TAG {
        candidates.push(format!("{}_{}_linux_{}", base, tag, arch));
        let version = tag.trim_start_matches('v');
        if version != tag {
            candidates.push(format!("{}_{}_linux_{}", base, version, arch));
        }
    }

    candidates.push(format!("{}-linux-{}", base, arch));
    candidates.push(base.to_string());
    candidates
}

/// First *pattern* that matches any asset wins; pattern priority beats asset
/// list order. Surfaces the available names on failure for diagnosis.
pub fn select_asset<'a>(
    release: &'a Release,
    patterns: &[String],
    dependency: &str,
) -> Result<&'a Asset> {
    for pattern in patterns {
        if let Some(asset) = release.assets.iter().find(|a| &a.name == pattern) {
            return Ok(asset);
        }
    }

    Err(InstallError::NoMatchingAsset {
        dependency: dependency.to_string(),
        available: release.assets.iter().map(|a| a.name.clone()).collect(),
    })
}
