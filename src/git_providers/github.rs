//! GitHub provider (REST v3) for repository content and PR data.
//!
//! Endpoints used:
//! - GET /repos/{owner}/{repo}/contents/{path}?ref=…        (listing + raw content)
//! - GET /repos/{owner}/{repo}/pulls/{number}               (metadata)
//! - GET /repos/{owner}/{repo}/pulls/{number}/files         (field "patch" is unified diff)
//!
//! Raw file text is requested with `Accept: application/vnd.github.raw`,
//! which skips the base64 JSON envelope of the contents API entirely.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

use crate::errors::{CtxResult, ProviderError};
use crate::git_providers::types::{EntryKind, PatchMap, PullRequestInfo, RepoEntry, RepoId};
use crate::git_providers::{ContentProvider, ProviderConfig};

const PER_PAGE: usize = 100;

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_api: String, // "https://api.github.com"
    token: String,
}

impl GitHubClient {
    /// Constructs a GitHub client with a shared reqwest instance and auth token.
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api,
            token,
        }
    }

    /// Constructs a client (own reqwest instance) from generic config.
    pub fn from_config(cfg: ProviderConfig) -> CtxResult<Self> {
        let http = Client::builder()
            .user_agent("pr-context-engine/0.1")
            .build()?;
        Ok(Self::new(http, cfg.base_api, cfg.token))
    }

    fn get(&self, url: String) -> RequestBuilder {
        self.http
            .get(url)
            .bearer_auth(&self.token)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    fn contents_url(&self, repo: &RepoId, path: &str, ref_name: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}?ref={}",
            self.base_api,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.repo),
            encode_path(path),
            urlencoding::encode(ref_name)
        )
    }
}

impl ContentProvider for GitHubClient {
    /// Lists one directory level. A missing path is an empty listing, and a
    /// path that turns out to be a file (object response) lists as empty too.
    async fn list_directory(
        &self,
        repo: &RepoId,
        path: &str,
        ref_name: &str,
    ) -> CtxResult<Vec<RepoEntry>> {
        let resp = self
            .get(self.contents_url(repo, path, ref_name))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(error_from_response(resp.status(), resp.headers()).into());
        }

        let body: serde_json::Value = resp.json().await?;
        let Some(raw) = body.as_array() else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::with_capacity(raw.len());
        for item in raw {
            let entry: GitHubContentEntry = serde_json::from_value(item.clone())
                .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
            entries.push(RepoEntry {
                name: entry.name,
                path: entry.path,
                kind: match entry.kind.as_str() {
                    "file" => EntryKind::File,
                    "dir" => EntryKind::Dir,
                    _ => EntryKind::Other,
                },
            });
        }
        Ok(entries)
    }

    /// Fetches raw file text at `ref_name`; `None` when absent at that ref.
    async fn get_file_content(
        &self,
        repo: &RepoId,
        path: &str,
        ref_name: &str,
    ) -> CtxResult<Option<String>> {
        let resp = self
            .get(self.contents_url(repo, path, ref_name))
            .header("Accept", "application/vnd.github.raw")
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(error_from_response(resp.status(), resp.headers()).into());
        }

        Ok(Some(resp.text().await?))
    }

    /// Collects filename → patch for every changed file carrying a textual
    /// patch, paging through the listing at 100 files per page.
    async fn get_changed_file_patches(&self, repo: &RepoId, number: u64) -> CtxResult<PatchMap> {
        let mut patches = PatchMap::new();
        let mut page = 1usize;

        loop {
            let url = format!(
                "{}/repos/{}/{}/pulls/{}/files?per_page={}&page={}",
                self.base_api,
                urlencoding::encode(&repo.owner),
                urlencoding::encode(&repo.repo),
                number,
                PER_PAGE,
                page
            );
            let resp = self
                .get(url)
                .header("Accept", "application/vnd.github+json")
                .send()
                .await?;

            if !resp.status().is_success() {
                return Err(error_from_response(resp.status(), resp.headers()).into());
            }

            let files: Vec<GitHubPrFile> = resp.json().await?;
            let batch_len = files.len();
            for f in files {
                if let Some(patch) = f.patch {
                    patches.insert(f.filename, patch);
                }
            }
            if batch_len < PER_PAGE {
                return Ok(patches);
            }
            page += 1;
        }
    }

    /// Fetches PR metadata; `head_branch` is what the indexer needs.
    async fn get_pull_request(&self, repo: &RepoId, number: u64) -> CtxResult<PullRequestInfo> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.base_api,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.repo),
            number
        );
        let resp = self
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(error_from_response(resp.status(), resp.headers()).into());
        }

        let pull: GitHubPull = resp.json().await?;
        Ok(PullRequestInfo {
            number: pull.number,
            title: pull.title,
            head_branch: pull.head.branch,
            head_sha: pull.head.sha,
            base_branch: pull.base.branch,
            created_at: pull.created_at,
            updated_at: pull.updated_at,
        })
    }
}

/// Percent-encode a repo-relative path, keeping `/` separators intact.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Maps an unsuccessful response onto the typed provider error, reading the
/// rate-limit headers GitHub attaches to 403/429 answers.
fn error_from_response(status: StatusCode, headers: &HeaderMap) -> ProviderError {
    let retry_after = header_u64(headers, RETRY_AFTER.as_str());
    let remaining_zero = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "0")
        .unwrap_or(false);

    match status.as_u16() {
        401 => ProviderError::Unauthorized,
        403 | 429 if remaining_zero => ProviderError::RateLimited {
            retry_after_secs: retry_after.or_else(|| reset_delta_secs(headers)),
        },
        403 if retry_after.is_some() => ProviderError::SecondaryRateLimit {
            retry_after_secs: retry_after,
        },
        403 => ProviderError::Forbidden,
        404 => ProviderError::NotFound,
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after,
        },
        code @ 500..=599 => ProviderError::Server(code),
        code => ProviderError::HttpStatus(code),
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Seconds until the rate-limit window resets (`x-ratelimit-reset` is epoch).
fn reset_delta_secs(headers: &HeaderMap) -> Option<u64> {
    let reset: i64 = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())?;
    Some((reset - Utc::now().timestamp()).max(0) as u64)
}

/// --- GitHub response shapes (subset of fields we actually use) ---

#[derive(Debug, Deserialize)]
struct GitHubContentEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct GitHubPrFile {
    filename: String,
    #[serde(default)]
    patch: Option<String>, // absent for binary/too-large files
}

#[derive(Debug, Deserialize)]
struct GitHubPull {
    number: u64,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    head: GitHubPullRef,
    base: GitHubPullRef,
}

#[derive(Debug, Deserialize)]
struct GitHubPullRef {
    #[serde(rename = "ref")]
    branch: String,
    sha: String,
}
