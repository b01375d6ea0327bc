//! Provider seam for remote repository content.
//!
//! The indexing pipeline reads the repository exclusively through the
//! [`ContentProvider`] trait: one directory-listing call, one raw-content
//! call, and two pull-request calls. The GitHub client implements it for
//! production; tests drive the same pipeline over an in-memory tree.
//!
//! Absence is not an error at this seam: a missing directory lists as
//! empty and a missing file reads as `None`. Only transport and protocol
//! failures surface as errors (and get retried upstream).

pub mod github;
pub mod types;

pub use github::GitHubClient;
pub use types::*;

use crate::errors::CtxResult;

/// Runtime configuration for a provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API base, e.g. "https://api.github.com".
    pub base_api: String,
    /// Access token for the provider (PAT or app token).
    pub token: String,
}

/// Read-only access to repository content and pull-request data.
#[allow(async_fn_in_trait)]
pub trait ContentProvider {
    /// List one directory level at `ref_name`. Missing directory → empty.
    async fn list_directory(
        &self,
        repo: &RepoId,
        path: &str,
        ref_name: &str,
    ) -> CtxResult<Vec<RepoEntry>>;

    /// Fetch the full text of one file at `ref_name`. Missing file → `None`.
    async fn get_file_content(
        &self,
        repo: &RepoId,
        path: &str,
        ref_name: &str,
    ) -> CtxResult<Option<String>>;

    /// Fetch the changed-file patches of a pull request.
    async fn get_changed_file_patches(&self, repo: &RepoId, number: u64) -> CtxResult<PatchMap>;

    /// Fetch pull-request metadata (head branch/SHA in particular).
    async fn get_pull_request(&self, repo: &RepoId, number: u64) -> CtxResult<PullRequestInfo>;
}
