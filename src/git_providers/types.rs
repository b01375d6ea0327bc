//! Provider-agnostic data model for repository content and pull requests.
//!
//! These types are the normalized output of the provider layer and the
//! inputs of the indexing stage; nothing in them is GitHub-specific.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository coordinates inside a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

/// Kind of a directory entry returned by a listing call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks, submodules and anything else we never descend into.
    Other,
}

/// One entry of a repository directory listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoEntry {
    pub name: String,
    /// Repo-relative path, no leading slash.
    pub path: String,
    pub kind: EntryKind,
}

/// Pull request metadata needed to drive context acquisition.
///
/// `head_branch` is the ref whose tree gets indexed; the rest is carried
/// for logging and downstream attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub number: u64,
    pub title: String,
    pub head_branch: String,
    pub head_sha: String,
    pub base_branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Changed filename → unified-diff patch text for one pull request.
///
/// Files without a textual patch (binary, too large) are absent from the
/// map; they can never anchor an inline comment anyway.
pub type PatchMap = BTreeMap<String, String>;
