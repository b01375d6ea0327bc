//! Context acquisition for AI pull-request review.
//!
//! This crate is the pipeline that turns "a pull request against a
//! repository" into the two things a review generator needs:
//!
//! 1) **Step 1: Pull-request resolution**
//!    - Fetch PR metadata to obtain the head branch
//!    - Fetch per-file unified-diff patches (the prioritized-file seed)
//!
//! 2) **Step 2: Codebase indexing**
//!    - Traverse candidate source roots through the content provider
//!    - Fetch file contents in bounded concurrent windows (with retry and
//!      rate-limit cooperation)
//!    - Scan declarations/imports per file and build the dependency graph
//!    - Order files prioritized → related (one import hop) → remaining
//!
//! 3) **Step 3: Position mapping** (on demand, per comment)
//!    - Translate a reviewer's new-file line number into the patch-relative
//!      position the platform wants for inline anchoring
//!
//! Prompt assembly, LLM calls and comment publishing are downstream
//! consumers and live outside this crate. The pipeline uses `tracing` for
//! debug logging and avoids `async-trait` and heap trait objects; provider
//! dispatch is a plain generic over [`ContentProvider`].

pub mod diff;
pub mod errors;
pub mod git_providers;
pub mod index;
pub mod retry;
pub mod scanner;

use std::time::Instant;

use tracing::debug;

use errors::CtxResult;
use git_providers::{ContentProvider, PatchMap, PullRequestInfo, RepoId};
use retry::with_retry;

/// Everything the review generator consumes for one pull request.
#[derive(Debug, Clone)]
pub struct ReviewContext {
    pub pull_request: PullRequestInfo,
    /// Changed filename → unified-diff patch text; feed these back into
    /// [`diff::calculate_diff_position`] when anchoring inline comments.
    pub patches: PatchMap,
    pub index: IndexedCodebase,
}

/// Runs steps 1–2 for a single pull request and returns the full context.
///
/// Indexing runs in the tolerant mode: a repository with zero eligible
/// source files produces an empty index and review proceeds from the PR
/// diff alone. Call [`index::index_codebase`] directly for the strict
/// behavior.
pub async fn build_review_context<P: ContentProvider>(
    provider: &P,
    repo: &RepoId,
    pr_number: u64,
    policy: &RetryPolicy,
) -> CtxResult<ReviewContext> {
    let t0 = Instant::now();

    debug!(owner = %repo.owner, repo = %repo.repo, pr_number, "step1: fetch pull request metadata");
    let pull_request = with_retry(policy, "get_pull_request", || {
        provider.get_pull_request(repo, pr_number)
    })
    .await?;
    debug!(
        head = %pull_request.head_branch,
        head_sha = %pull_request.head_sha,
        "step1: pull request resolved"
    );

    debug!("step1: fetch changed-file patches");
    let patches = with_retry(policy, "get_changed_file_patches", || {
        provider.get_changed_file_patches(repo, pr_number)
    })
    .await?;
    debug!(changed_files = patches.len(), "step1: patches fetched");

    let prioritized: Vec<String> = patches.keys().cloned().collect();

    debug!("step2: index codebase at PR head");
    let index = index::try_index_codebase(
        provider,
        repo,
        &pull_request.head_branch,
        &prioritized,
        policy,
    )
    .await?;
    debug!(
        files = index.files.len(),
        import_targets = index.dependencies.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "step2: context ready"
    );

    Ok(ReviewContext {
        pull_request,
        patches,
        index,
    })
}

// -----------------------------------------------------------------------------
// Convenience re-exports for downstream users
// -----------------------------------------------------------------------------

pub use diff::calculate_diff_position;
pub use errors::{Error, IndexError, ProviderError};
pub use git_providers::{GitHubClient, ProviderConfig, RepoEntry};
pub use index::{DependencyGraph, IndexedCodebase, SourceFile, index_codebase, try_index_codebase};
pub use retry::{RateLimitHook, RetryPolicy};
pub use scanner::{
    Declaration, DeclarationKind, LineSpan, extract_declarations, extract_imports,
    resolve_import_path,
};
