//! Codebase indexing for review context.
//!
//! High-level flow:
//! 1) Traverse candidate root directories via the content provider;
//! 2) Keep eligible source files (drop vendored/build dirs, `.d.ts`);
//! 3) Partition into prioritized (changed by the PR), related (one import
//!    hop away from a prioritized file) and remaining (capped);
//! 4) Fetch contents in fixed windows of concurrent calls, windows strictly
//!    sequential;
//! 5) Scan each fetched file and register its imports into the dependency
//!    graph.
//!
//! The fetch order (prioritized, related, remaining) is what decides which
//! files fit the downstream prompt budget, so it is preserved in the
//! resulting file list. Graph and file-list writes happen only between
//! fetch windows, on the single orchestrating flow.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{CtxResult, IndexError};
use crate::git_providers::{ContentProvider, EntryKind, RepoId};
use crate::retry::{RetryPolicy, with_retry};
use crate::scanner::{Declaration, extract_declarations, extract_imports};

/// Roots tried during traversal; missing ones are silently skipped.
const CANDIDATE_ROOTS: &[&str] = &["", "src", "lib", "app"];

/// Extensions accepted as reviewable source.
const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

/// Directories never descended into.
const EXCLUDED_DIRS: &[&str] = &["node_modules", "dist", "build", "out", "vendor", "coverage"];

/// Concurrent content fetches per window.
const FETCH_BATCH_SIZE: usize = 10;

/// Cap on files indexed beyond the prioritized/related sets.
const MAX_REMAINING_FILES: usize = 100;

/// One scanned source file of the indexed codebase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceFile {
    /// Repo-relative path; unique key within one index.
    pub path: String,
    pub content: String,
    pub declarations: Vec<Declaration>,
    /// Resolved import targets, statement order, de-duplicated.
    pub import_targets: Vec<String>,
}

/// Inverse index: import target → files referencing it, in fetch order.
pub type DependencyGraph = BTreeMap<String, Vec<String>>;

/// The structured review context produced by one indexing pass.
///
/// Constructed fresh per review request and read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexedCodebase {
    /// Files in fetch order: prioritized, then related, then remaining.
    pub files: Vec<SourceFile>,
    pub dependencies: DependencyGraph,
    /// File path → its import targets.
    pub imports: BTreeMap<String, Vec<String>>,
}

/// Indexes the repository at `branch`, seeding from the changed-file list.
///
/// Strict mode: a repository-wide traversal that yields zero eligible files
/// raises [`IndexError::NoEligibleFiles`] because review cannot proceed
/// with no context at all. Use [`try_index_codebase`] for the tolerant
/// variant.
pub async fn index_codebase<P: ContentProvider>(
    provider: &P,
    repo: &RepoId,
    branch: &str,
    prioritized_files: &[String],
    policy: &RetryPolicy,
) -> CtxResult<IndexedCodebase> {
    let candidates = collect_candidates(provider, repo, branch, policy).await?;
    if candidates.is_empty() {
        return Err(IndexError::NoEligibleFiles {
            owner: repo.owner.clone(),
            repo: repo.repo.clone(),
            branch: branch.to_string(),
        }
        .into());
    }
    build_index(provider, repo, branch, prioritized_files, policy, candidates).await
}

/// Tolerant variant: an empty repository indexes to an empty codebase so a
/// caller can still review from the PR diff alone.
pub async fn try_index_codebase<P: ContentProvider>(
    provider: &P,
    repo: &RepoId,
    branch: &str,
    prioritized_files: &[String],
    policy: &RetryPolicy,
) -> CtxResult<IndexedCodebase> {
    let candidates = collect_candidates(provider, repo, branch, policy).await?;
    if candidates.is_empty() {
        warn!(
            owner = %repo.owner,
            repo = %repo.repo,
            branch,
            "no eligible source files; proceeding with change-only context"
        );
        return Ok(IndexedCodebase::default());
    }
    build_index(provider, repo, branch, prioritized_files, policy, candidates).await
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Breadth-first traversal over the candidate roots, returning eligible
/// source paths in listing order. Directories are pruned by name; a root
/// that does not exist lists as empty and drops out silently.
async fn collect_candidates<P: ContentProvider>(
    provider: &P,
    repo: &RepoId,
    branch: &str,
    policy: &RetryPolicy,
) -> CtxResult<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    let mut seen_files: BTreeSet<String> = BTreeSet::new();
    let mut visited_dirs: BTreeSet<String> = BTreeSet::new();

    for root in CANDIDATE_ROOTS {
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back((*root).to_string());

        while let Some(dir) = queue.pop_front() {
            if !visited_dirs.insert(dir.clone()) {
                continue;
            }
            let entries = with_retry(policy, "list_directory", || {
                provider.list_directory(repo, &dir, branch)
            })
            .await?;

            for entry in entries {
                match entry.kind {
                    EntryKind::Dir => {
                        if !is_excluded_dir(&entry.name) {
                            queue.push_back(entry.path);
                        }
                    }
                    EntryKind::File => {
                        if is_eligible_source(&entry.path) && seen_files.insert(entry.path.clone())
                        {
                            out.push(entry.path);
                        }
                    }
                    EntryKind::Other => {}
                }
            }
        }
    }

    Ok(out)
}

fn is_excluded_dir(name: &str) -> bool {
    name.starts_with('.') || EXCLUDED_DIRS.contains(&name)
}

/// Source files only: accepted extension, no declaration-only stubs and no
/// generated bundles.
fn is_eligible_source(path: &str) -> bool {
    if path.ends_with(".d.ts") || path.ends_with(".min.js") {
        return false;
    }
    match path.rsplit_once('.') {
        Some((_, ext)) => SOURCE_EXTENSIONS.contains(&ext),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Selection and orchestration
// ---------------------------------------------------------------------------

async fn build_index<P: ContentProvider>(
    provider: &P,
    repo: &RepoId,
    branch: &str,
    prioritized_files: &[String],
    policy: &RetryPolicy,
    candidates: Vec<String>,
) -> CtxResult<IndexedCodebase> {
    let t0 = Instant::now();
    debug!(
        owner = %repo.owner,
        repo = %repo.repo,
        branch,
        candidates = candidates.len(),
        "indexing: candidates collected"
    );

    // 1) Prioritized: candidates matching the changed-file list.
    let prioritized: Vec<String> = candidates
        .iter()
        .filter(|c| is_prioritized(c, prioritized_files))
        .cloned()
        .collect();

    let mut files = fetch_and_scan(provider, repo, branch, policy, &prioritized).await;

    // 2) Related: one import hop from the prioritized files, resolved
    //    against the candidate list. Deliberately not transitive.
    let mut chosen: BTreeSet<String> = prioritized.iter().cloned().collect();
    let mut related: Vec<String> = Vec::new();
    for file in &files {
        for target in &file.import_targets {
            if let Some(path) = resolve_relative_target(&file.path, target, &candidates) {
                if !chosen.contains(&path) {
                    chosen.insert(path.clone());
                    related.push(path);
                }
            }
        }
    }
    files.extend(fetch_and_scan(provider, repo, branch, policy, &related).await);

    // 3) Remaining: everything else, capped.
    let mut remaining: Vec<String> = candidates
        .iter()
        .filter(|c| !chosen.contains(*c))
        .cloned()
        .collect();
    remaining.truncate(MAX_REMAINING_FILES);
    files.extend(fetch_and_scan(provider, repo, branch, policy, &remaining).await);

    // 4) Register imports into the dependency graph, append-only.
    let mut dependencies = DependencyGraph::new();
    let mut imports: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for file in &files {
        for target in &file.import_targets {
            let referencing = dependencies.entry(target.clone()).or_default();
            if !referencing.contains(&file.path) {
                referencing.push(file.path.clone());
            }
        }
        imports.insert(file.path.clone(), file.import_targets.clone());
    }

    debug!(
        files = files.len(),
        prioritized = prioritized.len(),
        related = related.len(),
        remaining = remaining.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "indexing: done"
    );

    Ok(IndexedCodebase {
        files,
        dependencies,
        imports,
    })
}

/// Changed-file lists arrive repo-root-relative; accept an exact match or a
/// suffix match on a path-segment boundary.
fn is_prioritized(candidate: &str, changed: &[String]) -> bool {
    changed.iter().any(|c| {
        candidate == c.as_str()
            || (candidate.ends_with(c.as_str())
                && candidate.as_bytes()[candidate.len() - c.len() - 1] == b'/')
    })
}

/// Fetches and scans `paths` in fixed windows of concurrent calls.
///
/// Windows run strictly one after another; inside a window every fetch
/// settles independently, so one failure drops only its own file. Results
/// are matched back to paths by input position, keeping the association
/// deterministic even though fetches race.
async fn fetch_and_scan<P: ContentProvider>(
    provider: &P,
    repo: &RepoId,
    branch: &str,
    policy: &RetryPolicy,
    paths: &[String],
) -> Vec<SourceFile> {
    let mut files = Vec::with_capacity(paths.len());

    for window in paths.chunks(FETCH_BATCH_SIZE) {
        let fetches = window.iter().map(|path| {
            with_retry(policy, "get_file_content", move || {
                provider.get_file_content(repo, path, branch)
            })
        });
        let settled = join_all(fetches).await;

        for (path, outcome) in window.iter().zip(settled) {
            match outcome {
                Ok(Some(content)) => {
                    let declarations = extract_declarations(&content);
                    let import_targets = extract_imports(&content);
                    files.push(SourceFile {
                        path: path.clone(),
                        content,
                        declarations,
                        import_targets,
                    });
                }
                Ok(None) => {
                    debug!(path = %path, "file absent at ref, skipped");
                }
                Err(error) => {
                    warn!(path = %path, error = %error, "content fetch failed, file dropped from index");
                }
            }
        }
    }

    files
}

// ---------------------------------------------------------------------------
// Import-target resolution against the candidate list
// ---------------------------------------------------------------------------

/// Maps a relative import target back to a candidate file path, completing
/// the extension or directory index the way a bundler would. Package
/// imports return `None`: they live outside the repository tree.
fn resolve_relative_target(
    importing_file: &str,
    target: &str,
    candidates: &[String],
) -> Option<String> {
    if !target.starts_with('.') {
        return None;
    }
    let base_dir = importing_file
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or("");
    let joined = normalize_path(&format!("{base_dir}/{target}"));
    if joined.is_empty() {
        return None;
    }

    if candidates.iter().any(|c| c == &joined) {
        return Some(joined);
    }
    for ext in SOURCE_EXTENSIONS {
        let with_ext = format!("{joined}.{ext}");
        if candidates.iter().any(|c| c == &with_ext) {
            return Some(with_ext);
        }
    }
    for ext in SOURCE_EXTENSIONS {
        let index_file = format!("{joined}/index.{ext}");
        if candidates.iter().any(|c| c == &index_file) {
            return Some(index_file);
        }
    }
    None
}

/// Collapses `.` and `..` segments; never escapes the repository root.
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_filter() {
        assert!(is_eligible_source("src/a.ts"));
        assert!(is_eligible_source("src/ui/view.tsx"));
        assert!(is_eligible_source("lib/x.jsx"));
        assert!(!is_eligible_source("src/types.d.ts"));
        assert!(!is_eligible_source("dist/bundle.min.js"));
        assert!(!is_eligible_source("README.md"));
        assert!(!is_eligible_source("Makefile"));
    }

    #[test]
    fn excluded_dirs() {
        assert!(is_excluded_dir("node_modules"));
        assert!(is_excluded_dir("dist"));
        assert!(is_excluded_dir(".git"));
        assert!(!is_excluded_dir("src"));
        assert!(!is_excluded_dir("distribution"));
    }

    #[test]
    fn prioritized_matching() {
        let changed = vec!["src/a.ts".to_string()];
        assert!(is_prioritized("src/a.ts", &changed));
        assert!(is_prioritized("packages/web/src/a.ts", &changed));
        assert!(!is_prioritized("src/ab.ts", &changed));
        assert!(!is_prioritized("xsrc/a.ts", &changed));
    }

    #[test]
    fn relative_target_resolution() {
        let candidates = vec![
            "src/a.ts".to_string(),
            "src/b.ts".to_string(),
            "src/util/index.ts".to_string(),
        ];
        assert_eq!(
            resolve_relative_target("src/a.ts", "./b", &candidates),
            Some("src/b.ts".to_string())
        );
        assert_eq!(
            resolve_relative_target("src/a.ts", "./util", &candidates),
            Some("src/util/index.ts".to_string())
        );
        assert_eq!(
            resolve_relative_target("src/util/index.ts", "../b", &candidates),
            Some("src/b.ts".to_string())
        );
        assert_eq!(resolve_relative_target("src/a.ts", "lodash", &candidates), None);
        assert_eq!(resolve_relative_target("src/a.ts", "./missing", &candidates), None);
    }

    #[test]
    fn normalization_never_escapes_root() {
        assert_eq!(normalize_path("src/./a.ts"), "src/a.ts");
        assert_eq!(normalize_path("src/sub/../b"), "src/b");
        assert_eq!(normalize_path("../../etc/passwd"), "etc/passwd");
    }
}
