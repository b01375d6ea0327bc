//! End-to-end indexing over an in-memory content provider: selection
//! ordering, dependency graph, failure semantics and the tolerant/strict
//! split, without any network.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use pr_context_engine::errors::{Error, IndexError, ProviderError};
use pr_context_engine::git_providers::{
    ContentProvider, EntryKind, PatchMap, PullRequestInfo, RepoEntry, RepoId,
};
use pr_context_engine::retry::RetryPolicy;
use pr_context_engine::{build_review_context, calculate_diff_position};
use pr_context_engine::{index_codebase, try_index_codebase};

/// Provider backed by a path → content map; directory listings are derived
/// from the keys, so the tree always matches the files.
struct MockProvider {
    files: BTreeMap<String, String>,
    fail_paths: BTreeSet<String>,
    patches: PatchMap,
}

impl MockProvider {
    fn new(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
            fail_paths: BTreeSet::new(),
            patches: PatchMap::new(),
        }
    }

    fn failing_on(mut self, path: &str) -> Self {
        self.fail_paths.insert(path.to_string());
        self
    }

    fn with_patch(mut self, path: &str, patch: &str) -> Self {
        self.patches.insert(path.to_string(), patch.to_string());
        self
    }
}

impl ContentProvider for MockProvider {
    async fn list_directory(
        &self,
        _repo: &RepoId,
        path: &str,
        _ref_name: &str,
    ) -> Result<Vec<RepoEntry>, Error> {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        let mut seen_dirs = BTreeSet::new();
        let mut out = Vec::new();
        for file in self.files.keys() {
            let Some(rest) = file.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    if seen_dirs.insert(dir.to_string()) {
                        out.push(RepoEntry {
                            name: dir.to_string(),
                            path: format!("{prefix}{dir}"),
                            kind: EntryKind::Dir,
                        });
                    }
                }
                None => {
                    out.push(RepoEntry {
                        name: rest.to_string(),
                        path: file.clone(),
                        kind: EntryKind::File,
                    });
                }
            }
        }
        Ok(out)
    }

    async fn get_file_content(
        &self,
        _repo: &RepoId,
        path: &str,
        _ref_name: &str,
    ) -> Result<Option<String>, Error> {
        if self.fail_paths.contains(path) {
            return Err(Error::Provider(ProviderError::Server(500)));
        }
        Ok(self.files.get(path).cloned())
    }

    async fn get_changed_file_patches(
        &self,
        _repo: &RepoId,
        _number: u64,
    ) -> Result<PatchMap, Error> {
        Ok(self.patches.clone())
    }

    async fn get_pull_request(
        &self,
        _repo: &RepoId,
        number: u64,
    ) -> Result<PullRequestInfo, Error> {
        Ok(PullRequestInfo {
            number,
            title: "test pr".to_string(),
            head_branch: "feature".to_string(),
            head_sha: "abc123".to_string(),
            base_branch: "main".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }
}

fn sample_repo() -> MockProvider {
    MockProvider::new(&[
        ("README.md", "# sample"),
        ("node_modules/leftpad/index.js", "module.exports = x => x;"),
        (
            "src/a.ts",
            "import { b } from './b';\nimport fs from 'fs';\n\nexport function run() {\n  return b();\n}\n",
        ),
        ("src/b.ts", "export const b = () => 2;\n"),
        ("src/types.d.ts", "export declare const shadow: number;\n"),
        ("src/util/helpers.ts", "export function helper() {\n  return 1;\n}\n"),
        ("src/zz.ts", "export const zz = 1;\n"),
    ])
}

fn repo_id() -> RepoId {
    RepoId::new("acme", "widget")
}

#[tokio::test]
async fn fetch_order_is_prioritized_then_related_then_remaining() {
    let provider = sample_repo();
    let policy = RetryPolicy::instant();
    let prioritized = vec!["src/a.ts".to_string()];

    let index = index_codebase(&provider, &repo_id(), "main", &prioritized, &policy)
        .await
        .unwrap();

    let order: Vec<&str> = index.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        order,
        vec!["src/a.ts", "src/b.ts", "src/zz.ts", "src/util/helpers.ts"]
    );
}

#[tokio::test]
async fn dependency_graph_and_imports_are_registered() {
    let provider = sample_repo();
    let policy = RetryPolicy::instant();
    let prioritized = vec!["src/a.ts".to_string()];

    let index = index_codebase(&provider, &repo_id(), "main", &prioritized, &policy)
        .await
        .unwrap();

    assert_eq!(index.dependencies["./b"], vec!["src/a.ts".to_string()]);
    assert_eq!(index.dependencies["fs"], vec!["src/a.ts".to_string()]);
    assert_eq!(
        index.imports["src/a.ts"],
        vec!["./b".to_string(), "fs".to_string()]
    );

    let a = &index.files[0];
    assert_eq!(a.declarations.len(), 1);
    assert_eq!(a.declarations[0].name, "run");
    assert!(a.declarations[0].exported);
}

#[tokio::test]
async fn vendored_and_declaration_files_never_enter_the_index() {
    let provider = sample_repo();
    let policy = RetryPolicy::instant();

    let index = index_codebase(&provider, &repo_id(), "main", &[], &policy)
        .await
        .unwrap();

    assert!(index.files.iter().all(|f| !f.path.contains("node_modules")));
    assert!(index.files.iter().all(|f| !f.path.ends_with(".d.ts")));
    assert!(index.files.iter().all(|f| !f.path.ends_with(".md")));
}

#[tokio::test]
async fn failed_fetch_drops_only_that_file() {
    let provider = sample_repo().failing_on("src/zz.ts");
    let policy = RetryPolicy::instant();
    let prioritized = vec!["src/a.ts".to_string()];

    let index = index_codebase(&provider, &repo_id(), "main", &prioritized, &policy)
        .await
        .unwrap();

    let paths: Vec<&str> = index.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["src/a.ts", "src/b.ts", "src/util/helpers.ts"]);
}

#[tokio::test]
async fn strict_mode_raises_on_empty_repository() {
    let provider = MockProvider::new(&[("README.md", "# only docs")]);
    let policy = RetryPolicy::instant();

    let err = index_codebase(&provider, &repo_id(), "main", &[], &policy)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Index(IndexError::NoEligibleFiles { .. })
    ));
}

#[tokio::test]
async fn tolerant_mode_returns_empty_index() {
    let provider = MockProvider::new(&[("README.md", "# only docs")]);
    let policy = RetryPolicy::instant();

    let index = try_index_codebase(&provider, &repo_id(), "main", &[], &policy)
        .await
        .unwrap();

    assert!(index.files.is_empty());
    assert!(index.dependencies.is_empty());
    assert!(index.imports.is_empty());
}

#[tokio::test]
async fn indexing_twice_is_idempotent() {
    let provider = sample_repo();
    let policy = RetryPolicy::instant();
    let prioritized = vec!["src/a.ts".to_string()];

    let first = index_codebase(&provider, &repo_id(), "main", &prioritized, &policy)
        .await
        .unwrap();
    let second = index_codebase(&provider, &repo_id(), "main", &prioritized, &policy)
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn remaining_files_are_capped_at_one_hundred() {
    let mut files: Vec<(String, String)> = Vec::new();
    for i in 0..120 {
        files.push((format!("src/gen{i:03}.ts"), format!("export const g{i} = {i};\n")));
    }
    let borrowed: Vec<(&str, &str)> = files
        .iter()
        .map(|(p, c)| (p.as_str(), c.as_str()))
        .collect();
    let provider = MockProvider::new(&borrowed);
    let policy = RetryPolicy::instant();

    let index = index_codebase(&provider, &repo_id(), "main", &[], &policy)
        .await
        .unwrap();

    assert_eq!(index.files.len(), 100);
}

#[tokio::test]
async fn review_context_seeds_prioritized_files_from_patches() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pr_context_engine=debug")
        .with_test_writer()
        .try_init();

    let patch = "\
@@ -1,2 +1,3 @@
 import { b } from './b';
+import fs from 'fs';
 export function run() {}";
    let provider = sample_repo().with_patch("src/a.ts", patch);
    let policy = RetryPolicy::instant();

    let ctx = build_review_context(&provider, &repo_id(), 7, &policy)
        .await
        .unwrap();

    assert_eq!(ctx.pull_request.number, 7);
    assert_eq!(ctx.pull_request.head_branch, "feature");
    assert_eq!(ctx.patches.len(), 1);
    // prioritized seed came from the patch map
    assert_eq!(ctx.index.files[0].path, "src/a.ts");

    // the added import line anchors at patch position 3
    let position = calculate_diff_position(&ctx.patches["src/a.ts"], 2);
    assert_eq!(position, Some(3));
}
