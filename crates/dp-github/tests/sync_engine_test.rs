//! End-to-end behaviour of the documentation sync engine against an
//! in-memory repository host: branch derivation, directory placeholders,
//! create vs update, conflict handling, inline annotation, retries and
//! batches.

use std::sync::Arc;

use dp_core::config::SyncConfig;
use dp_core::types::{PullRequestResult, RepositoryRef, UpdateRequest};
use dp_github::memory::{blob_sha, HostCall, HostOp, MemoryHost};
use dp_github::planner::annotate_inline;
use dp_github::{DocSyncEngine, SyncError};

// ===========================================================================
// Test helpers
// ===========================================================================

fn repo() -> RepositoryRef {
    RepositoryRef::new("o", "r")
}

fn request(doc_location: &str, source_file: &str, docs: &str) -> UpdateRequest {
    UpdateRequest {
        repo: repo(),
        base_branch: "main".into(),
        doc_location: doc_location.into(),
        source_file: source_file.into(),
        documentation_content: docs.into(),
    }
}

fn engine(host: &Arc<MemoryHost>) -> DocSyncEngine {
    DocSyncEngine::new(host.connector(), &SyncConfig::default())
}

fn empty_repo() -> Arc<MemoryHost> {
    Arc::new(
        MemoryHost::new()
            .with_repo(&repo(), "main")
            .with_file(&repo(), "main", "src/foo.py", "def foo():\n    pass\n"),
    )
}

fn created_paths(host: &MemoryHost) -> Vec<String> {
    host.writes()
        .into_iter()
        .filter_map(|call| match call {
            HostCall::CreateFile { path, .. } => Some(path),
            _ => None,
        })
        .collect()
}

// ===========================================================================
// End-to-end
// ===========================================================================

#[tokio::test]
async fn standalone_doc_lands_on_new_branch_with_pull_request() {
    let host = empty_repo();
    let base_head = {
        use dp_github::host::RepositoryHost;
        host.branch_head(&repo(), "main").await.unwrap()
    };

    let result = engine(&host)
        .synchronize(&request("docs/foo.md", "src/foo.py", "# Foo\n..."))
        .await;

    let PullRequestResult::Success { pr_number, pr_url, .. } = &result else {
        panic!("expected success, got {result:?}");
    };
    assert_eq!(*pr_number, 1);
    assert_eq!(pr_url, "https://github.com/o/r/pull/1");

    let branch = "docpilot/docs-docs-foo.md";
    assert!(host.writes().contains(&HostCall::CreateBranch {
        branch: branch.into(),
        sha: base_head,
    }));
    assert_eq!(host.file(&repo(), branch, "docs/foo.md").as_deref(), Some("# Foo\n..."));
    assert_eq!(host.file(&repo(), "main", "docs/foo.md"), None);

    let pulls = host.pulls(&repo());
    assert_eq!(pulls.len(), 1);
    assert_eq!(pulls[0].head, branch);
    assert_eq!(pulls[0].base, "main");
    assert_eq!(pulls[0].title, "📝 Update documentation for src/foo.py");

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["type"], "pull_request");
}

#[tokio::test]
async fn new_file_commit_message_names_the_source() {
    let host = empty_repo();
    engine(&host)
        .synchronize(&request("docs/foo.md", "src/foo.py", "# Foo"))
        .await;

    let message = host
        .writes()
        .into_iter()
        .find_map(|call| match call {
            HostCall::CreateFile { path, message, .. } if path == "docs/foo.md" => Some(message),
            _ => None,
        })
        .expect("file created");
    assert_eq!(message, "📝 Add documentation for src/foo.py");
}

// ===========================================================================
// Idempotence
// ===========================================================================

#[tokio::test]
async fn repeated_request_reuses_branch_tree_and_pull_request() {
    let host = empty_repo();
    let engine = engine(&host);
    let req = request("docs/api/foo.md", "src/foo.py", "# Foo");

    let first = engine.synchronize(&req).await;
    let writes_after_first = host.writes().len();
    let second = engine.synchronize(&req).await;

    assert!(first.is_success());
    assert!(second.is_success(), "{second:?}");
    assert_eq!(first.pr_number(), second.pr_number());

    assert_eq!(host.pulls(&repo()).len(), 1);
    let working: Vec<_> = host
        .branch_names(&repo())
        .into_iter()
        .filter(|b| b.starts_with("docpilot/"))
        .collect();
    assert_eq!(working, vec!["docpilot/docs-docs-api-foo.md"]);

    // The second run only re-attempts the branch and the pull request.
    let second_writes: Vec<_> = host.writes().into_iter().skip(writes_after_first).collect();
    assert!(second_writes
        .iter()
        .all(|c| matches!(c, HostCall::CreateBranch { .. } | HostCall::CreatePull { .. })));
    assert_eq!(
        created_paths(&host),
        vec!["docs/.keep", "docs/api/.keep", "docs/api/foo.md"]
    );
}

#[tokio::test]
async fn resumes_after_crash_between_branch_and_pull_request() {
    let host = empty_repo();
    let engine = engine(&host);
    let req = request("docs/foo.md", "src/foo.py", "# Foo");

    host.inject_failure(HostOp::CreatePull, SyncError::upstream(Some(502), "bad gateway"));
    let first = engine.synchronize(&req).await;
    assert!(!first.is_success());
    assert!(host.pulls(&repo()).is_empty());

    let second = engine.synchronize(&req).await;
    assert!(second.is_success(), "{second:?}");
    assert_eq!(host.pulls(&repo()).len(), 1);
    // The file committed by the first attempt is not written again.
    assert_eq!(created_paths(&host), vec!["docs/.keep", "docs/foo.md"]);
}

// ===========================================================================
// Directory materialisation
// ===========================================================================

#[tokio::test]
async fn placeholders_for_every_missing_level() {
    let host = empty_repo();
    let result = engine(&host)
        .synchronize(&request("docs/api/v1/readme.md", "src/foo.py", "# API"))
        .await;
    assert!(result.is_success(), "{result:?}");

    assert_eq!(
        created_paths(&host),
        vec![
            "docs/.keep",
            "docs/api/.keep",
            "docs/api/v1/.keep",
            "docs/api/v1/readme.md",
        ]
    );
    let branch = "docpilot/docs-docs-api-v1-readme.md";
    assert_eq!(host.file(&repo(), branch, "docs/api/.keep").as_deref(), Some(""));

    let placeholder_message = host.writes().into_iter().find_map(|c| match c {
        HostCall::CreateFile { path, message, .. } if path == "docs/api/.keep" => Some(message),
        _ => None,
    });
    assert_eq!(placeholder_message.as_deref(), Some("📁 Create directory docs/api"));
}

#[tokio::test]
async fn only_missing_levels_get_placeholders() {
    let host = Arc::new(
        MemoryHost::new()
            .with_repo(&repo(), "main")
            .with_file(&repo(), "main", "docs/api/index.md", "existing"),
    );
    let result = engine(&host)
        .synchronize(&request("docs/api/v1/readme.md", "src/foo.py", "# API"))
        .await;
    assert!(result.is_success(), "{result:?}");

    assert_eq!(
        created_paths(&host),
        vec!["docs/api/v1/.keep", "docs/api/v1/readme.md"]
    );
}

#[tokio::test]
async fn placeholder_created_concurrently_is_not_an_error() {
    let host = empty_repo();
    host.inject_failure(
        HostOp::CreateFile,
        SyncError::Conflict {
            path: "docs/.keep".into(),
        },
    );

    let result = engine(&host)
        .synchronize(&request("docs/api/v1/readme.md", "src/foo.py", "# API"))
        .await;
    assert!(result.is_success(), "{result:?}");

    let branch = "docpilot/docs-docs-api-v1-readme.md";
    assert_eq!(
        host.paths(&repo(), branch),
        vec![
            "docs/api/.keep",
            "docs/api/v1/.keep",
            "docs/api/v1/readme.md",
            "src/foo.py",
        ]
    );
    assert_eq!(host.pulls(&repo()).len(), 1);
}

#[tokio::test]
async fn root_level_doc_needs_no_placeholder() {
    let host = empty_repo();
    let result = engine(&host)
        .synchronize(&request("FOO.md", "src/foo.py", "# Foo"))
        .await;
    assert!(result.is_success(), "{result:?}");
    assert_eq!(created_paths(&host), vec!["FOO.md"]);
}

#[tokio::test]
async fn file_in_place_of_directory_is_rejected() {
    let host = Arc::new(
        MemoryHost::new()
            .with_repo(&repo(), "main")
            .with_file(&repo(), "main", "docs", "not a directory"),
    );
    let result = engine(&host)
        .synchronize(&request("docs/foo.md", "src/foo.py", "# Foo"))
        .await;

    match result {
        PullRequestResult::Error { message } => assert!(message.contains("invalid target docs")),
        other => panic!("expected error, got {other:?}"),
    }
    assert!(created_paths(&host).is_empty());
    assert!(host.pulls(&repo()).is_empty());
}

#[tokio::test]
async fn custom_placeholder_and_prefix() {
    let host = empty_repo();
    let cfg = SyncConfig {
        branch_prefix: "bot".into(),
        placeholder_name: ".gitkeep".into(),
        ..SyncConfig::default()
    };
    let result = DocSyncEngine::new(host.connector(), &cfg)
        .synchronize(&request("docs/foo.md", "src/foo.py", "# Foo"))
        .await;
    assert!(result.is_success());
    assert!(host.has_branch(&repo(), "bot/docs-docs-foo.md"));
    assert_eq!(created_paths(&host), vec!["docs/.gitkeep", "docs/foo.md"]);
}

// ===========================================================================
// Update vs create
// ===========================================================================

#[tokio::test]
async fn existing_doc_is_updated_with_its_sha() {
    let host = Arc::new(
        MemoryHost::new()
            .with_repo(&repo(), "main")
            .with_file(&repo(), "main", "docs/foo.md", "old docs"),
    );
    let result = engine(&host)
        .synchronize(&request("docs/foo.md", "src/foo.py", "new docs"))
        .await;
    assert!(result.is_success(), "{result:?}");

    let updates: Vec<_> = host
        .writes()
        .into_iter()
        .filter_map(|c| match c {
            HostCall::UpdateFile { path, sha, message, .. } => Some((path, sha, message)),
            _ => None,
        })
        .collect();
    assert_eq!(
        updates,
        vec![(
            "docs/foo.md".to_string(),
            blob_sha(b"old docs"),
            "📝 Update documentation for src/foo.py".to_string(),
        )]
    );
    assert!(created_paths(&host).is_empty());
    assert_eq!(
        host.file(&repo(), "docpilot/docs-docs-foo.md", "docs/foo.md").as_deref(),
        Some("new docs")
    );
}

#[tokio::test]
async fn missing_doc_is_created_without_sha() {
    let host = empty_repo();
    engine(&host)
        .synchronize(&request("docs/foo.md", "src/foo.py", "# Foo"))
        .await;

    assert!(host
        .writes()
        .iter()
        .all(|c| !matches!(c, HostCall::UpdateFile { .. })));
    assert!(created_paths(&host).contains(&"docs/foo.md".to_string()));
}

// ===========================================================================
// Conflict detection
// ===========================================================================

#[tokio::test]
async fn concurrent_edit_is_a_conflict_and_nothing_is_written() {
    let host = Arc::new(
        MemoryHost::new()
            .with_repo(&repo(), "main")
            .with_file(&repo(), "main", "docs/foo.md", "v1"),
    );
    let branch = "docpilot/docs-docs-foo.md";
    host.edit_before_next_write(&repo(), branch, "docs/foo.md", "edited elsewhere");

    let result = engine(&host)
        .synchronize(&request("docs/foo.md", "src/foo.py", "v2"))
        .await;

    match &result {
        PullRequestResult::Error { message } => assert!(message.contains("conflict"), "{message}"),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(
        host.file(&repo(), branch, "docs/foo.md").as_deref(),
        Some("edited elsewhere")
    );
    assert!(host.pulls(&repo()).is_empty());
    // Exactly one write attempt, bound to the sha that was read.
    let updates: Vec<_> = host
        .writes()
        .into_iter()
        .filter(|c| matches!(c, HostCall::UpdateFile { .. }))
        .collect();
    assert_eq!(updates.len(), 1);
}

// ===========================================================================
// Inline vs standalone routing
// ===========================================================================

#[tokio::test]
async fn same_location_and_source_prepends_annotation() {
    let original = "def foo():\n    pass\n";
    let host = empty_repo();
    let result = engine(&host)
        .synchronize(&request("src/foo.py", "src/foo.py", "Does nothing."))
        .await;
    assert!(result.is_success(), "{result:?}");

    let branch = "docpilot/update-src-foo.py";
    let content = host.file(&repo(), branch, "src/foo.py").unwrap();
    assert_eq!(content, annotate_inline("Does nothing.", original));
    assert!(content.starts_with("\n# Documentation suggestions from DocPilot:\nDoes nothing.\n\n"));
    assert!(content.contains(original));

    // Source on the base branch is untouched.
    assert_eq!(host.file(&repo(), "main", "src/foo.py").as_deref(), Some(original));

    let pr = &host.pulls(&repo())[0];
    assert!(pr.body.contains("```\nDoes nothing.\n```"));
    assert!(created_paths(&host).is_empty());
}

#[tokio::test]
async fn inline_retry_does_not_annotate_twice() {
    let host = empty_repo();
    let engine = engine(&host);
    let req = request("src/foo.py", "src/foo.py", "Does nothing.");

    engine.synchronize(&req).await;
    let second = engine.synchronize(&req).await;
    assert!(second.is_success(), "{second:?}");

    let content = host
        .file(&repo(), "docpilot/update-src-foo.py", "src/foo.py")
        .unwrap();
    assert_eq!(content.matches("# Documentation suggestions from DocPilot:").count(), 1);
}

#[tokio::test]
async fn inline_on_missing_source_fails() {
    let host = empty_repo();
    let result = engine(&host)
        .synchronize(&request("src/missing.py", "src/missing.py", "docs"))
        .await;
    match result {
        PullRequestResult::Error { message } => assert!(message.contains("not found")),
        other => panic!("expected error, got {other:?}"),
    }
    assert!(created_paths(&host).is_empty());
}

#[tokio::test]
async fn different_location_routes_standalone() {
    let host = empty_repo();
    engine(&host)
        .synchronize(&request("docs/foo.md", "src/foo.py", "# Foo"))
        .await;
    assert!(host.has_branch(&repo(), "docpilot/docs-docs-foo.md"));
    assert!(!host.has_branch(&repo(), "docpilot/update-src-foo.py"));
}

// ===========================================================================
// Auth and failures
// ===========================================================================

#[tokio::test]
async fn missing_credentials_abort_before_any_write() {
    let host = empty_repo();
    let mut req = request("docs/foo.md", "src/foo.py", "# Foo");
    req.repo = RepositoryRef::new("o", "no-install");

    let result = engine(&host).synchronize(&req).await;
    match result {
        PullRequestResult::Error { message } => {
            assert!(message.contains("no usable GitHub credential"), "{message}")
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn branch_creation_failure_is_reported() {
    let host = empty_repo();
    host.inject_failure(HostOp::CreateBranch, SyncError::upstream(Some(403), "forbidden"));

    let result = engine(&host)
        .synchronize(&request("docs/foo.md", "src/foo.py", "# Foo"))
        .await;
    match result {
        PullRequestResult::Error { message } => {
            assert!(message.contains("failed to create branch docpilot/docs-docs-foo.md"))
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert!(created_paths(&host).is_empty());
}

// ===========================================================================
// Batches
// ===========================================================================

#[tokio::test]
async fn batch_continues_past_a_failure_and_keeps_order() {
    let host = empty_repo();
    let mut bad = request("docs/bar.md", "src/bar.py", "# Bar");
    bad.base_branch = "does-not-exist".into();

    let report = engine(&host)
        .synchronize_all(vec![
            request("docs/foo.md", "src/foo.py", "# Foo"),
            bad,
            request("src/foo.py", "src/foo.py", "Does nothing."),
        ])
        .await;

    assert_eq!(report.items.len(), 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert!(!report.run_id.is_empty());

    let locations: Vec<_> = report.items.iter().map(|i| i.doc_location.as_str()).collect();
    assert_eq!(locations, vec!["docs/foo.md", "docs/bar.md", "src/foo.py"]);
    assert!(report.items[0].result.is_success());
    assert!(!report.items[1].result.is_success());
    assert!(report.items[2].result.is_success());
    assert_eq!(host.pulls(&repo()).len(), 2);
}

#[tokio::test]
async fn identical_requests_in_a_batch_share_one_pull_request() {
    let host = empty_repo();
    let report = engine(&host)
        .synchronize_all(vec![
            request("docs/foo.md", "src/foo.py", "# Foo"),
            request("docs/foo.md", "src/foo.py", "# Foo"),
        ])
        .await;

    // The in-memory host never suspends, so the second request sees the
    // first one's branch, file and pull request.
    assert_eq!(report.succeeded, 2, "{report:?}");
    assert_eq!(report.items[0].result.pr_number(), report.items[1].result.pr_number());
    assert_eq!(host.pulls(&repo()).len(), 1);
    assert_eq!(created_paths(&host), vec!["docs/.keep", "docs/foo.md"]);
}

#[tokio::test]
async fn batch_of_one_concurrency_still_completes() {
    let host = empty_repo();
    let cfg = SyncConfig {
        max_concurrent: 1,
        ..SyncConfig::default()
    };
    let requests = (0..5)
        .map(|i| request(&format!("docs/page{i}.md"), "src/foo.py", "# Page"))
        .collect();

    let report = DocSyncEngine::new(host.connector(), &cfg)
        .synchronize_all(requests)
        .await;
    assert_eq!(report.succeeded, 5);
    assert_eq!(host.pulls(&repo()).len(), 5);
}
