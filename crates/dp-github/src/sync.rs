//! The documentation synchronisation engine.
//!
//! One [`UpdateRequest`] becomes a working branch, an optional set of
//! directory placeholders, one commit and one pull request:
//!
//! ```text
//! connect -> classify -> ensure branch -> plan (read target on branch)
//!         -> materialise parent dirs (standalone, new file) -> commit -> PR
//! ```
//!
//! Nothing is cached between calls. Every step tolerates having already
//! happened, so re-running a request that was interrupted converges on the
//! same branch and pull request.

use std::sync::Arc;

use dp_core::config::SyncConfig;
use dp_core::types::{BatchItem, BatchReport, PullRequestResult, UpdateRequest};
use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::branch::{working_branch_name, BranchManager, BranchState};
use crate::directory::{parent_directory, DirectoryMaterializer, PrefixSet};
use crate::error::{Result, SyncError};
use crate::host::{HostConnector, RepositoryHost};
use crate::planner::DocUpdatePlanner;
use crate::publisher::{pull_request_text, PublishRequest, PullRequestPublisher};

/// Default concurrency for batches when the configured limit is zero.
const DEFAULT_MAX_CONCURRENT: usize = 4;

pub struct DocSyncEngine {
    connector: Arc<dyn HostConnector>,
    branch_prefix: String,
    placeholder_name: String,
    max_concurrent: usize,
}

impl DocSyncEngine {
    pub fn new(connector: Arc<dyn HostConnector>, cfg: &SyncConfig) -> Self {
        let max_concurrent = if cfg.max_concurrent == 0 {
            warn!("max_concurrent was 0, defaulting to {DEFAULT_MAX_CONCURRENT}");
            DEFAULT_MAX_CONCURRENT
        } else {
            cfg.max_concurrent
        };
        Self {
            connector,
            branch_prefix: cfg.branch_prefix.clone(),
            placeholder_name: cfg.placeholder_name.clone(),
            max_concurrent,
        }
    }

    /// Working branch a request will use.
    pub fn branch_for(&self, request: &UpdateRequest) -> String {
        working_branch_name(&self.branch_prefix, request.mode(), &request.doc_location)
    }

    /// Apply one documentation change and open its pull request.
    ///
    /// Never fails: every error is reported in the result.
    pub async fn synchronize(&self, request: &UpdateRequest) -> PullRequestResult {
        match self.prepare(request).await {
            Ok(publish) => PullRequestPublisher::new(publish.host.as_ref())
                .publish(&publish.request)
                .await,
            Err(e) => {
                error!(
                    repo = %request.repo,
                    path = %request.doc_location,
                    error = %e,
                    "documentation sync failed"
                );
                PullRequestResult::error(e.to_string())
            }
        }
    }

    /// Run many requests, at most `max_concurrent` at a time.
    ///
    /// Results keep the input order; one failure never stops the rest.
    pub async fn synchronize_all(&self, requests: Vec<UpdateRequest>) -> BatchReport {
        let run_id = Uuid::new_v4().to_string();
        let gate = Arc::new(Semaphore::new(self.max_concurrent));
        info!(run_id = %run_id, count = requests.len(), limit = self.max_concurrent, "starting batch");

        let tasks = requests.into_iter().map(move |request| {
            let gate = Arc::clone(&gate);
            async move {
                let result = match gate.acquire().await {
                    Ok(_permit) => self.synchronize(&request).await,
                    Err(e) => PullRequestResult::error(format!("batch aborted: {e}")),
                };
                BatchItem {
                    repo: request.repo,
                    doc_location: request.doc_location,
                    result,
                }
            }
        });
        let items = join_all(tasks).await;

        let report = BatchReport::new(run_id, items);
        info!(
            run_id = %report.run_id,
            succeeded = report.succeeded,
            failed = report.failed,
            "batch finished"
        );
        report
    }

    /// Everything up to, not including, the commit.
    async fn prepare(&self, request: &UpdateRequest) -> Result<Prepared> {
        validate(request)?;
        let repo = &request.repo;
        // Credentials first: nothing below runs without them.
        let host = self.connector.connect(repo).await?;

        let mode = request.mode();
        let branch = self.branch_for(request);
        info!(%repo, %mode, branch = %branch, path = %request.doc_location, "synchronizing documentation");

        let state = BranchManager::new(host.as_ref())
            .ensure(repo, &request.base_branch, &branch)
            .await?;
        if state == BranchState::AlreadyExists {
            info!(%repo, branch = %branch, "resuming on existing working branch");
        }

        let plan = DocUpdatePlanner::new(host.as_ref())
            .plan(repo, request, &branch)
            .await?;

        if !plan.exists() {
            if let Some(dir) = parent_directory(&request.doc_location) {
                let mut known = PrefixSet::new();
                DirectoryMaterializer::new(host.as_ref(), &self.placeholder_name)
                    .ensure(repo, &branch, dir, &mut known)
                    .await?;
            }
        }

        let (title, body) = pull_request_text(request);
        let publish = PublishRequest {
            repo: repo.clone(),
            base_branch: request.base_branch.clone(),
            working_branch: branch,
            path: request.doc_location.clone(),
            commit_message: plan.commit_message(request),
            existing_sha: plan.current_sha().map(str::to_string),
            skip_commit: plan.already_applied(),
            content: plan.proposed,
            title,
            body,
        };
        Ok(Prepared {
            host,
            request: publish,
        })
    }
}

struct Prepared {
    host: Arc<dyn RepositoryHost>,
    request: PublishRequest,
}

fn validate(request: &UpdateRequest) -> Result<()> {
    if request.base_branch.trim().is_empty() {
        return Err(SyncError::invalid_target(
            &request.doc_location,
            "base branch is empty",
        ));
    }
    for path in [&request.doc_location, &request.source_file] {
        if path.is_empty() || path.starts_with('/') || path.ends_with('/') {
            return Err(SyncError::invalid_target(
                path,
                "expected a relative file path",
            ));
        }
        if path.split('/').any(|c| c.is_empty() || c == "." || c == "..") {
            return Err(SyncError::invalid_target(path, "path has empty or relative components"));
        }
    }
    Ok(())
}
