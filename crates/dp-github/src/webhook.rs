//! Turn GitHub webhook deliveries into documentation runs.
//!
//! Only the decision lives here: whether a delivery should trigger a run
//! and over which commit range. Receiving and verifying deliveries is the
//! HTTP layer's job.

use dp_core::types::RepositoryRef;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

const NULL_SHA: &str = "0000000000000000000000000000000000000000";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("malformed {event} payload: {source}")]
    Malformed {
        event: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid repository in payload: {0}")]
    Repository(#[from] dp_core::types::ParseRepositoryRefError),
}

/// A commit range to document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTrigger {
    pub repo: RepositoryRef,
    pub base_branch: String,
    pub base_ref: String,
    pub target_ref: String,
    pub clone_url: String,
    /// Merged pull request behind the trigger; its changed files are the
    /// candidates for documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_number: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum WebhookDecision {
    Process(SyncTrigger),
    Skip { reason: String },
}

impl WebhookDecision {
    fn skip(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        debug!(%reason, "skipping webhook delivery");
        Self::Skip { reason }
    }
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
    #[serde(default)]
    clone_url: String,
}

#[derive(Debug, Deserialize)]
struct PushEvent {
    #[serde(rename = "ref")]
    git_ref: String,
    before: String,
    after: String,
    repository: Repository,
}

#[derive(Debug, Deserialize)]
struct PullRequestEvent {
    action: String,
    pull_request: PullRequest,
    repository: Repository,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    #[serde(default)]
    number: Option<u64>,
    #[serde(default)]
    merged: bool,
    merge_commit_sha: Option<String>,
    base: BranchRef,
}

#[derive(Debug, Deserialize)]
struct BranchRef {
    #[serde(rename = "ref")]
    git_ref: String,
}

/// Decide what a delivery of `event_type` means for documentation.
pub fn derive_trigger(
    event_type: &str,
    payload: &serde_json::Value,
    protected_branches: &[String],
) -> Result<WebhookDecision, WebhookError> {
    let is_protected = |branch: &str| protected_branches.iter().any(|b| b == branch);

    match event_type {
        "push" => {
            let event: PushEvent = parse(event_type, payload)?;
            let branch = event
                .git_ref
                .strip_prefix("refs/heads/")
                .unwrap_or(&event.git_ref);

            if event.before == NULL_SHA {
                return Ok(WebhookDecision::skip(format!("branch {branch} was created")));
            }
            if event.after == NULL_SHA {
                return Ok(WebhookDecision::skip(format!("branch {branch} was deleted")));
            }
            if !is_protected(branch) {
                return Ok(WebhookDecision::skip(format!(
                    "push to non-protected branch {branch}"
                )));
            }

            let trigger = SyncTrigger {
                repo: event.repository.full_name.parse()?,
                base_branch: branch.to_string(),
                base_ref: event.before,
                target_ref: event.after,
                clone_url: event.repository.clone_url,
                pull_number: None,
            };
            info!(repo = %trigger.repo, branch = %trigger.base_branch, "push triggers documentation run");
            Ok(WebhookDecision::Process(trigger))
        }
        "pull_request" => {
            let event: PullRequestEvent = parse(event_type, payload)?;
            if event.action != "closed" || !event.pull_request.merged {
                return Ok(WebhookDecision::skip(format!(
                    "pull request {} without merge",
                    event.action
                )));
            }
            let base = event.pull_request.base.git_ref;
            if !is_protected(&base) {
                return Ok(WebhookDecision::skip(format!(
                    "merge into non-protected branch {base}"
                )));
            }
            let Some(merge_sha) = event.pull_request.merge_commit_sha else {
                return Ok(WebhookDecision::skip("merged pull request has no merge commit"));
            };

            let trigger = SyncTrigger {
                repo: event.repository.full_name.parse()?,
                base_branch: base,
                base_ref: format!("{merge_sha}~1"),
                target_ref: merge_sha,
                clone_url: event.repository.clone_url,
                pull_number: event.pull_request.number,
            };
            info!(repo = %trigger.repo, branch = %trigger.base_branch, "merge triggers documentation run");
            Ok(WebhookDecision::Process(trigger))
        }
        other => Ok(WebhookDecision::skip(format!("unsupported event type {other}"))),
    }
}

fn parse<T: serde::de::DeserializeOwned>(
    event: &str,
    payload: &serde_json::Value,
) -> Result<T, WebhookError> {
    T::deserialize(payload).map_err(|source| WebhookError::Malformed {
        event: event.to_string(),
        source,
    })
}
