//! The seam between the engine and a repository hosting service.
//!
//! [`RepositoryHost`] exposes exactly the remote operations the engine
//! performs. Implementations map the service's status codes onto
//! [`SyncError`]: "not found" becomes [`SyncError::NotFound`], naming
//! conflicts become [`SyncError::AlreadyExists`] / [`SyncError::DuplicatePr`],
//! and a stale update token becomes [`SyncError::Conflict`].
//!
//! [`crate::client::OctocrabHost`] talks to GitHub; [`crate::memory::MemoryHost`]
//! keeps everything in process for tests.

use std::sync::Arc;

use async_trait::async_trait;
use dp_core::types::RepositoryRef;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What lives at a path on a given ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteContent {
    /// A blob, already decoded from its base64 transfer encoding.
    File { sha: String, content: Vec<u8> },
    Directory,
}

/// A single-file commit on a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub path: String,
    pub message: String,
    pub content: Vec<u8>,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub number: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentInfo {
    pub id: u64,
    pub url: String,
}

/// A file touched by a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    /// `added`, `modified`, `removed`, `renamed`, ...
    pub status: String,
    /// Unified diff hunks. GitHub omits them for binary and very large diffs.
    pub patch: Option<String>,
}

/// Remote operations against one authenticated repository host.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Content at `path` on `reference`. Absent paths are `NotFound`.
    async fn get_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
        reference: &str,
    ) -> Result<RemoteContent>;

    /// Current head commit of `branch`.
    async fn branch_head(&self, repo: &RepositoryRef, branch: &str) -> Result<String>;

    /// Create `branch` pointing at `sha`. An existing branch is `AlreadyExists`.
    async fn create_branch(&self, repo: &RepositoryRef, branch: &str, sha: &str) -> Result<()>;

    /// Create a new file. A file already at the path is `Conflict`.
    async fn create_file(&self, repo: &RepositoryRef, write: &FileWrite) -> Result<()>;

    /// Replace a file whose current blob sha must equal `sha`, else `Conflict`.
    async fn update_file(&self, repo: &RepositoryRef, write: &FileWrite, sha: &str) -> Result<()>;

    /// Open a pull request. An open one for the same head/base is `DuplicatePr`.
    async fn create_pull(&self, repo: &RepositoryRef, pr: &NewPullRequest)
        -> Result<PullRequestInfo>;

    /// The open pull request from `head` into `base`, if any.
    async fn find_open_pull(
        &self,
        repo: &RepositoryRef,
        head: &str,
        base: &str,
    ) -> Result<Option<PullRequestInfo>>;

    /// Every file changed by pull request `number`, across all pages.
    async fn list_pull_files(&self, repo: &RepositoryRef, number: u64)
        -> Result<Vec<ChangedFile>>;

    /// Comment on an issue or pull request conversation.
    async fn create_issue_comment(
        &self,
        repo: &RepositoryRef,
        number: u64,
        body: &str,
    ) -> Result<CommentInfo>;
}

/// Produces a host authenticated for one repository.
///
/// Called once per logical operation so short-lived credentials are
/// resolved fresh every time.
#[async_trait]
pub trait HostConnector: Send + Sync {
    async fn connect(&self, repo: &RepositoryRef) -> Result<Arc<dyn RepositoryHost>>;
}
