use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RepositoryRef
// ---------------------------------------------------------------------------

/// Identifies a remote repository as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryRef {
    owner: String,
    name: String,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `owner/name`, the form GitHub calls the repository's full name.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid repository reference {0:?}, expected `owner/name`")]
pub struct ParseRepositoryRefError(pub String);

impl FromStr for RepositoryRef {
    type Err = ParseRepositoryRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (owner, name) = s
            .split_once('/')
            .ok_or_else(|| ParseRepositoryRefError(s.to_string()))?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(ParseRepositoryRefError(s.to_string()));
        }
        Ok(Self::new(owner, name))
    }
}

impl TryFrom<String> for RepositoryRef {
    type Error = ParseRepositoryRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepositoryRef> for String {
    fn from(value: RepositoryRef) -> Self {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// UpdateRequest
// ---------------------------------------------------------------------------

/// A single desired documentation change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub repo: RepositoryRef,
    pub base_branch: String,
    pub doc_location: String,
    pub source_file: String,
    pub documentation_content: String,
}

impl UpdateRequest {
    /// Inline when the documentation targets the source file itself.
    pub fn mode(&self) -> DocMode {
        if self.doc_location == self.source_file {
            DocMode::Inline
        } else {
            DocMode::Standalone
        }
    }
}

/// Where proposed documentation lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocMode {
    /// Prepended as an annotated block ahead of the source content.
    Inline,
    /// Written to a file of its own.
    Standalone,
}

impl fmt::Display for DocMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocMode::Inline => write!(f, "inline"),
            DocMode::Standalone => write!(f, "standalone"),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Terminal output of one synchronisation.
///
/// Serialises as `{"status": "success", "type": "pull_request", ...}` or
/// `{"status": "error", "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PullRequestResult {
    Success {
        #[serde(rename = "type")]
        kind: ResultKind,
        pr_number: u64,
        pr_url: String,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    PullRequest,
}

impl PullRequestResult {
    pub fn pull_request(pr_number: u64, pr_url: impl Into<String>) -> Self {
        Self::Success {
            kind: ResultKind::PullRequest,
            pr_number,
            pr_url: pr_url.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn pr_number(&self) -> Option<u64> {
        match self {
            Self::Success { pr_number, .. } => Some(*pr_number),
            Self::Error { .. } => None,
        }
    }
}

/// Outcome of posting a review or issue comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommentResult {
    Success { comment_id: u64, comment_url: String },
    Error { message: String },
}

/// Per-item results of a batch, in the order the requests were given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: String,
    pub completed_at: DateTime<Utc>,
    pub items: Vec<BatchItem>,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub repo: RepositoryRef,
    pub doc_location: String,
    pub result: PullRequestResult,
}

impl BatchReport {
    pub fn new(run_id: impl Into<String>, items: Vec<BatchItem>) -> Self {
        let succeeded = items.iter().filter(|i| i.result.is_success()).count();
        let failed = items.len() - succeeded;
        Self {
            run_id: run_id.into(),
            completed_at: Utc::now(),
            items,
            succeeded,
            failed,
        }
    }
}
