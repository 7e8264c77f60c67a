use dp_core::types::{DocMode, RepositoryRef};
use ring::digest;
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::host::RepositoryHost;

/// Where a working branch came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchState {
    /// Created now from the base head.
    Created { base_sha: String },
    /// Left behind by an earlier run for the same change.
    AlreadyExists,
}

/// Deterministic working branch for `(mode, path)`.
///
/// `docs/foo.md` in standalone mode becomes `<prefix>/docs-docs-foo.md`.
/// Paths whose plain mapping could collide with another path or would be
/// an invalid ref get their odd characters replaced with `_` and a
/// `+<hash>` suffix derived from the original path.
pub fn working_branch_name(prefix: &str, mode: DocMode, path: &str) -> String {
    let kind = match mode {
        DocMode::Inline => "update",
        DocMode::Standalone => "docs",
    };

    let mut ambiguous = false;
    let mut normalized = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '/' => normalized.push('-'),
            '.' if normalized.ends_with('.') => {
                ambiguous = true;
                normalized.push('_');
            }
            c if c.is_ascii_alphanumeric() || c == '.' || c == '_' => normalized.push(c),
            _ => {
                ambiguous = true;
                normalized.push('_');
            }
        }
    }
    if normalized.is_empty() || normalized.ends_with('.') || normalized.ends_with(".lock") {
        ambiguous = true;
    }

    if ambiguous {
        format!("{prefix}/{kind}-{normalized}+{}", path_hash(path))
    } else {
        format!("{prefix}/{kind}-{normalized}")
    }
}

fn path_hash(path: &str) -> String {
    digest::digest(&digest::SHA256, path.as_bytes())
        .as_ref()
        .iter()
        .take(4)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Creates working branches off a base branch.
pub struct BranchManager<'a> {
    host: &'a dyn RepositoryHost,
}

impl<'a> BranchManager<'a> {
    pub fn new(host: &'a dyn RepositoryHost) -> Self {
        Self { host }
    }

    /// Make `branch` exist, branching from the current head of `base`.
    ///
    /// The base head is read immediately before creation. An existing
    /// branch counts as success; any other creation failure is
    /// [`SyncError::BranchCreationFailed`].
    pub async fn ensure(
        &self,
        repo: &RepositoryRef,
        base: &str,
        branch: &str,
    ) -> Result<BranchState> {
        let base_sha = self.host.branch_head(repo, base).await?;
        debug!(%repo, base, base_sha = %base_sha, "read base head");

        match self.host.create_branch(repo, branch, &base_sha).await {
            Ok(()) => {
                info!(%repo, branch, base, "created working branch");
                Ok(BranchState::Created { base_sha })
            }
            Err(SyncError::AlreadyExists(_)) => {
                debug!(%repo, branch, "working branch already exists");
                Ok(BranchState::AlreadyExists)
            }
            Err(e) => Err(SyncError::BranchCreationFailed {
                branch: branch.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
