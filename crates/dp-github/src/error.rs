use thiserror::Error;

/// Failure taxonomy for documentation synchronisation.
///
/// `NotFound`, `AlreadyExists` and `DuplicatePr` are expected outcomes that
/// the engine consumes internally; the rest end the current request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("no usable GitHub credential for {repo}: {reason}")]
    AuthUnavailable { repo: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("a pull request from {head} into {base} already exists")]
    DuplicatePr { head: String, base: String },

    #[error("conflict writing {path}: remote content changed since it was read")]
    Conflict { path: String },

    #[error("failed to create branch {branch}: {reason}")]
    BranchCreationFailed { branch: String, reason: String },

    #[error("invalid target {path}: {reason}")]
    InvalidTarget { path: String, reason: String },

    #[error("GitHub API error{}: {message}", status_suffix(.status))]
    Upstream { status: Option<u16>, message: String },
}

impl SyncError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_target(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_message_includes_status() {
        let err = SyncError::upstream(Some(502), "bad gateway");
        assert_eq!(err.to_string(), "GitHub API error (HTTP 502): bad gateway");

        let err = SyncError::upstream(None, "connection reset");
        assert_eq!(err.to_string(), "GitHub API error: connection reset");
    }

    #[test]
    fn conflict_names_the_path() {
        let err = SyncError::Conflict {
            path: "docs/foo.md".into(),
        };
        assert!(err.to_string().contains("docs/foo.md"));
    }
}
