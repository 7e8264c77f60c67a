use dp_core::types::{DocMode, RepositoryRef, UpdateRequest};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::host::RepositoryHost;
use crate::tree::{RemoteTreeReader, TreeEntry, TreeRead};

const INLINE_HEADER: &str = "# Documentation suggestions from DocPilot:";

/// Prepend `documentation` to `original` as a reviewable block.
///
/// The original text is kept byte-for-byte below the block.
pub fn annotate_inline(documentation: &str, original: &str) -> String {
    format!("\n{INLINE_HEADER}\n{documentation}\n\n{original}\n")
}

/// Everything the publisher needs for one change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocUpdatePlan {
    pub mode: DocMode,
    /// State of `doc_location` on the working branch.
    pub target: TreeEntry,
    pub proposed: String,
}

impl DocUpdatePlan {
    pub fn exists(&self) -> bool {
        self.target.exists
    }

    pub fn current_sha(&self) -> Option<&str> {
        self.target.sha.as_deref()
    }

    pub fn current_content(&self) -> &[u8] {
        &self.target.content
    }

    /// The working branch already holds the proposed content.
    pub fn already_applied(&self) -> bool {
        self.target.exists && self.target.content == self.proposed.as_bytes()
    }

    /// Commit message for the write.
    pub fn commit_message(&self, request: &UpdateRequest) -> String {
        match (self.mode, self.target.exists) {
            (DocMode::Inline, _) => {
                format!("📝 Add documentation for {}", request.doc_location)
            }
            (DocMode::Standalone, true) => {
                format!("📝 Update documentation for {}", request.source_file)
            }
            (DocMode::Standalone, false) => {
                format!("📝 Add documentation for {}", request.source_file)
            }
        }
    }
}

/// Decides inline vs standalone and reads the target's current state.
pub struct DocUpdatePlanner<'a> {
    host: &'a dyn RepositoryHost,
}

impl<'a> DocUpdatePlanner<'a> {
    pub fn new(host: &'a dyn RepositoryHost) -> Self {
        Self { host }
    }

    /// Classify a request without touching the network.
    pub fn classify(request: &UpdateRequest) -> DocMode {
        request.mode()
    }

    /// Read `doc_location` on `branch` and build the plan.
    ///
    /// Inline mode needs the source file to exist. A directory at the
    /// target is [`SyncError::InvalidTarget`] in either mode.
    pub async fn plan(
        &self,
        repo: &RepositoryRef,
        request: &UpdateRequest,
        branch: &str,
    ) -> Result<DocUpdatePlan> {
        let mode = Self::classify(request);
        let path = request.doc_location.as_str();

        let target = match RemoteTreeReader::new(self.host).read(repo, path, branch).await? {
            TreeRead::File(entry) => entry,
            TreeRead::NotFound => TreeEntry::missing(path),
            TreeRead::Directory => {
                return Err(SyncError::invalid_target(path, "target is a directory"))
            }
        };
        debug!(%repo, path, %mode, exists = target.exists, "planned update");

        let proposed = match mode {
            DocMode::Standalone => request.documentation_content.clone(),
            DocMode::Inline => {
                if !target.exists {
                    return Err(SyncError::NotFound(path.to_string()));
                }
                let original = target.text().ok_or_else(|| {
                    SyncError::invalid_target(path, "source file is not valid UTF-8")
                })?;
                if already_annotated(original, &request.documentation_content) {
                    original.to_string()
                } else {
                    annotate_inline(&request.documentation_content, original)
                }
            }
        };

        Ok(DocUpdatePlan {
            mode,
            target,
            proposed,
        })
    }
}

fn already_annotated(current: &str, documentation: &str) -> bool {
    current.starts_with(&format!("\n{INLINE_HEADER}\n{documentation}\n\n"))
}
