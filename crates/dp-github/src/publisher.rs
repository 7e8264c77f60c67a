use dp_core::types::{DocMode, PullRequestResult, RepositoryRef, UpdateRequest};
use tracing::{error, info, warn};

use crate::error::{Result, SyncError};
use crate::host::{FileWrite, NewPullRequest, PullRequestInfo, RepositoryHost};

/// One commit plus the pull request that carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub repo: RepositoryRef,
    pub base_branch: String,
    pub working_branch: String,
    pub path: String,
    pub content: String,
    /// Blob sha of the file being replaced; `None` creates the file.
    pub existing_sha: Option<String>,
    pub commit_message: String,
    pub title: String,
    pub body: String,
    /// The branch already holds `content`; only the pull request is needed.
    pub skip_commit: bool,
}

/// Title and body for the pull request proposing `request`.
pub fn pull_request_text(request: &UpdateRequest) -> (String, String) {
    let title = format!("📝 Update documentation for {}", request.source_file);
    let body = match request.mode() {
        DocMode::Inline => format!(
            "# 📝 Documentation Update\n\n\
             This PR adds documentation for `{file}` generated by DocPilot.\n\n\
             Please review these documentation updates and adjust as needed.\n\n\
             ## Documentation Generated\n\n\
             ```\n{docs}\n```\n",
            file = request.source_file,
            docs = request.documentation_content,
        ),
        DocMode::Standalone => format!(
            "# 📝 Documentation Update\n\n\
             This PR adds/updates documentation for `{source}` in `{location}` generated by DocPilot.\n\n\
             Please review these documentation updates and adjust as needed.\n",
            source = request.source_file,
            location = request.doc_location,
        ),
    };
    (title, body)
}

/// Commits to a working branch and opens the pull request.
pub struct PullRequestPublisher<'a> {
    host: &'a dyn RepositoryHost,
}

impl<'a> PullRequestPublisher<'a> {
    pub fn new(host: &'a dyn RepositoryHost) -> Self {
        Self { host }
    }

    /// Commit and open the pull request. Failures come back in the
    /// result's error channel.
    pub async fn publish(&self, request: &PublishRequest) -> PullRequestResult {
        match self.try_publish(request).await {
            Ok(pr) => PullRequestResult::pull_request(pr.number, pr.url),
            Err(e) => {
                error!(repo = %request.repo, path = %request.path, error = %e, "publish failed");
                PullRequestResult::error(e.to_string())
            }
        }
    }

    async fn try_publish(&self, request: &PublishRequest) -> Result<PullRequestInfo> {
        if request.skip_commit {
            info!(
                repo = %request.repo,
                branch = %request.working_branch,
                path = %request.path,
                "content already on branch, skipping commit"
            );
        } else {
            self.commit(request).await?;
        }
        self.open_pull(request).await
    }

    /// Update bound to `existing_sha`, or create when there is none.
    pub async fn commit(&self, request: &PublishRequest) -> Result<()> {
        let write = FileWrite {
            path: request.path.clone(),
            message: request.commit_message.clone(),
            content: request.content.as_bytes().to_vec(),
            branch: request.working_branch.clone(),
        };
        match &request.existing_sha {
            Some(sha) => self.host.update_file(&request.repo, &write, sha).await?,
            None => self.host.create_file(&request.repo, &write).await?,
        }
        info!(
            repo = %request.repo,
            branch = %request.working_branch,
            path = %request.path,
            update = request.existing_sha.is_some(),
            "committed documentation"
        );
        Ok(())
    }

    /// Open the pull request; an open one for the same branches is reused.
    pub async fn open_pull(&self, request: &PublishRequest) -> Result<PullRequestInfo> {
        let pr = NewPullRequest {
            title: request.title.clone(),
            body: request.body.clone(),
            head: request.working_branch.clone(),
            base: request.base_branch.clone(),
        };
        match self.host.create_pull(&request.repo, &pr).await {
            Ok(created) => {
                info!(repo = %request.repo, pr_number = created.number, "opened pull request");
                Ok(created)
            }
            Err(SyncError::DuplicatePr { head, base }) => {
                warn!(repo = %request.repo, %head, %base, "pull request already open");
                self.host
                    .find_open_pull(&request.repo, &head, &base)
                    .await?
                    .ok_or(SyncError::DuplicatePr { head, base })
            }
            Err(e) => Err(e),
        }
    }
}
