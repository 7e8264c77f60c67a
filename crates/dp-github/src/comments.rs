use std::sync::Arc;

use dp_core::types::{CommentResult, RepositoryRef};
use tracing::{error, info};

use crate::error::Result;
use crate::host::{CommentInfo, HostConnector};

/// Body for suggesting documentation in reply to an issue.
pub fn suggestion_body(doc_location: &str, documentation: &str, source_file: &str) -> String {
    format!(
        "## 📝 Documentation Suggestion for `{source_file}`\n\n\
         Based on this issue, DocPilot has generated documentation for `{source_file}`.\n\n\
         ### Suggested Documentation\n\
         ```\n{documentation}\n```\n\n\
         ### Implementation\n\
         To implement this documentation, it should be placed in `{doc_location}`.\n\n\
         Would you like DocPilot to create a pull request with this documentation update?\n\
         Reply with \"👍\" or \"Yes, create PR\" to proceed.\n"
    )
}

/// Posts documentation feedback on pull requests and issues.
pub struct ReviewCommenter {
    connector: Arc<dyn HostConnector>,
}

impl ReviewCommenter {
    pub fn new(connector: Arc<dyn HostConnector>) -> Self {
        Self { connector }
    }

    /// Comment on a pull request, headed by `file_path` when given.
    pub async fn add_pr_comment(
        &self,
        repo: &RepositoryRef,
        pr_number: u64,
        body: &str,
        file_path: Option<&str>,
    ) -> CommentResult {
        let body = match file_path {
            Some(file) => format!("## Documentation Suggestions for `{file}`\n\n{body}"),
            None => body.to_string(),
        };
        into_result(repo, pr_number, self.post(repo, pr_number, &body).await)
    }

    /// Suggest documentation in reply to an issue.
    pub async fn suggest_documentation_update(
        &self,
        repo: &RepositoryRef,
        issue_number: u64,
        doc_location: &str,
        documentation: &str,
        source_file: &str,
    ) -> CommentResult {
        let body = suggestion_body(doc_location, documentation, source_file);
        into_result(repo, issue_number, self.post(repo, issue_number, &body).await)
    }

    async fn post(&self, repo: &RepositoryRef, number: u64, body: &str) -> Result<CommentInfo> {
        let host = self.connector.connect(repo).await?;
        host.create_issue_comment(repo, number, body).await
    }
}

fn into_result(repo: &RepositoryRef, number: u64, posted: Result<CommentInfo>) -> CommentResult {
    match posted {
        Ok(comment) => {
            info!(%repo, number, comment_id = comment.id, "posted comment");
            CommentResult::Success {
                comment_id: comment.id,
                comment_url: comment.url,
            }
        }
        Err(e) => {
            error!(%repo, number, error = %e, "failed to post comment");
            CommentResult::Error {
                message: format!("error adding comment: {e}"),
            }
        }
    }
}
