use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use dp_core::types::RepositoryRef;
use octocrab::params::repos::Reference;
use octocrab::models::repos::DiffEntryStatus;
use octocrab::Octocrab;
use serde::Deserialize;
use tracing::debug;

use crate::auth::{AuthResolver, Credential};
use crate::error::{Result, SyncError};
use crate::host::{
    ChangedFile, CommentInfo, FileWrite, HostConnector, NewPullRequest, PullRequestInfo,
    RemoteContent, RepositoryHost,
};

/// [`RepositoryHost`] backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct OctocrabHost {
    octocrab: Octocrab,
}

impl OctocrabHost {
    /// Wrap an already-authenticated client.
    pub fn new(octocrab: Octocrab) -> Self {
        Self { octocrab }
    }

    /// Build a client for a resolved credential.
    pub fn from_credential(credential: Credential, api_url: Option<&str>) -> Result<Self> {
        match credential {
            Credential::Installation { client, .. } => Ok(Self::new(client)),
            Credential::Static { token } => {
                let mut builder = Octocrab::builder();
                if let Some(url) = api_url {
                    builder = builder
                        .base_uri(url)
                        .map_err(|e| SyncError::upstream(None, format!("invalid API url {url}: {e}")))?;
                }
                let octocrab = builder
                    .personal_token(token)
                    .build()
                    .map_err(|e| SyncError::upstream(None, format!("building client: {e}")))?;
                Ok(Self::new(octocrab))
            }
        }
    }

    /// Raw blob by sha. The contents API leaves `content` empty for files
    /// over 1 MB; the git data API still serves them.
    async fn get_blob(&self, repo: &RepositoryRef, sha: &str, path: &str) -> Result<Vec<u8>> {
        let route = format!("/repos/{}/{}/git/blobs/{sha}", repo.owner(), repo.name());
        let blob: GitBlob = self
            .octocrab
            .get(route, None::<&()>)
            .await
            .map_err(|e| map_error(Operation::Read, path, e))?;

        if blob.encoding != "base64" {
            return Err(SyncError::upstream(
                None,
                format!("unsupported blob encoding {:?} for {path}", blob.encoding),
            ));
        }
        decode_blob(&blob.content).map_err(|e| {
            SyncError::upstream(None, format!("undecodable blob for {path}: {e}"))
        })
    }
}

#[derive(Debug, Deserialize)]
struct GitBlob {
    content: String,
    encoding: String,
}

#[async_trait]
impl RepositoryHost for OctocrabHost {
    async fn get_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
        reference: &str,
    ) -> Result<RemoteContent> {
        let items = self
            .octocrab
            .repos(repo.owner(), repo.name())
            .get_content()
            .path(path)
            .r#ref(reference)
            .send()
            .await
            .map_err(|e| map_error(Operation::Read, path, e))?
            .items;

        // A file comes back as a single item whose path is the one asked
        // for; anything else is a directory listing.
        match items.as_slice() {
            [item] if item.r#type == "file" && item.path == path => {
                let inline = item.content.as_deref().filter(|c| !c.trim().is_empty());
                let content = match (item.encoding.as_deref(), inline) {
                    (Some("base64") | None, Some(encoded)) => decode_blob(encoded).map_err(|e| {
                        SyncError::upstream(None, format!("undecodable content for {path}: {e}"))
                    })?,
                    _ if item.size == 0 => Vec::new(),
                    // `"encoding": "none"`: too large to inline.
                    _ => {
                        debug!(%repo, path, size = item.size, "content not inlined, fetching blob");
                        self.get_blob(repo, &item.sha, path).await?
                    }
                };
                Ok(RemoteContent::File {
                    sha: item.sha.clone(),
                    content,
                })
            }
            _ => Ok(RemoteContent::Directory),
        }
    }

    async fn branch_head(&self, repo: &RepositoryRef, branch: &str) -> Result<String> {
        let git_ref = self
            .octocrab
            .repos(repo.owner(), repo.name())
            .get_ref(&Reference::Branch(branch.to_string()))
            .await
            .map_err(|e| map_error(Operation::Read, branch, e))?;

        match git_ref.object {
            octocrab::models::repos::Object::Commit { sha, .. }
            | octocrab::models::repos::Object::Tag { sha, .. } => Ok(sha),
            #[allow(unreachable_patterns)]
            other => Err(SyncError::upstream(
                None,
                format!("unexpected object for heads/{branch}: {other:?}"),
            )),
        }
    }

    async fn create_branch(&self, repo: &RepositoryRef, branch: &str, sha: &str) -> Result<()> {
        self.octocrab
            .repos(repo.owner(), repo.name())
            .create_ref(&Reference::Branch(branch.to_string()), sha)
            .await
            .map_err(|e| map_error(Operation::CreateBranch, branch, e))?;
        Ok(())
    }

    async fn create_file(&self, repo: &RepositoryRef, write: &FileWrite) -> Result<()> {
        debug!(%repo, path = %write.path, branch = %write.branch, "creating file");
        self.octocrab
            .repos(repo.owner(), repo.name())
            .create_file(&write.path, &write.message, &write.content)
            .branch(&write.branch)
            .send()
            .await
            .map_err(|e| map_error(Operation::WriteFile, &write.path, e))?;
        Ok(())
    }

    async fn update_file(&self, repo: &RepositoryRef, write: &FileWrite, sha: &str) -> Result<()> {
        debug!(%repo, path = %write.path, branch = %write.branch, sha, "updating file");
        self.octocrab
            .repos(repo.owner(), repo.name())
            .update_file(&write.path, &write.message, &write.content, sha)
            .branch(&write.branch)
            .send()
            .await
            .map_err(|e| map_error(Operation::WriteFile, &write.path, e))?;
        Ok(())
    }

    async fn create_pull(
        &self,
        repo: &RepositoryRef,
        pr: &NewPullRequest,
    ) -> Result<PullRequestInfo> {
        let created = self
            .octocrab
            .pulls(repo.owner(), repo.name())
            .create(&pr.title, &pr.head, &pr.base)
            .body(&pr.body)
            .send()
            .await
            .map_err(|e| match map_error(Operation::CreatePull, &pr.head, e) {
                SyncError::AlreadyExists(_) => SyncError::DuplicatePr {
                    head: pr.head.clone(),
                    base: pr.base.clone(),
                },
                other => other,
            })?;

        Ok(pull_info(created))
    }

    async fn find_open_pull(
        &self,
        repo: &RepositoryRef,
        head: &str,
        base: &str,
    ) -> Result<Option<PullRequestInfo>> {
        let page = self
            .octocrab
            .pulls(repo.owner(), repo.name())
            .list()
            .state(octocrab::params::State::Open)
            .head(format!("{}:{}", repo.owner(), head))
            .base(base)
            .per_page(1)
            .send()
            .await
            .map_err(|e| map_error(Operation::Read, head, e))?;

        Ok(page.items.into_iter().next().map(pull_info))
    }

    async fn list_pull_files(
        &self,
        repo: &RepositoryRef,
        number: u64,
    ) -> Result<Vec<ChangedFile>> {
        let subject = format!("#{number}");
        let first = self
            .octocrab
            .pulls(repo.owner(), repo.name())
            .list_files(number)
            .await
            .map_err(|e| map_error(Operation::Read, &subject, e))?;
        let entries = self
            .octocrab
            .all_pages(first)
            .await
            .map_err(|e| map_error(Operation::Read, &subject, e))?;

        Ok(entries
            .into_iter()
            .map(|entry| ChangedFile {
                status: diff_status(&entry.status),
                filename: entry.filename,
                patch: entry.patch,
            })
            .collect())
    }

    async fn create_issue_comment(
        &self,
        repo: &RepositoryRef,
        number: u64,
        body: &str,
    ) -> Result<CommentInfo> {
        let comment = self
            .octocrab
            .issues(repo.owner(), repo.name())
            .create_comment(number, body)
            .await
            .map_err(|e| map_error(Operation::Read, &format!("#{number}"), e))?;

        Ok(CommentInfo {
            id: comment.id.0,
            url: comment.html_url.to_string(),
        })
    }
}

/// [`HostConnector`] that resolves a fresh credential for every call.
pub struct GitHubConnector {
    resolver: AuthResolver,
}

impl GitHubConnector {
    pub fn new(resolver: AuthResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl HostConnector for GitHubConnector {
    async fn connect(&self, repo: &RepositoryRef) -> Result<Arc<dyn RepositoryHost>> {
        let credential = self.resolver.resolve(repo).await?;
        let host = OctocrabHost::from_credential(credential, self.resolver.api_url())?;
        Ok(Arc::new(host))
    }
}

// ---- error mapping ----------------------------------------------------------

/// What the failing call was trying to do; decides how 409/422 read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    CreateBranch,
    WriteFile,
    CreatePull,
}

/// HTTP status carried by a GitHub error response, if any.
pub(crate) fn status_of(err: &octocrab::Error) -> Option<u16> {
    match err {
        octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
        _ => None,
    }
}

fn map_error(op: Operation, subject: &str, err: octocrab::Error) -> SyncError {
    match &err {
        octocrab::Error::GitHub { source, .. } => {
            let mut detail = source.message.clone();
            for extra in source.errors.iter().flatten() {
                if let Some(msg) = extra.get("message").and_then(|m| m.as_str()) {
                    detail.push_str(": ");
                    detail.push_str(msg);
                }
            }
            classify(op, Some(source.status_code.as_u16()), &detail, subject)
        }
        other => SyncError::upstream(None, other.to_string()),
    }
}

/// Map a status code and GitHub's message onto the engine's taxonomy.
pub fn classify(op: Operation, status: Option<u16>, message: &str, subject: &str) -> SyncError {
    let already_exists = message.to_ascii_lowercase().contains("already exists");
    match (op, status) {
        (_, Some(404)) => SyncError::NotFound(subject.to_string()),
        (Operation::CreateBranch | Operation::CreatePull, Some(422)) if already_exists => {
            SyncError::AlreadyExists(subject.to_string())
        }
        // 409: blob sha mismatch. 422 on a write: the file appeared without
        // a sha being supplied.
        (Operation::WriteFile, Some(409 | 422)) => SyncError::Conflict {
            path: subject.to_string(),
        },
        _ => SyncError::upstream(status, message.to_string()),
    }
}

fn decode_blob(encoded: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD.decode(compact)
}

/// GitHub's lowercase status name, e.g. `modified`.
fn diff_status(status: &DiffEntryStatus) -> String {
    match serde_json::to_value(status) {
        Ok(serde_json::Value::String(name)) => name,
        _ => format!("{status:?}").to_ascii_lowercase(),
    }
}

fn pull_info(pr: octocrab::models::pulls::PullRequest) -> PullRequestInfo {
    PullRequestInfo {
        number: pr.number,
        url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
    }
}
