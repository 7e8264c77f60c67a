//! An in-process [`RepositoryHost`] with GitHub's observable semantics.
//!
//! Branches are copy-on-create file maps, blob shas are content hashes, and
//! every write advances the branch head. Every call is captured for
//! assertions, and failures can be queued per operation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use dp_core::types::RepositoryRef;
use ring::digest;

use crate::error::{Result, SyncError};
use crate::host::{
    ChangedFile, CommentInfo, FileWrite, HostConnector, NewPullRequest, PullRequestInfo,
    RemoteContent, RepositoryHost,
};

/// One captured call against a [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    GetContent { path: String, reference: String },
    BranchHead { branch: String },
    CreateBranch { branch: String, sha: String },
    CreateFile { path: String, branch: String, message: String },
    UpdateFile { path: String, branch: String, message: String, sha: String },
    CreatePull { head: String, base: String },
    FindOpenPull { head: String, base: String },
    ListPullFiles { number: u64 },
    CreateComment { number: u64 },
}

impl HostCall {
    /// True for calls that mutate the repository.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            HostCall::CreateBranch { .. }
                | HostCall::CreateFile { .. }
                | HostCall::UpdateFile { .. }
                | HostCall::CreatePull { .. }
                | HostCall::CreateComment { .. }
        )
    }

    fn op(&self) -> HostOp {
        match self {
            HostCall::GetContent { .. } => HostOp::GetContent,
            HostCall::BranchHead { .. } => HostOp::BranchHead,
            HostCall::CreateBranch { .. } => HostOp::CreateBranch,
            HostCall::CreateFile { .. } => HostOp::CreateFile,
            HostCall::UpdateFile { .. } => HostOp::UpdateFile,
            HostCall::CreatePull { .. } => HostOp::CreatePull,
            HostCall::FindOpenPull { .. } => HostOp::FindOpenPull,
            HostCall::ListPullFiles { .. } => HostOp::ListPullFiles,
            HostCall::CreateComment { .. } => HostOp::CreateComment,
        }
    }
}

/// Operation selector for [`MemoryHost::inject_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOp {
    GetContent,
    BranchHead,
    CreateBranch,
    CreateFile,
    UpdateFile,
    CreatePull,
    FindOpenPull,
    ListPullFiles,
    CreateComment,
}

/// A pull request as recorded by [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRecord {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
    pub url: String,
    pub open: bool,
}

#[derive(Debug, Clone, Default)]
struct Branch {
    head: String,
    files: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Default)]
struct RepoState {
    branches: HashMap<String, Branch>,
    pulls: Vec<PullRecord>,
    comments: Vec<(u64, String)>,
}

struct PendingEdit {
    repo: RepositoryRef,
    branch: String,
    path: String,
    content: Vec<u8>,
}

#[derive(Default)]
struct State {
    repos: HashMap<RepositoryRef, RepoState>,
    commits: u64,
    next_number: u64,
    next_comment: u64,
    calls: Vec<HostCall>,
    failures: Vec<(HostOp, SyncError)>,
    before_write: Option<PendingEdit>,
}

impl State {
    fn next_commit(&mut self) -> String {
        self.commits += 1;
        format!("commit-{}", self.commits)
    }

    /// Record `call`, then fail if a failure is queued for its operation.
    fn enter(&mut self, call: HostCall) -> Result<()> {
        let op = call.op();
        self.calls.push(call);
        match self.failures.iter().position(|(o, _)| *o == op) {
            Some(idx) => Err(self.failures.remove(idx).1),
            None => Ok(()),
        }
    }

    fn repo(&mut self, repo: &RepositoryRef) -> Result<&mut RepoState> {
        self.repos
            .get_mut(repo)
            .ok_or_else(|| SyncError::NotFound(repo.to_string()))
    }

    fn apply_pending_edit(&mut self) {
        if let Some(edit) = self.before_write.take() {
            let commit = self.next_commit();
            if let Some(branch) = self
                .repos
                .get_mut(&edit.repo)
                .and_then(|r| r.branches.get_mut(&edit.branch))
            {
                branch.files.insert(edit.path, edit.content);
                branch.head = commit;
            }
        }
    }
}

/// In-memory repository host for tests and dry runs.
#[derive(Default)]
pub struct MemoryHost {
    state: Mutex<State>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `repo` with an empty `default_branch`.
    pub fn with_repo(self, repo: &RepositoryRef, default_branch: &str) -> Self {
        {
            let mut state = self.state();
            let head = state.next_commit();
            let repo_state = state.repos.entry(repo.clone()).or_default();
            repo_state.branches.insert(
                default_branch.to_string(),
                Branch {
                    head,
                    files: BTreeMap::new(),
                },
            );
        }
        self
    }

    /// Commit `content` at `path` on `branch` without recording a call.
    pub fn with_file(self, repo: &RepositoryRef, branch: &str, path: &str, content: &str) -> Self {
        self.put_file(repo, branch, path, content);
        self
    }

    /// Like [`MemoryHost::with_file`] for an already shared host.
    pub fn put_file(&self, repo: &RepositoryRef, branch: &str, path: &str, content: &str) {
        let mut state = self.state();
        let commit = state.next_commit();
        if let Some(b) = state
            .repos
            .get_mut(repo)
            .and_then(|r| r.branches.get_mut(branch))
        {
            b.files.insert(path.to_string(), content.as_bytes().to_vec());
            b.head = commit;
        }
    }

    /// Delete `path` from `branch` without recording a call.
    pub fn remove_file(&self, repo: &RepositoryRef, branch: &str, path: &str) {
        let mut state = self.state();
        let commit = state.next_commit();
        if let Some(b) = state
            .repos
            .get_mut(repo)
            .and_then(|r| r.branches.get_mut(branch))
        {
            if b.files.remove(path).is_some() {
                b.head = commit;
            }
        }
    }

    /// Queue `err` to be returned by the next call of `op`.
    pub fn inject_failure(&self, op: HostOp, err: SyncError) {
        self.state().failures.push((op, err));
    }

    /// Change `path` on `branch` just before the next file write lands,
    /// simulating a concurrent editor.
    pub fn edit_before_next_write(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        path: &str,
        content: &str,
    ) {
        self.state().before_write = Some(PendingEdit {
            repo: repo.clone(),
            branch: branch.to_string(),
            path: path.to_string(),
            content: content.as_bytes().to_vec(),
        });
    }

    /// File content at `path` on `branch`, as UTF-8.
    pub fn file(&self, repo: &RepositoryRef, branch: &str, path: &str) -> Option<String> {
        self.state()
            .repos
            .get(repo)
            .and_then(|r| r.branches.get(branch))
            .and_then(|b| b.files.get(path))
            .map(|c| String::from_utf8_lossy(c).into_owned())
    }

    /// All file paths on `branch`, sorted.
    pub fn paths(&self, repo: &RepositoryRef, branch: &str) -> Vec<String> {
        self.state()
            .repos
            .get(repo)
            .and_then(|r| r.branches.get(branch))
            .map(|b| b.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_branch(&self, repo: &RepositoryRef, branch: &str) -> bool {
        self.state()
            .repos
            .get(repo)
            .is_some_and(|r| r.branches.contains_key(branch))
    }

    pub fn branch_names(&self, repo: &RepositoryRef) -> Vec<String> {
        let mut names: Vec<String> = self
            .state()
            .repos
            .get(repo)
            .map(|r| r.branches.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn pulls(&self, repo: &RepositoryRef) -> Vec<PullRecord> {
        self.state()
            .repos
            .get(repo)
            .map(|r| r.pulls.clone())
            .unwrap_or_default()
    }

    /// Comments as `(issue number, body)`.
    pub fn comments(&self, repo: &RepositoryRef) -> Vec<(u64, String)> {
        self.state()
            .repos
            .get(repo)
            .map(|r| r.comments.clone())
            .unwrap_or_default()
    }

    /// This host as a connector for the engine.
    pub fn connector(self: &Arc<Self>) -> Arc<dyn HostConnector> {
        Arc::new(Arc::clone(self))
    }

    /// Captured calls, in order.
    pub fn calls(&self) -> Vec<HostCall> {
        self.state().calls.clone()
    }

    /// Captured mutating calls, in order.
    pub fn writes(&self) -> Vec<HostCall> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }
}

/// Git-style blob id: hex digest of the content.
pub fn blob_sha(content: &[u8]) -> String {
    digest::digest(&digest::SHA256, content)
        .as_ref()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn branch_mut<'a>(repo: &'a mut RepoState, branch: &str) -> Result<&'a mut Branch> {
    repo.branches
        .get_mut(branch)
        .ok_or_else(|| SyncError::NotFound(branch.to_string()))
}

/// Whole-file hunk from `old` to `new`.
fn whole_file_patch(old: &[u8], new: &[u8]) -> String {
    let old = String::from_utf8_lossy(old);
    let new = String::from_utf8_lossy(new);
    let mut patch = format!("@@ -1,{} +1,{} @@", old.lines().count(), new.lines().count());
    for line in old.lines() {
        patch.push_str("\n-");
        patch.push_str(line);
    }
    for line in new.lines() {
        patch.push_str("\n+");
        patch.push_str(line);
    }
    patch
}

fn parent_is_file(branch: &Branch, path: &str) -> bool {
    path.match_indices('/')
        .any(|(idx, _)| branch.files.contains_key(&path[..idx]))
}

#[async_trait]
impl RepositoryHost for MemoryHost {
    async fn get_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
        reference: &str,
    ) -> Result<RemoteContent> {
        let mut state = self.state();
        state.enter(HostCall::GetContent {
            path: path.to_string(),
            reference: reference.to_string(),
        })?;
        let branch = branch_mut(state.repo(repo)?, reference)?;

        if let Some(content) = branch.files.get(path) {
            return Ok(RemoteContent::File {
                sha: blob_sha(content),
                content: content.clone(),
            });
        }
        let prefix = format!("{}/", path.trim_end_matches('/'));
        if path.is_empty() || branch.files.keys().any(|p| p.starts_with(&prefix)) {
            return Ok(RemoteContent::Directory);
        }
        Err(SyncError::NotFound(path.to_string()))
    }

    async fn branch_head(&self, repo: &RepositoryRef, branch: &str) -> Result<String> {
        let mut state = self.state();
        state.enter(HostCall::BranchHead {
            branch: branch.to_string(),
        })?;
        Ok(branch_mut(state.repo(repo)?, branch)?.head.clone())
    }

    async fn create_branch(&self, repo: &RepositoryRef, branch: &str, sha: &str) -> Result<()> {
        let mut state = self.state();
        state.enter(HostCall::CreateBranch {
            branch: branch.to_string(),
            sha: sha.to_string(),
        })?;
        let repo_state = state.repo(repo)?;
        if repo_state.branches.contains_key(branch) {
            return Err(SyncError::AlreadyExists(branch.to_string()));
        }
        let source = repo_state
            .branches
            .values()
            .find(|b| b.head == sha)
            .cloned()
            .ok_or_else(|| SyncError::upstream(Some(422), "Object does not exist"))?;
        repo_state.branches.insert(branch.to_string(), source);
        Ok(())
    }

    async fn create_file(&self, repo: &RepositoryRef, write: &FileWrite) -> Result<()> {
        let mut state = self.state();
        state.enter(HostCall::CreateFile {
            path: write.path.clone(),
            branch: write.branch.clone(),
            message: write.message.clone(),
        })?;
        state.apply_pending_edit();
        let commit = state.next_commit();
        let branch = branch_mut(state.repo(repo)?, &write.branch)?;

        if branch.files.contains_key(&write.path) {
            return Err(SyncError::Conflict {
                path: write.path.clone(),
            });
        }
        if parent_is_file(branch, &write.path) {
            return Err(SyncError::upstream(
                Some(422),
                format!("a parent of {} is a file", write.path),
            ));
        }
        branch.files.insert(write.path.clone(), write.content.clone());
        branch.head = commit;
        Ok(())
    }

    async fn update_file(&self, repo: &RepositoryRef, write: &FileWrite, sha: &str) -> Result<()> {
        let mut state = self.state();
        state.enter(HostCall::UpdateFile {
            path: write.path.clone(),
            branch: write.branch.clone(),
            message: write.message.clone(),
            sha: sha.to_string(),
        })?;
        state.apply_pending_edit();
        let commit = state.next_commit();
        let branch = branch_mut(state.repo(repo)?, &write.branch)?;

        match branch.files.get(&write.path) {
            Some(current) if blob_sha(current) == sha => {}
            _ => {
                return Err(SyncError::Conflict {
                    path: write.path.clone(),
                })
            }
        }
        branch.files.insert(write.path.clone(), write.content.clone());
        branch.head = commit;
        Ok(())
    }

    async fn create_pull(
        &self,
        repo: &RepositoryRef,
        pr: &NewPullRequest,
    ) -> Result<PullRequestInfo> {
        let mut state = self.state();
        state.enter(HostCall::CreatePull {
            head: pr.head.clone(),
            base: pr.base.clone(),
        })?;
        let number = state.next_number + 1;
        let url = format!("https://github.com/{}/pull/{number}", repo.full_name());
        let repo_state = state.repo(repo)?;

        if repo_state
            .pulls
            .iter()
            .any(|p| p.open && p.head == pr.head && p.base == pr.base)
        {
            return Err(SyncError::DuplicatePr {
                head: pr.head.clone(),
                base: pr.base.clone(),
            });
        }
        let (head, base) = match (
            repo_state.branches.get(&pr.head),
            repo_state.branches.get(&pr.base),
        ) {
            (Some(h), Some(b)) => (h, b),
            _ => return Err(SyncError::upstream(Some(422), "Validation Failed: head or base missing")),
        };
        if head.files == base.files {
            return Err(SyncError::upstream(
                Some(422),
                format!("Validation Failed: No commits between {} and {}", pr.base, pr.head),
            ));
        }

        repo_state.pulls.push(PullRecord {
            number,
            title: pr.title.clone(),
            body: pr.body.clone(),
            head: pr.head.clone(),
            base: pr.base.clone(),
            url: url.clone(),
            open: true,
        });
        state.next_number = number;
        Ok(PullRequestInfo { number, url })
    }

    async fn find_open_pull(
        &self,
        repo: &RepositoryRef,
        head: &str,
        base: &str,
    ) -> Result<Option<PullRequestInfo>> {
        let mut state = self.state();
        state.enter(HostCall::FindOpenPull {
            head: head.to_string(),
            base: base.to_string(),
        })?;
        Ok(state
            .repo(repo)?
            .pulls
            .iter()
            .find(|p| p.open && p.head == head && p.base == base)
            .map(|p| PullRequestInfo {
                number: p.number,
                url: p.url.clone(),
            }))
    }

    /// Files that differ between the pull request's head and base
    /// branches as they stand now.
    async fn list_pull_files(
        &self,
        repo: &RepositoryRef,
        number: u64,
    ) -> Result<Vec<ChangedFile>> {
        let mut state = self.state();
        state.enter(HostCall::ListPullFiles { number })?;
        let repo_state = state.repo(repo)?;
        let pull = repo_state
            .pulls
            .iter()
            .find(|p| p.number == number)
            .ok_or_else(|| SyncError::NotFound(format!("#{number}")))?;
        let (Some(head), Some(base)) = (
            repo_state.branches.get(&pull.head),
            repo_state.branches.get(&pull.base),
        ) else {
            return Err(SyncError::NotFound(format!("#{number}")));
        };

        let paths: BTreeSet<&String> = head.files.keys().chain(base.files.keys()).collect();
        Ok(paths
            .into_iter()
            .filter_map(|path| {
                let (status, old, new) = match (base.files.get(path), head.files.get(path)) {
                    (None, Some(new)) => ("added", &b""[..], new.as_slice()),
                    (Some(old), None) => ("removed", old.as_slice(), &b""[..]),
                    (Some(old), Some(new)) if old != new => {
                        ("modified", old.as_slice(), new.as_slice())
                    }
                    _ => return None,
                };
                Some(ChangedFile {
                    filename: path.clone(),
                    status: status.to_string(),
                    patch: Some(whole_file_patch(old, new)),
                })
            })
            .collect())
    }

    async fn create_issue_comment(
        &self,
        repo: &RepositoryRef,
        number: u64,
        body: &str,
    ) -> Result<CommentInfo> {
        let mut state = self.state();
        state.enter(HostCall::CreateComment { number })?;
        state.next_comment += 1;
        let id = state.next_comment;
        let url = format!(
            "https://github.com/{}/issues/{number}#issuecomment-{id}",
            repo.full_name()
        );
        state.repo(repo)?.comments.push((number, body.to_string()));
        Ok(CommentInfo { id, url })
    }
}

#[async_trait]
impl HostConnector for Arc<MemoryHost> {
    async fn connect(&self, repo: &RepositoryRef) -> Result<Arc<dyn RepositoryHost>> {
        if !self.state().repos.contains_key(repo) {
            return Err(SyncError::AuthUnavailable {
                repo: repo.to_string(),
                reason: "no installation for this repository".into(),
            });
        }
        Ok(self.clone())
    }
}
