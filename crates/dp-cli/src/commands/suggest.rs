use std::path::Path;

use anyhow::Context;
use dp_core::config::Config;
use dp_core::types::{CommentResult, RepositoryRef};
use dp_github::comments::ReviewCommenter;

use super::{github_connector, print_json, read_text};

fn parse_repo(repo: &str) -> anyhow::Result<RepositoryRef> {
    repo.parse().with_context(|| format!("--repo {repo}"))
}

fn finish(result: &CommentResult) -> anyhow::Result<()> {
    print_json(result)?;
    if let CommentResult::Error { message } = result {
        anyhow::bail!("{message}");
    }
    Ok(())
}

/// Run the `suggest` subcommand.
pub async fn run_suggest(
    cfg: &Config,
    repo: &str,
    issue: u64,
    doc_location: &str,
    source_file: &str,
    content: &Path,
) -> anyhow::Result<()> {
    let repo = parse_repo(repo)?;
    let documentation = read_text(content)?;
    let commenter = ReviewCommenter::new(github_connector(cfg)?);

    let result = commenter
        .suggest_documentation_update(&repo, issue, doc_location, &documentation, source_file)
        .await;
    finish(&result)
}

/// Run the `comment` subcommand.
pub async fn run_comment(
    cfg: &Config,
    repo: &str,
    pr: u64,
    body: &Path,
    file_path: Option<&str>,
) -> anyhow::Result<()> {
    let repo = parse_repo(repo)?;
    let body = read_text(body)?;
    let commenter = ReviewCommenter::new(github_connector(cfg)?);

    let result = commenter.add_pr_comment(&repo, pr, &body, file_path).await;
    finish(&result)
}
