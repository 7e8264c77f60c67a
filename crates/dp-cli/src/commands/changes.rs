use std::sync::Arc;

use anyhow::Context;
use dp_core::config::Config;
use dp_core::types::RepositoryRef;
use dp_github::changes::PullChanges;
use dp_github::host::HostConnector;
use serde_json::{json, Value};

use super::{github_connector, print_json};

/// Changed files of `pr`, or the patch for one of them.
pub async fn report(
    connector: Arc<dyn HostConnector>,
    repo: &RepositoryRef,
    pr: u64,
    file: Option<&str>,
) -> anyhow::Result<Value> {
    let changes = PullChanges::new(connector);
    match file {
        Some(path) => {
            let patch = changes
                .file_diff(repo, pr, path)
                .await
                .with_context(|| format!("diff of {path} in #{pr}"))?;
            Ok(json!({ "file": path, "patch": patch }))
        }
        None => {
            let files = changes
                .files(repo, pr)
                .await
                .with_context(|| format!("files of #{pr}"))?;
            Ok(serde_json::to_value(files)?)
        }
    }
}

/// Run the `changes` subcommand.
pub async fn run(cfg: &Config, repo: &str, pr: u64, file: Option<&str>) -> anyhow::Result<()> {
    let repo: RepositoryRef = repo.parse().with_context(|| format!("--repo {repo}"))?;
    let value = report(github_connector(cfg)?, &repo, pr, file).await?;
    print_json(&value)
}
