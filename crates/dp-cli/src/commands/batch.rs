use std::path::{Path, PathBuf};

use anyhow::Context;
use dp_core::config::Config;
use dp_core::types::{RepositoryRef, UpdateRequest};
use dp_github::DocSyncEngine;
use serde::Deserialize;

use super::{github_connector, print_json, read_text};

/// One request in a batch manifest.
///
/// Documentation is given inline or as a file relative to the manifest.
#[derive(Debug, Deserialize)]
pub struct ManifestEntry {
    pub repo: RepositoryRef,
    #[serde(default = "default_base")]
    pub base_branch: String,
    pub doc_location: String,
    pub source_file: String,
    #[serde(default)]
    pub documentation_content: Option<String>,
    #[serde(default)]
    pub documentation_file: Option<PathBuf>,
}

fn default_base() -> String {
    "main".into()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Manifest {
    List(Vec<ManifestEntry>),
    Wrapped { requests: Vec<ManifestEntry> },
}

/// Parse a manifest file into requests.
pub fn load_manifest(path: &Path) -> anyhow::Result<Vec<UpdateRequest>> {
    let text = read_text(path)?;
    let manifest: Manifest =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let entries = match manifest {
        Manifest::List(entries) | Manifest::Wrapped { requests: entries } => entries,
    };
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            let documentation_content = match (entry.documentation_content, entry.documentation_file) {
                (Some(text), None) => text,
                (None, Some(file)) => read_text(&base_dir.join(file))?,
                _ => anyhow::bail!(
                    "entry {idx} ({}): give exactly one of documentation_content or documentation_file",
                    entry.doc_location
                ),
            };
            Ok(UpdateRequest {
                repo: entry.repo,
                base_branch: entry.base_branch,
                doc_location: entry.doc_location,
                source_file: entry.source_file,
                documentation_content,
            })
        })
        .collect()
}

/// Run the `batch` subcommand: every request, then a JSON report.
pub async fn run(cfg: &Config, manifest: &Path, concurrency: Option<usize>) -> anyhow::Result<()> {
    let requests = load_manifest(manifest)?;
    let mut sync_cfg = cfg.sync.clone();
    if let Some(limit) = concurrency {
        sync_cfg.max_concurrent = limit;
    }
    sync_cfg.validate().context("--concurrency")?;

    let engine = DocSyncEngine::new(github_connector(cfg)?, &sync_cfg);
    let report = engine.synchronize_all(requests).await;
    print_json(&report)?;
    if report.failed > 0 {
        anyhow::bail!("{} of {} requests failed", report.failed, report.items.len());
    }
    Ok(())
}
