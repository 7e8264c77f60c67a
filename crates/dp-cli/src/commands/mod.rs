pub mod batch;
pub mod changes;
pub mod config;
pub mod suggest;
pub mod sync;
pub mod trigger;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use dp_core::config::Config;
use dp_github::auth::AuthResolver;
use dp_github::client::GitHubConnector;
use dp_github::host::HostConnector;
use dp_telemetry::logging::{self, LogFormat};
use serde::Serialize;

/// Load `path`, or the default location when none is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Config::load().context("loading ~/.docpilot/config.toml"),
    }
}

pub fn init_logging(cfg: &Config) {
    let format = if cfg.general.json_logs() {
        LogFormat::Json
    } else {
        LogFormat::Human
    };
    logging::init("docpilot", &cfg.general.log_level, format);
}

/// Connector for the real GitHub API, credentials taken from the env vars
/// named in `cfg`.
pub fn github_connector(cfg: &Config) -> anyhow::Result<Arc<dyn HostConnector>> {
    let resolver = AuthResolver::from_config(&cfg.github).context("configuring GitHub auth")?;
    if resolver.mode().is_none() {
        anyhow::bail!(
            "no GitHub credentials: set {} or {} and {}",
            cfg.github.token_env,
            cfg.github.app_id_env,
            cfg.github.private_key_path_env
        );
    }
    tracing::debug!(mode = ?resolver.mode(), api_url = ?resolver.api_url(), "GitHub auth configured");
    Ok(Arc::new(GitHubConnector::new(resolver)))
}

pub fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
