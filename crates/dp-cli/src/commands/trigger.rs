use std::path::Path;

use anyhow::Context;
use dp_core::config::Config;
use dp_github::webhook::{derive_trigger, WebhookDecision};

use super::{print_json, read_text};

/// Decide on a saved webhook payload.
pub fn decide(cfg: &Config, event: &str, payload: &Path) -> anyhow::Result<WebhookDecision> {
    let text = read_text(payload)?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", payload.display()))?;
    Ok(derive_trigger(event, &value, &cfg.sync.protected_branches)?)
}

/// Run the `trigger` subcommand.
pub fn run(cfg: &Config, event: &str, payload: &Path) -> anyhow::Result<()> {
    let decision = decide(cfg, event, payload)?;
    print_json(&decision)
}
