use anyhow::Context;
use dp_core::config::Config;

/// Run the `config` subcommand: print the effective configuration as TOML.
pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let text = cfg.to_toml().context("serializing config")?;
    print!("{text}");
    Ok(())
}
