mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// docpilot -- propose documentation changes as GitHub pull requests.
#[derive(Parser)]
#[command(name = "docpilot", version, about)]
struct Cli {
    /// Config file (defaults to ~/.docpilot/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a pull request for one documentation change.
    Sync {
        /// Repository as owner/name.
        #[arg(long)]
        repo: String,
        /// Branch the pull request targets.
        #[arg(long, default_value = "main")]
        base: String,
        /// Where the documentation goes. Same as --source for inline mode.
        #[arg(long)]
        doc: String,
        /// Source file being documented.
        #[arg(long)]
        source: String,
        /// File holding the documentation text.
        #[arg(long)]
        content: PathBuf,
    },

    /// Run every request in a JSON manifest.
    Batch {
        #[arg(long)]
        manifest: PathBuf,
        /// Overrides sync.max_concurrent.
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Suggest documentation in a comment on an issue.
    Suggest {
        #[arg(long)]
        repo: String,
        #[arg(long)]
        issue: u64,
        #[arg(long)]
        doc: String,
        #[arg(long)]
        source: String,
        #[arg(long)]
        content: PathBuf,
    },

    /// Comment on a pull request.
    Comment {
        #[arg(long)]
        repo: String,
        #[arg(long)]
        pr: u64,
        /// File holding the comment body.
        #[arg(long)]
        body: PathBuf,
        /// Head the comment with this file path.
        #[arg(long)]
        file: Option<String>,
    },

    /// List the files a pull request changed, or one file's patch.
    Changes {
        #[arg(long)]
        repo: String,
        #[arg(long)]
        pr: u64,
        /// Print only this file's patch.
        #[arg(long)]
        file: Option<String>,
    },

    /// Decide whether a webhook delivery should trigger a run.
    Trigger {
        /// X-GitHub-Event header value, e.g. push or pull_request.
        #[arg(long)]
        event: String,
        /// File holding the JSON payload.
        #[arg(long)]
        payload: PathBuf,
    },

    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = commands::load_config(cli.config.as_deref())?;
    commands::init_logging(&cfg);

    match cli.command {
        Commands::Sync {
            repo,
            base,
            doc,
            source,
            content,
        } => {
            let args = commands::sync::SyncArgs {
                repo,
                base,
                doc,
                source,
                content,
            };
            commands::sync::run(&cfg, args).await?;
        }
        Commands::Batch {
            manifest,
            concurrency,
        } => {
            commands::batch::run(&cfg, &manifest, concurrency).await?;
        }
        Commands::Suggest {
            repo,
            issue,
            doc,
            source,
            content,
        } => {
            commands::suggest::run_suggest(&cfg, &repo, issue, &doc, &source, &content).await?;
        }
        Commands::Comment {
            repo,
            pr,
            body,
            file,
        } => {
            commands::suggest::run_comment(&cfg, &repo, pr, &body, file.as_deref()).await?;
        }
        Commands::Changes { repo, pr, file } => {
            commands::changes::run(&cfg, &repo, pr, file.as_deref()).await?;
        }
        Commands::Trigger { event, payload } => {
            commands::trigger::run(&cfg, &event, &payload)?;
        }
        Commands::Config => {
            commands::config::run(&cfg)?;
        }
    }

    Ok(())
}
