//! CLI for the dlhost download host.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dlhost_core::config;
use dlhost_core::jobs::JobStore;

use commands::{
    run_account_add, run_account_list, run_add, run_cancel, run_pool, run_reconnect_cmd,
    run_remove, run_set_config, run_status,
};

/// Top-level CLI for the dlhost download host.
#[derive(Debug, Parser)]
#[command(name = "dlhost")]
#[command(about = "dlhost: plugin-based download host", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Add links to a package (created if it does not exist yet).
    Add {
        /// Package name the links are grouped under.
        #[arg(short, long, default_value = "downloads")]
        package: String,
        /// Source URLs; each is matched against the plugin registry.
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Run the worker pool until the queue drains. Also serves the remote
    /// control socket while active.
    Run {
        /// Override the configured worker count.
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
    },

    /// Show all packages and their jobs.
    Status,

    /// Pause a job by ID (progress in the .part file is kept).
    Pause {
        /// Job identifier.
        id: i64,
    },

    /// Cancel a queued or running job by ID.
    Cancel {
        /// Job identifier.
        id: i64,
    },

    /// Delete a package and all of its jobs.
    Remove {
        /// Package identifier.
        package: i64,
    },

    /// Manage hoster accounts.
    Account {
        #[command(subcommand)]
        action: AccountCmd,
    },

    /// Run the configured reconnect script.
    Reconnect,

    /// Change a config value (applies to a live host via the remote socket).
    SetConfig {
        /// Config key, e.g. max_workers.
        key: String,
        /// New value.
        value: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum AccountCmd {
    /// Store credentials for a hoster service.
    Add {
        /// Service host, e.g. rehost.to.
        service: String,
        /// Account login.
        login: String,
        /// Account secret (session token or password).
        secret: String,
    },
    /// List configured accounts (secrets redacted).
    List,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Add { package, urls } => {
                let store = JobStore::open_default().await?;
                run_add(&store, &package, &urls).await?;
            }
            CliCommand::Run { workers } => {
                let store = JobStore::open_default().await?;
                run_pool(&store, &cfg, workers).await?;
            }
            CliCommand::Status => {
                let store = JobStore::open_default().await?;
                run_status(&store).await?;
            }
            CliCommand::Pause { id } => {
                let store = JobStore::open_default().await?;
                run_cancel(&store, id, true).await?;
            }
            CliCommand::Cancel { id } => {
                let store = JobStore::open_default().await?;
                run_cancel(&store, id, false).await?;
            }
            CliCommand::Remove { package } => {
                let store = JobStore::open_default().await?;
                run_remove(&store, package).await?;
            }
            CliCommand::Account { action } => match action {
                AccountCmd::Add {
                    service,
                    login,
                    secret,
                } => run_account_add(&service, &login, &secret)?,
                AccountCmd::List => run_account_list()?,
            },
            CliCommand::Reconnect => run_reconnect_cmd(&cfg).await?,
            CliCommand::SetConfig { key, value } => run_set_config(cfg, &key, &value).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
