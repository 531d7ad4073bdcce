use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "drive-revoke", version)]
#[command(about = "Revoke every sharing permission on a Google Drive account, resumably", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// SQLite file holding run state and the audit log
    #[arg(long, global = true, env = "DRIVE_REVOKE_DATABASE")]
    pub database: Option<PathBuf>,

    /// OAuth access token with the drive scope
    #[arg(long, global = true, env = "DRIVE_REVOKE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Seconds of work per invocation before progress is saved
    #[arg(long, global = true, default_value_t = 300)]
    pub time_budget_secs: u64,

    /// Seconds between scheduled invocations in `run` mode
    #[arg(long, global = true, default_value_t = 60)]
    pub interval_secs: u64,

    /// Items requested per listing page
    #[arg(long, global = true, default_value_t = 100)]
    pub page_size: u32,

    /// Log output format: pretty, json or compact
    #[arg(long, global = true, env = "DRIVE_REVOKE_LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Debug-level logs
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start or resume a run and keep it going until it completes (Ctrl+C stops it)
    Run,

    /// Start a fresh run, or resume a stopped one, without processing anything
    Start,

    /// Process one time budget of the current run
    #[command(name = "continue")]
    Continue,

    /// Stop the run, keeping progress for a later `start`
    Stop,

    /// Delete run state and the audit log
    Reset {
        /// Confirm that the audit log may be erased
        #[arg(long)]
        yes: bool,
    },

    /// Show run state and audit counts
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Whether the command talks to the Drive API.
    pub fn needs_remote(&self) -> bool {
        matches!(self, Commands::Run | Commands::Start | Commands::Continue)
    }
}
