//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod execute;

pub use execute::{ExecutionArgs, TargetArgs};

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a shell command on endpoints
    Command {
        /// Command line to execute
        #[arg(long)]
        command: String,

        #[command(flatten)]
        targets: TargetArgs,

        #[command(flatten)]
        execution: ExecutionArgs,
    },
    /// Run a script file on endpoints
    Script {
        /// Path of the script to upload
        #[arg(long)]
        script: PathBuf,

        #[command(flatten)]
        targets: TargetArgs,

        #[command(flatten)]
        execution: ExecutionArgs,
    },
}

/// Handle a CLI command
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
/// * `cancel` - Cancelled on SIGINT/SIGTERM
/// * `deadline` - Invocation deadline computed at startup
pub async fn handle_command(
    command: Commands,
    config: &Config,
    cancel: CancellationToken,
    deadline: Option<Instant>,
) -> Result<()> {
    match command {
        Commands::Command {
            command,
            targets,
            execution,
        } => execute::run_command(command, &targets, &execution, config, &cancel, deadline).await,
        Commands::Script {
            script,
            targets,
            execution,
        } => execute::run_script(&script, &targets, &execution, config, &cancel, deadline).await,
    }
}
