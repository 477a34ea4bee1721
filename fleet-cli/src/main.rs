//! Fleet CLI
//!
//! Runs shell commands and scripts on managed endpoints through the
//! management server, streaming each endpoint's result as it arrives.

mod cache;
mod commands;
mod config;
mod error;
mod execution;
mod host;
mod id_resolver;
mod prompt;
mod types;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "fleet_cli=warn,fleet_client=warn";

#[derive(Parser)]
#[command(name = "fleet")]
#[command(about = "Remote execution on managed endpoints", long_about = None)]
struct Cli {
    /// Management server API URL
    #[arg(long, env = "FLEET_API_URL")]
    api_url: String,

    /// API login for basic authentication
    #[arg(long, env = "FLEET_API_USER")]
    api_user: Option<String>,

    #[arg(long, env = "FLEET_API_PASSWORD", hide_env_values = true)]
    api_password: Option<String>,

    /// Bearer token, used when no login and password are set
    #[arg(long, env = "FLEET_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Directory of the client cache
    #[arg(long, env = "FLEET_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// How long the cached client list stays valid (e.g. "24h")
    #[arg(long, env = "FLEET_CLIENTS_CACHE_VALIDITY", default_value = "24h")]
    clients_cache_validity: String,

    /// Lifetime of tokens minted for execution streams, in seconds
    #[arg(long, env = "FLEET_TOKEN_LIFETIME", default_value_t = fleet_client::DEFAULT_TOKEN_LIFETIME)]
    token_lifetime: u64,

    /// Give up on the execution after this long (e.g. "10m")
    #[arg(long, env = "FLEET_DEADLINE")]
    deadline: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(cli));
    // A confirmation read may still be blocked on stdin after an interrupt.
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::new(cli.api_url);
    config.api_user = cli.api_user;
    config.api_password = cli.api_password;
    config.api_token = cli.api_token;
    config.token_lifetime = cli.token_lifetime;
    config.cache_validity = Config::parse_cache_validity(&cli.clients_cache_validity)?;
    config.deadline = Config::parse_deadline(cli.deadline.as_deref());
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = dir;
    }
    config.validate()?;

    let deadline = config
        .deadline
        .map(|after| tokio::time::Instant::now() + after);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    handle_command(cli.command, &config, cancel, deadline).await
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

/// Cancel `cancel` on the first SIGINT or SIGTERM
#[cfg(unix)]
fn spawn_interrupt_handler(cancel: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                tracing::warn!(error = %err, "failed to register SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    tracing::warn!(error = %err, "failed to listen for SIGINT");
                    return;
                }
                tracing::info!("SIGINT received, stopping");
            }
            _ = sigterm.recv() => tracing::info!("SIGTERM received, stopping"),
        }
        cancel.cancel();
    });
}

#[cfg(not(unix))]
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, stopping");
                cancel.cancel();
            }
            Err(err) => tracing::warn!(error = %err, "failed to listen for interrupts"),
        }
    });
}
