//! Command and script execution handlers

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use std::io;
use std::path::{Path, PathBuf};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::EndpointCache;
use crate::config::Config;
use crate::execution::log::Requester;
use crate::execution::request::{DEFAULT_TIMEOUT_SEC, RequestOptions, interpreter_for, read_script};
use crate::execution::{
    ExecutionSummary, Executor, Invocation, JobRenderer, JsonRenderer, Targeting, TextRenderer,
};
use crate::host::SystemHostInfo;
use crate::prompt::StdPrompt;
use crate::types::TargetSelector;
use fleet_client::FleetClient;

/// Which endpoints to run on; exactly one may be given
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// Comma-separated client IDs
    #[arg(long, default_value = "")]
    pub ids: String,

    /// Comma-separated exact client names
    #[arg(long, default_value = "")]
    pub names: String,

    /// Comma-separated name prefixes, every match is targeted
    #[arg(long, default_value = "")]
    pub search: String,

    /// Comma-separated client group IDs
    #[arg(long, default_value = "")]
    pub groups: String,
}

impl TargetArgs {
    fn is_empty(&self) -> bool {
        [&self.ids, &self.names, &self.search, &self.groups]
            .iter()
            .all(|value| value.trim().is_empty())
    }
}

/// How to run, and what to record
#[derive(Args, Debug)]
pub struct ExecutionArgs {
    /// Working directory on the endpoint
    #[arg(long, default_value = "")]
    pub cwd: String,

    /// Per-job timeout on the endpoint, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SEC)]
    pub timeout: u64,

    /// Run on all endpoints at once instead of one after another
    #[arg(long)]
    pub concurrent: bool,

    #[arg(long)]
    pub sudo: bool,

    /// Stop at the first failed job
    #[arg(long)]
    pub abort_on_error: bool,

    /// Interpreter for the command or script
    #[arg(long)]
    pub interpreter: Option<String>,

    /// Write an execution log to this file
    #[arg(long)]
    pub write_execution_log: Option<PathBuf>,

    /// Retry the clients that failed in this execution log
    #[arg(long)]
    pub read_execution_log: Option<PathBuf>,

    /// Never ask for confirmation
    #[arg(long)]
    pub no_prompt: bool,

    /// Print one JSON document per job
    #[arg(long)]
    pub json: bool,
}

impl ExecutionArgs {
    fn options(&self) -> RequestOptions {
        RequestOptions {
            interpreter: self.interpreter.clone().unwrap_or_default(),
            cwd: self.cwd.clone(),
            timeout_sec: self.timeout,
            execute_concurrently: self.concurrent,
            sudo: self.sudo,
            abort_on_error: self.abort_on_error,
            ..Default::default()
        }
    }
}

/// Run a shell command
pub async fn run_command(
    command: String,
    targets: &TargetArgs,
    execution: &ExecutionArgs,
    config: &Config,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<()> {
    let options = RequestOptions {
        command,
        ..execution.options()
    };

    execute(options, targets, execution, config, cancel, deadline).await
}

/// Upload and run a script file
pub async fn run_script(
    script: &Path,
    targets: &TargetArgs,
    execution: &ExecutionArgs,
    config: &Config,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<()> {
    let mut options = RequestOptions {
        script: read_script(script)?,
        ..execution.options()
    };

    if options.interpreter.is_empty() {
        match interpreter_for(script) {
            Some(interpreter) => {
                debug!("Using interpreter {} for {}", interpreter, script.display());
                options.interpreter = interpreter.to_string();
            }
            None => debug!("No interpreter known for {}, using server default", script.display()),
        }
    }

    execute(options, targets, execution, config, cancel, deadline).await
}

async fn execute(
    options: RequestOptions,
    targets: &TargetArgs,
    execution: &ExecutionArgs,
    config: &Config,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<()> {
    let targeting = match &execution.read_execution_log {
        Some(path) => {
            if !targets.is_empty() {
                warn!("Targeting flags are ignored when replaying {}", path.display());
            }
            Targeting::Replay(path.clone())
        }
        None => Targeting::Select(TargetSelector::from_flags(
            &targets.ids,
            &targets.names,
            &targets.search,
            &targets.groups,
        )?),
    };

    let auth = config.auth()?;
    let requester = Requester {
        api_url: config.api_url.clone(),
        api_user: auth.login().unwrap_or_default().to_string(),
        api_auth: auth.label().to_string(),
    };
    let client = FleetClient::new(&config.api_url, auth).with_token_lifetime(config.token_lifetime);
    let cache = EndpointCache::new(config.clients_cache_path(), config.cache_validity);
    debug!("Client cache at {}", cache.path().display());

    let executor = Executor {
        source: &client,
        cache: Some(&cache),
        connector: &client,
        prompt: &StdPrompt,
        host: &SystemHostInfo,
        requester,
    };

    let invocation = Invocation {
        targeting,
        options,
        log_path: execution.write_execution_log.clone(),
        interactive: !execution.no_prompt,
    };

    let mut renderer: Box<dyn JobRenderer> = if execution.json {
        Box::new(JsonRenderer::new(io::stdout()))
    } else {
        Box::new(TextRenderer::new(io::stdout()))
    };

    let summary = executor
        .run(&invocation, renderer.as_mut(), cancel, deadline)
        .await
        .context("Execution failed")?;

    print_summary(&summary);
    Ok(())
}

/// Print the totals on stderr, keeping stdout for job output
fn print_summary(summary: &ExecutionSummary) {
    let totals = format!("{} job(s) received, {} client(s) failed", summary.jobs, summary.failed);

    if summary.cancelled {
        eprintln!("{} {}", "Interrupted:".yellow().bold(), totals);
    } else if summary.failed > 0 {
        eprintln!("{}", totals.red());
    } else {
        eprintln!("{}", totals.green());
    }
}
