//! Execution log persistence
//!
//! A YAML audit record written once at the end of an invocation, and read
//! back by a later invocation to retry the endpoints whose job failed.

use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{ExecError, Result};
use crate::host::HostInfo;
use crate::prompt::Prompt;
use fleet_core::domain::execution_log::{ExecutionLogHeader, ExecutionLogRecord};
use fleet_core::domain::job::JobResult;

/// The API identity a submission was made with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub api_url: String,
    pub api_user: String,
    /// `basic` or `bearer`
    pub api_auth: String,
}

/// Ask before replacing an existing log file
///
/// Runs before anything is submitted. Non-interactive runs always overwrite.
pub async fn confirm_overwrite(path: &Path, interactive: bool, prompt: &dyn Prompt) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    if !interactive {
        debug!("Overwriting execution log {} without asking", path.display());
        return Ok(());
    }

    let question = format!("Execution log {} already exists. Overwrite it?", path.display());
    if prompt.confirm(&question).await? {
        Ok(())
    } else {
        Err(ExecError::OverwriteNotConfirmed)
    }
}

/// Persist the jobs of one submission
///
/// An empty job list is not written.
pub fn write_log(path: &Path, jobs: &[JobResult], host: &HostInfo, requester: &Requester) -> Result<()> {
    if jobs.is_empty() {
        warn!("No jobs received, execution log {} not written", path.display());
        return Ok(());
    }

    let record = ExecutionLogRecord::new(
        ExecutionLogHeader {
            executed_at: host.fetched_at,
            executed_by: host.username.clone(),
            executed_on: host.machine.clone(),
            api_user: requester.api_user.clone(),
            api_url: requester.api_url.clone(),
            api_auth: requester.api_auth.clone(),
        },
        jobs.to_vec(),
    );

    let write_error = |reason: String| ExecError::LogWrite {
        path: path.to_path_buf(),
        reason,
    };

    let document = serde_yaml::to_string(&record).map_err(|e| write_error(e.to_string()))?;
    std::fs::write(path, document).map_err(|e| write_error(e.to_string()))?;

    info!(
        clients = record.num_clients,
        failed = record.failed,
        "Execution log written to {}",
        path.display()
    );
    Ok(())
}

/// Read a previously written log
pub fn read_log(path: &Path) -> Result<ExecutionLogRecord> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ExecError::LogNotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(ExecError::LogRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_yaml::from_str(&raw).map_err(|source| ExecError::LogParse {
        path: path.to_path_buf(),
        source,
    })
}

/// IDs of the endpoints whose last job in the log failed
///
/// The endpoints are shown to the operator, who must accept them unless the
/// run is non-interactive.
pub async fn load_failed_client_ids(path: &Path, interactive: bool, prompt: &dyn Prompt) -> Result<Vec<String>> {
    let record = read_log(path)?;
    let failed = record.failed_clients();

    if failed.is_empty() {
        return Err(ExecError::NoClientIds);
    }

    let mut listing = format!("Failed clients in {}:", path.display());
    for client in &failed {
        listing.push_str(&format!("\n  {}  {}", client.id, client.name));
    }
    prompt.notify(&listing);

    if interactive && !prompt.confirm("Run on these clients?").await? {
        return Err(ExecError::ClientIdsNotConfirmed);
    }

    Ok(failed.into_iter().map(|client| client.id).collect())
}
