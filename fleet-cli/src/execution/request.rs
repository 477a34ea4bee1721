//! Execution request builder

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;

use crate::error::{ExecError, Result};
use crate::types::ResolvedTargets;
use fleet_core::dto::execution::ExecutionRequest;

/// Default remote timeout per job, in seconds
pub const DEFAULT_TIMEOUT_SEC: u64 = 30;

/// Interpreter used for a script when none is given, keyed by file extension
const INTERPRETERS_BY_EXTENSION: &[(&str, &str)] = &[
    ("ps1", "powershell"),
    ("bat", "cmd"),
    ("cmd", "cmd"),
    ("sh", "sh"),
    ("bash", "bash"),
    ("py", "python3"),
];

/// What to run and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Shell command, empty when running a script
    pub command: String,
    /// Base64-encoded script body, empty when running a command
    pub script: String,
    pub interpreter: String,
    pub cwd: String,
    pub timeout_sec: u64,
    pub execute_concurrently: bool,
    pub sudo: bool,
    pub abort_on_error: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            command: String::new(),
            script: String::new(),
            interpreter: String::new(),
            cwd: String::new(),
            timeout_sec: DEFAULT_TIMEOUT_SEC,
            execute_concurrently: false,
            sudo: false,
            abort_on_error: false,
        }
    }
}

/// Build the submission payload
///
/// # Errors
/// Fails if not exactly one of command and script is set, if nothing is
/// targeted, or if the timeout is zero.
pub fn build_request(targets: &ResolvedTargets, options: &RequestOptions) -> Result<ExecutionRequest> {
    let (command, script) = match (options.command.is_empty(), options.script.is_empty()) {
        (false, true) => (Some(options.command.clone()), None),
        (true, false) => (None, Some(options.script.clone())),
        (true, true) => return Err(ExecError::InvalidRequest("either command or script is required")),
        (false, false) => {
            return Err(ExecError::InvalidRequest(
                "command and script cannot be used together",
            ));
        }
    };

    if targets.client_ids.is_empty() && targets.group_ids.is_empty() {
        return Err(ExecError::InvalidRequest("no clients or groups to run on"));
    }

    if options.timeout_sec == 0 {
        return Err(ExecError::InvalidRequest("timeout must be a positive number of seconds"));
    }

    Ok(ExecutionRequest {
        client_ids: targets.client_ids.clone(),
        group_ids: targets.group_ids.clone(),
        execute_concurrently: options.execute_concurrently,
        abort_on_error: options.abort_on_error,
        sudo: options.sudo,
        timeout_sec: options.timeout_sec,
        cwd: options.cwd.clone(),
        command,
        script,
        interpreter: options.interpreter.clone(),
    })
}

/// Base64-encode a script body for submission
pub fn encode_script(body: &[u8]) -> String {
    STANDARD.encode(body)
}

/// Read a script file and encode it for submission
pub fn read_script(path: &Path) -> Result<String> {
    let body = std::fs::read(path).map_err(|source| ExecError::ScriptRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(encode_script(&body))
}

/// Interpreter for a script file, inferred from its extension
pub fn interpreter_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    INTERPRETERS_BY_EXTENSION
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, interpreter)| *interpreter)
}
