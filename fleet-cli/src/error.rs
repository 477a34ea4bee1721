//! Errors raised while targeting, executing and logging a submission

use std::path::PathBuf;

use fleet_client::ClientError;
use fleet_core::dto::error::ApiErrors;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExecError>;

#[derive(Debug, Error)]
pub enum ExecError {
    // User input
    #[error("multiple targeting options: use only one of {0}")]
    MultipleTargeting(String),

    #[error("no targeting option: provide client ids, names, a search term or group ids")]
    NoTargets,

    #[error("unknown client(s) '{0}'")]
    UnknownClients(String),

    #[error(
        "ambiguous client name '{name}' matches {matches}: use a more specific name or the client id"
    )]
    AmbiguousName { name: String, matches: String },

    #[error("invalid execution request: {0}")]
    InvalidRequest(&'static str),

    #[error("failed to read script {path}: {source}")]
    ScriptRead {
        path: PathBuf,
        source: std::io::Error,
    },

    // Resolution and transport
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("failed to read client cache {path}: {reason}")]
    CacheRead { path: PathBuf, reason: String },

    #[error("failed to write client cache {path}: {reason}")]
    CacheWrite { path: PathBuf, reason: String },

    // Protocol
    #[error("server error: {0}")]
    Server(ApiErrors),

    #[error("cannot recognize message: {0}")]
    UnrecognizedMessage(String),

    #[error("execution deadline exceeded")]
    DeadlineExceeded,

    #[error("failed to render job output: {0}")]
    Render(std::io::Error),

    // Confirmation gates
    #[error("overwrite not confirmed")]
    OverwriteNotConfirmed,

    #[error("client IDs not confirmed")]
    ClientIdsNotConfirmed,

    #[error("no client IDs to use")]
    NoClientIds,

    #[error("failed to read confirmation: {0}")]
    Prompt(std::io::Error),

    // Persistence
    #[error("execution log {0} not found")]
    LogNotFound(PathBuf),

    #[error("failed to read execution log {path}: {source}")]
    LogRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed execution log {path}: {source}")]
    LogParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to write execution log {path}: {reason}")]
    LogWrite { path: PathBuf, reason: String },

    /// The stream failed, then the log of its partial results failed too
    #[error("{stream} (execution log also failed: {log})")]
    LogAfterFailure {
        stream: Box<ExecError>,
        log: Box<ExecError>,
    },
}
