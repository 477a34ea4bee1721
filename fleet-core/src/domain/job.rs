//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One server-side execution of a command or script on one endpoint
///
/// The server sends a whole record whenever the job changes state; the
/// client never merges records, it only replaces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// Job identifier, unique within a submission
    pub jid: String,
    pub status: JobStatus,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: String,
    /// Identifier of the submission this job belongs to
    #[serde(default)]
    pub multi_job_id: String,
    #[serde(default)]
    pub timeout_sec: u64,
    /// Error text, empty on success
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub result: Option<JobOutput>,
    #[serde(default)]
    pub is_sudo: bool,
    #[serde(default)]
    pub is_script: bool,
    #[serde(default)]
    pub interpreter: String,
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Done,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Captured process output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

impl JobResult {
    pub fn is_failed(&self) -> bool {
        self.status == JobStatus::Failed
    }

    pub fn stdout(&self) -> &str {
        self.result.as_ref().map(|r| r.stdout.as_str()).unwrap_or("")
    }

    pub fn stderr(&self) -> &str {
        self.result.as_ref().map(|r| r.stderr.as_str()).unwrap_or("")
    }
}
