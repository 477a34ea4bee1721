//! Execution log record
//!
//! The persisted audit record of one submission. Used later to re-target only
//! the endpoints whose job failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::domain::job::{JobResult, JobStatus};

/// Audit record of one submission and its jobs
///
/// `num_clients` and `failed` are always derived from `jobs` by
/// [`ExecutionLogRecord::new`]; they are stored for readers of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLogRecord {
    pub executed_at: DateTime<Utc>,
    /// Operator who ran the submission
    pub executed_by: String,
    /// Host the submission was run from
    pub executed_on: String,
    pub api_user: String,
    pub api_url: String,
    pub api_auth: String,
    pub num_clients: usize,
    pub failed: usize,
    /// Jobs in arrival order
    pub jobs: Vec<JobResult>,
}

/// Header fields of an execution log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLogHeader {
    pub executed_at: DateTime<Utc>,
    pub executed_by: String,
    pub executed_on: String,
    pub api_user: String,
    pub api_url: String,
    pub api_auth: String,
}

/// An endpoint selected for replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedClient {
    pub id: String,
    pub name: String,
}

impl ExecutionLogRecord {
    /// Build a record, aggregating the endpoint counts from `jobs`
    pub fn new(header: ExecutionLogHeader, jobs: Vec<JobResult>) -> Self {
        let num_clients = count_clients(&jobs);
        let failed = count_failed_clients(&jobs);
        Self {
            executed_at: header.executed_at,
            executed_by: header.executed_by,
            executed_on: header.executed_on,
            api_user: header.api_user,
            api_url: header.api_url,
            api_auth: header.api_auth,
            num_clients,
            failed,
            jobs,
        }
    }

    /// Endpoints whose most recent job in the record failed
    ///
    /// Returned in order of first appearance in the job list.
    pub fn failed_clients(&self) -> Vec<FailedClient> {
        let mut order: Vec<&str> = Vec::new();
        let mut latest: HashMap<&str, &JobResult> = HashMap::new();

        for job in &self.jobs {
            if latest.insert(job.client_id.as_str(), job).is_none() {
                order.push(job.client_id.as_str());
            }
        }

        order
            .into_iter()
            .filter_map(|id| latest.get(id))
            .filter(|job| job.status == JobStatus::Failed)
            .map(|job| FailedClient {
                id: job.client_id.clone(),
                name: job.client_name.clone(),
            })
            .collect()
    }
}

/// Number of distinct endpoints present in `jobs`
pub fn count_clients(jobs: &[JobResult]) -> usize {
    jobs.iter()
        .map(|job| job.client_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Number of distinct endpoints with at least one failed job
pub fn count_failed_clients(jobs: &[JobResult]) -> usize {
    jobs.iter()
        .filter(|job| job.is_failed())
        .map(|job| job.client_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}
