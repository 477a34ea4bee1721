//! Identity of the operator and the machine running the CLI

use chrono::{DateTime, Utc};
use sysinfo::System;

const UNKNOWN: &str = "unknown";

/// Who ran a submission, and from where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub username: String,
    pub machine: String,
    pub fetched_at: DateTime<Utc>,
}

/// Supplies the identity stamped on execution logs
pub trait HostInfoProvider: Send + Sync {
    fn host_info(&self) -> HostInfo;
}

/// Reads the identity from the local system
pub struct SystemHostInfo;

impl HostInfoProvider for SystemHostInfo {
    fn host_info(&self) -> HostInfo {
        let username = ["USER", "USERNAME"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());

        HostInfo {
            username,
            machine: System::host_name().unwrap_or_else(|| UNKNOWN.to_string()),
            fetched_at: Utc::now(),
        }
    }
}
