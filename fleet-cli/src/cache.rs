//! Endpoint catalog cache
//!
//! A JSON file holding the last fetched catalog and when it was written.
//! Entries older than the validity window are treated as missing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{ExecError, Result};
use fleet_core::domain::endpoint::Endpoint;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    written_at: DateTime<Utc>,
    endpoints: Vec<Endpoint>,
}

/// File-backed cache of the endpoint catalog
#[derive(Debug, Clone)]
pub struct EndpointCache {
    path: PathBuf,
    validity: Duration,
}

impl EndpointCache {
    pub fn new(path: impl Into<PathBuf>, validity: Duration) -> Self {
        Self {
            path: path.into(),
            validity,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached catalog if present and still valid
    pub fn load(&self) -> Result<Option<Vec<Endpoint>>> {
        self.load_at(Utc::now())
    }

    fn load_at(&self, now: DateTime<Utc>) -> Result<Option<Vec<Endpoint>>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No endpoint cache at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(self.read_error(e)),
        };

        let cached: CacheFile = serde_json::from_str(&raw).map_err(|e| self.read_error(e))?;

        let age = now.signed_duration_since(cached.written_at);
        let fresh = age
            .to_std()
            .map(|age| age < self.validity)
            .unwrap_or(true);
        if !fresh {
            debug!("Endpoint cache expired (written at {})", cached.written_at);
            return Ok(None);
        }

        Ok(Some(cached.endpoints))
    }

    /// Replace the cached catalog
    pub fn store(&self, endpoints: &[Endpoint]) -> Result<()> {
        self.store_at(endpoints, Utc::now())
    }

    fn store_at(&self, endpoints: &[Endpoint], now: DateTime<Utc>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| self.write_error(e))?;
        }

        let payload = serde_json::to_vec(&CacheFile {
            written_at: now,
            endpoints: endpoints.to_vec(),
        })
        .map_err(|e| self.write_error(e))?;

        std::fs::write(&self.path, payload).map_err(|e| self.write_error(e))?;
        debug!(
            "Cached {} endpoint(s) at {}",
            endpoints.len(),
            self.path.display()
        );
        Ok(())
    }

    fn read_error(&self, reason: impl std::fmt::Display) -> ExecError {
        ExecError::CacheRead {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn write_error(&self, reason: impl std::fmt::Display) -> ExecError {
        ExecError::CacheWrite {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}
