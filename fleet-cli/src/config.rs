//! Configuration module
//!
//! Built once by `main` from command-line arguments and their environment
//! variables, then passed by reference to every component.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use fleet_client::{Auth, DEFAULT_TOKEN_LIFETIME};

/// Default validity window of the endpoint cache
pub const DEFAULT_CACHE_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

const CLIENTS_CACHE_FILE: &str = "clients.json";

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the management server API
    pub api_url: String,

    pub api_user: Option<String>,

    pub api_password: Option<String>,

    /// Pre-issued bearer token, used when no basic credentials are set
    pub api_token: Option<String>,

    /// Lifetime of tokens minted for execution streams, in seconds
    pub token_lifetime: u64,

    /// Directory holding the endpoint cache
    pub cache_dir: PathBuf,

    /// How long a cached endpoint catalog stays valid
    pub cache_validity: Duration,

    /// Overall deadline for one invocation, if any
    pub deadline: Option<Duration>,
}

impl Config {
    /// Creates a configuration with defaults for everything but the URL
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_user: None,
            api_password: None,
            api_token: None,
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            cache_dir: default_cache_dir(),
            cache_validity: DEFAULT_CACHE_VALIDITY,
            deadline: None,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            anyhow::bail!("api_url cannot be empty");
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("api_url must start with http:// or https://");
        }

        if self.token_lifetime == 0 {
            anyhow::bail!("token_lifetime must be greater than 0");
        }

        Ok(())
    }

    /// Select the authentication strategy
    ///
    /// Basic credentials win when both login and password are present,
    /// otherwise a bearer token is used.
    pub fn auth(&self) -> Result<Auth> {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

        match (
            non_empty(&self.api_user),
            non_empty(&self.api_password),
            non_empty(&self.api_token),
        ) {
            (Some(login), Some(password), _) => Ok(Auth::Basic { login, password }),
            (_, _, Some(token)) => Ok(Auth::Bearer { token }),
            (Some(_), None, None) => {
                anyhow::bail!("api_password or api_token is required for user authentication")
            }
            _ => anyhow::bail!("no credentials configured: set api_user/api_password or api_token"),
        }
    }

    /// Path of the endpoint cache file
    pub fn clients_cache_path(&self) -> PathBuf {
        self.cache_dir.join(CLIENTS_CACHE_FILE)
    }

    /// Parse the cache validity window (e.g. "24h", "30m")
    pub fn parse_cache_validity(raw: &str) -> Result<Duration> {
        humantime::parse_duration(raw)
            .with_context(|| format!("invalid cache validity '{}'", raw))
    }

    /// Parse the invocation deadline
    ///
    /// An unparseable value is reported and treated as no deadline.
    pub fn parse_deadline(raw: Option<&str>) -> Option<Duration> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }

        match humantime::parse_duration(raw) {
            Ok(deadline) => Some(deadline),
            Err(e) => {
                warn!("Ignoring unparseable deadline '{}': {}", raw, e);
                None
            }
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("fleet")
}
