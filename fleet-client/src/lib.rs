//! Fleet Client
//!
//! A type-safe client for the remote management server.
//!
//! Two kinds of traffic go through this crate:
//! - plain HTTP calls (login, endpoint listing)
//! - the duplex execution stream, one submission followed by job results
//!
//! The pieces the CLI depends on are exposed as traits ([`EndpointSource`],
//! [`StreamConnector`], [`MessageStream`]) so they can be replaced in tests.
//!
//! # Example
//!
//! ```no_run
//! use fleet_client::{Auth, EndpointSource, FleetClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = FleetClient::new(
//!         "http://localhost:3000",
//!         Auth::Bearer { token: "token".to_string() },
//!     );
//!
//!     for endpoint in client.list_endpoints().await? {
//!         println!("{} {}", endpoint.id, endpoint.name);
//!     }
//!     Ok(())
//! }
//! ```

mod auth;
mod endpoints;
pub mod error;
mod stream;

pub use auth::Auth;
pub use endpoints::EndpointSource;
pub use error::{ClientError, Result};
pub use stream::{MessageStream, StreamConnector, WsTransport};

use fleet_core::dto::error::ApiErrors;
use reqwest::Client;
use serde::de::DeserializeOwned;

/// Default lifetime of tokens minted for execution streams, in seconds
pub const DEFAULT_TOKEN_LIFETIME: u64 = 600;

/// Client for the management server API
#[derive(Debug, Clone)]
pub struct FleetClient {
    /// Base URL of the server (e.g., "http://localhost:3000")
    base_url: String,
    /// HTTP client instance
    client: Client,
    auth: Auth,
    /// Lifetime requested for minted stream tokens, in seconds
    token_lifetime: u64,
}

impl FleetClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server API
    /// * `auth` - Authentication strategy used for every call
    pub fn new(base_url: impl Into<String>, auth: Auth) -> Self {
        Self::with_client(base_url, auth, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, auth: Auth, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            auth,
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
        }
    }

    /// Set the lifetime of tokens minted for execution streams
    pub fn with_token_lifetime(mut self, seconds: u64) -> Self {
        self.token_lifetime = seconds;
        self
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// Error responses carrying the server's error envelope are reported with
    /// the envelope's text rather than the raw body.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = ApiErrors::parse(&error_text)
                .map(|envelope| envelope.to_string())
                .unwrap_or(error_text);
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(ClientError::Authentication(message));
            }
            return Err(ClientError::api_error(status.as_u16(), message));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
