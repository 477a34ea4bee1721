//! Authentication strategy and token minting

use reqwest::RequestBuilder;
use tracing::debug;

use crate::FleetClient;
use crate::error::{ClientError, Result};
use fleet_core::dto::response::{Data, LoginToken};

/// How requests to the management server are authorised
///
/// Chosen once when the configuration is resolved.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// Login and password; short-lived tokens are minted for streams
    Basic { login: String, password: String },
    /// Pre-issued bearer token, used as-is
    Bearer { token: String },
}

impl Auth {
    /// Label recorded in execution logs
    pub fn label(&self) -> &'static str {
        match self {
            Auth::Basic { .. } => "basic",
            Auth::Bearer { .. } => "bearer",
        }
    }

    /// Login name, if the strategy carries one
    pub fn login(&self) -> Option<&str> {
        match self {
            Auth::Basic { login, .. } => Some(login),
            Auth::Bearer { .. } => None,
        }
    }

    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Auth::Basic { login, password } => request.basic_auth(login, Some(password)),
            Auth::Bearer { token } => request.bearer_auth(token),
        }
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Basic { login, .. } => f
                .debug_struct("Basic")
                .field("login", login)
                .field("password", &"***")
                .finish(),
            Auth::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
        }
    }
}

impl FleetClient {
    /// Obtain a token for opening an execution stream
    ///
    /// Basic credentials are exchanged for a token valid for the configured
    /// lifetime; a bearer token is returned unchanged.
    pub async fn mint_token(&self) -> Result<String> {
        let (login, password) = match &self.auth {
            Auth::Bearer { token } => return Ok(token.clone()),
            Auth::Basic { login, password } => (login, password),
        };

        let url = format!("{}/api/v1/login", self.base_url);
        debug!(lifetime = self.token_lifetime, "requesting stream token");
        let response = self
            .client
            .get(&url)
            .query(&[("token-lifetime", self.token_lifetime.to_string())])
            .basic_auth(login, Some(password))
            .send()
            .await?;

        let body: Data<LoginToken> = self.handle_response(response).await?;
        if body.data.token.is_empty() {
            return Err(ClientError::Authentication(
                "server returned an empty token".to_string(),
            ));
        }

        Ok(body.data.token)
    }
}
