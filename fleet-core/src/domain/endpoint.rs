//! Endpoint domain model
//!
//! Represents a managed host reachable through the management server.

use serde::{Deserialize, Serialize};

/// A managed endpoint ("client" in the server's API)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Opaque identifier assigned by the server
    pub id: String,

    /// Human display name
    #[serde(default)]
    pub name: String,

    /// Current connection state
    #[serde(default)]
    pub connection_state: ConnectionState,

    /// Operating system description
    #[serde(default)]
    pub os: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub ipv4: Vec<String>,

    #[serde(default)]
    pub ipv6: Vec<String>,

    /// Public address the endpoint connected from
    #[serde(default)]
    pub address: String,
}

/// Connection state of an endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
        }
    }
}

impl Endpoint {
    /// Case-insensitive prefix match of `term` against the display name
    pub fn name_starts_with(&self, term: &str) -> bool {
        self.name.to_lowercase().starts_with(&term.to_lowercase())
    }
}
