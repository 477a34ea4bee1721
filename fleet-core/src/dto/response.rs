//! Response envelopes of the management server's HTTP API

use serde::{Deserialize, Serialize};

/// Successful response body: `{"data": ..., "meta": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data<T> {
    pub data: T,
    #[serde(default)]
    pub meta: Option<Meta>,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    /// Total number of items across all pages
    pub count: usize,
}

/// Body of a successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginToken {
    pub token: String,
}
