//! Error envelope returned by the management server

use serde::{Deserialize, Serialize};

/// List of errors as sent by the server, over HTTP or the execution stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrors {
    pub errors: Vec<ApiError>,
}

/// A single server-side error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

impl ApiErrors {
    /// Parse an error envelope, requiring at least one error entry
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str::<ApiErrors>(raw)
            .ok()
            .filter(|envelope| !envelope.errors.is_empty())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.title.is_empty(), self.detail.is_empty()) {
            (false, false) => write!(f, "{}: {}", self.title, self.detail)?,
            (false, true) => write!(f, "{}", self.title)?,
            (true, false) => write!(f, "{}", self.detail)?,
            (true, true) => write!(f, "unknown error")?,
        }
        if !self.code.is_empty() {
            write!(f, " (code {})", self.code)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for ApiErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelope() {
        let raw = r#"{"errors":[{"code":"","title":"client not found","detail":"id 999"}]}"#;
        let envelope = ApiErrors::parse(raw).unwrap();

        assert_eq!(envelope.errors.len(), 1);
        assert_eq!(envelope.to_string(), "client not found: id 999");
    }

    #[test]
    fn test_empty_or_foreign_payload_is_not_an_envelope() {
        assert!(ApiErrors::parse(r#"{"errors":[]}"#).is_none());
        assert!(ApiErrors::parse(r#"{"jid":"1"}"#).is_none());
        assert!(ApiErrors::parse("not json").is_none());
    }

    #[test]
    fn test_display_includes_code() {
        let error = ApiError {
            code: "ERR_TIMEOUT".to_string(),
            title: "timeout".to_string(),
            detail: String::new(),
        };
        assert_eq!(error.to_string(), "timeout (code ERR_TIMEOUT)");
    }
}
