//! Execution submission DTOs

use serde::{Deserialize, Serialize};

/// Submission sent once over the execution stream
///
/// Exactly one of `command` and `script` is set. `script` carries the
/// base64-encoded script body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub client_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_ids: Vec<String>,
    pub execute_concurrently: bool,
    pub abort_on_error: bool,
    pub sudo: bool,
    pub timeout_sec: u64,
    pub cwd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Interpreter name, empty for the server default
    pub interpreter: String,
}

/// Kind of submission, which selects the stream the request goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Command,
    Script,
}

impl SubmissionKind {
    /// Path segment of the websocket endpoint accepting this kind
    pub fn stream_path(&self) -> &'static str {
        match self {
            SubmissionKind::Command => "commands",
            SubmissionKind::Script => "scripts",
        }
    }
}

impl ExecutionRequest {
    pub fn kind(&self) -> SubmissionKind {
        if self.script.is_some() {
            SubmissionKind::Script
        } else {
            SubmissionKind::Command
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ExecutionRequest {
        ExecutionRequest {
            client_ids: vec!["1235".to_string()],
            group_ids: vec![],
            execute_concurrently: false,
            abort_on_error: false,
            sudo: false,
            timeout_sec: 30,
            cwd: String::new(),
            command: Some("uptime".to_string()),
            script: None,
            interpreter: String::new(),
        }
    }

    #[test]
    fn test_empty_groups_and_script_are_omitted() {
        let json = serde_json::to_value(request()).unwrap();

        assert!(json.get("group_ids").is_none());
        assert!(json.get("script").is_none());
        assert_eq!(json["command"], "uptime");
        assert_eq!(json["timeout_sec"], 30);
    }

    #[test]
    fn test_kind_follows_payload() {
        let mut req = request();
        assert_eq!(req.kind(), SubmissionKind::Command);
        assert_eq!(req.kind().stream_path(), "commands");

        req.command = None;
        req.script = Some("ZWNobyBoaQ==".to_string());
        assert_eq!(req.kind(), SubmissionKind::Script);
        assert_eq!(req.kind().stream_path(), "scripts");
    }
}
