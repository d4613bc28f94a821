use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::normalizer::Finding;
use crate::spec::InputMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Classified failure returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
    pub remediation: String,
}

/// Diagnostics that are present on every result, success or not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub tool: String,
    pub invocation_id: String,
    pub delivery_mode: Option<InputMode>,
    pub target_count: usize,
    pub exit_code: Option<i32>,
    pub duration_ms: Option<u64>,
    pub timed_out: bool,
    pub skipped_lines: usize,
    pub truncated: bool,
}

/// The single value every invocation produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: Status,
    pub findings: Vec<Finding>,
    pub error: Option<ErrorPayload>,
    pub raw_excerpt: Option<String>,
    pub metadata: ResultMetadata,
}

impl ToolResult {
    pub fn ok(findings: Vec<Finding>, raw_excerpt: Option<String>, metadata: ResultMetadata) -> Self {
        Self {
            status: Status::Ok,
            findings,
            error: None,
            raw_excerpt,
            metadata,
        }
    }

    pub fn error(error: ErrorPayload, raw_excerpt: Option<String>, metadata: ResultMetadata) -> Self {
        Self {
            status: Status::Error,
            findings: Vec::new(),
            error: Some(error),
            raw_excerpt,
            metadata,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_keys_are_uniform() {
        let ok = ToolResult::ok(Vec::new(), None, ResultMetadata::default());
        let err = ToolResult::error(
            ErrorPayload {
                code: ErrorCode::EmptyInputError,
                message: "No targets provided".into(),
                remediation: "Pass at least one target".into(),
            },
            None,
            ResultMetadata::default(),
        );

        for result in [ok, err] {
            let value = serde_json::to_value(&result).unwrap();
            let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
            keys.sort();
            assert_eq!(keys, vec!["error", "findings", "metadata", "raw_excerpt", "status"]);
        }
    }

    #[test]
    fn test_error_code_spelling() {
        let payload = ErrorPayload {
            code: ErrorCode::InvalidParameterError,
            message: String::new(),
            remediation: String::new(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["code"], json!("InvalidParameterError"));
        assert_eq!(serde_json::to_value(Status::Ok).unwrap(), json!("ok"));
    }
}
