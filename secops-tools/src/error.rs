use std::time::Duration;
use thiserror::Error;

/// Per-invocation failure. Every variant maps to exactly one [`ErrorCode`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("No targets provided")]
    EmptyInput,

    #[error("Tool '{tool}' cannot accept {count} target(s) with its declared input modes")]
    UnsupportedInputMode { tool: String, count: usize },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Binary not found: {binary} ({detail})")]
    BinaryNotFound { binary: String, detail: String },

    #[error("Operation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Malformed output: {0}")]
    MalformedOutput(String),

    #[error("Process exited with status {}", exit_label(.code))]
    NonZeroExit { code: Option<i32> },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

impl ToolError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ToolError::UnknownTool(_) => ErrorCode::UnknownToolError,
            ToolError::EmptyInput => ErrorCode::EmptyInputError,
            ToolError::UnsupportedInputMode { .. } => ErrorCode::UnsupportedInputModeError,
            ToolError::InvalidParameter { .. } => ErrorCode::InvalidParameterError,
            ToolError::BinaryNotFound { .. } => ErrorCode::BinaryNotFoundError,
            ToolError::Timeout(_) => ErrorCode::TimeoutError,
            ToolError::MalformedOutput(_) => ErrorCode::MalformedOutputError,
            ToolError::NonZeroExit { .. } => ErrorCode::NonZeroExitError,
            ToolError::ExecutionFailed(_) | ToolError::Internal(_) => ErrorCode::UnknownError,
        }
    }
}

/// Stable machine-readable failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorCode {
    UnknownToolError,
    EmptyInputError,
    UnsupportedInputModeError,
    InvalidParameterError,
    BinaryNotFoundError,
    TimeoutError,
    MalformedOutputError,
    NonZeroExitError,
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnknownToolError => "UnknownToolError",
            ErrorCode::EmptyInputError => "EmptyInputError",
            ErrorCode::UnsupportedInputModeError => "UnsupportedInputModeError",
            ErrorCode::InvalidParameterError => "InvalidParameterError",
            ErrorCode::BinaryNotFoundError => "BinaryNotFoundError",
            ErrorCode::TimeoutError => "TimeoutError",
            ErrorCode::MalformedOutputError => "MalformedOutputError",
            ErrorCode::NonZeroExitError => "NonZeroExitError",
            ErrorCode::UnknownError => "UnknownError",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Defects in the tool table itself. These surface once, while the registry
/// is being built, and are fatal for the host.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Invalid tool spec '{tool}': {reason}")]
    InvalidSpec { tool: String, reason: String },

    #[error("Invalid pattern for '{tool}': {source}")]
    InvalidPattern {
        tool: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown tool in override: {0}")]
    UnknownTool(String),
}

impl RegistryError {
    pub fn invalid(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        RegistryError::InvalidSpec {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}
