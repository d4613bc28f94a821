//! Maps failures onto the closed error taxonomy.

use crate::error::{ErrorCode, ToolError};
use crate::executor::ExecutionResult;
use crate::result::ErrorPayload;
use crate::spec::{InputMode, ToolSpec};

pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Decides whether a finished run is itself a failure, before any parsing.
    /// Only stderr is searched for impostor markers here; stdout carries
    /// target-controlled text (page titles, banners).
    pub fn inspect(spec: &ToolSpec, execution: &ExecutionResult) -> Option<ToolError> {
        if let Some(error) = impostor(spec, &execution.stderr) {
            return Some(error);
        }

        if execution.timed_out {
            return Some(ToolError::Timeout(execution.duration));
        }

        if spec.exit_code_significant && execution.exit_code != Some(0) {
            return Some(ToolError::NonZeroExit {
                code: execution.exit_code,
            });
        }

        None
    }

    /// Second look at a run whose stdout yielded no findings: an impostor that
    /// prints its complaint to stdout is only recognisable here.
    pub fn inspect_unparsed(spec: &ToolSpec, execution: &ExecutionResult) -> Option<ToolError> {
        impostor(spec, &execution.stdout)
    }

    /// Produces the caller-facing payload. Depends only on the error and the
    /// tool contract.
    pub fn classify(error: &ToolError, spec: Option<&ToolSpec>) -> ErrorPayload {
        let code = error.code();
        let remediation = remediation(code, error, spec);
        let message = match code {
            // Install instructions travel with the message too.
            ErrorCode::BinaryNotFoundError => format!("{}. {}", error, remediation),
            _ => error.to_string(),
        };
        ErrorPayload {
            code,
            message,
            remediation,
        }
    }

    /// Tail of stderr (or stdout when stderr is empty), at most `limit` bytes.
    pub fn excerpt(execution: &ExecutionResult, limit: usize) -> Option<String> {
        let source = if execution.stderr.trim().is_empty() {
            execution.stdout.trim()
        } else {
            execution.stderr.trim()
        };
        if source.is_empty() || limit == 0 {
            return None;
        }
        Some(tail(source, limit).to_string())
    }
}

fn impostor(spec: &ToolSpec, text: &str) -> Option<ToolError> {
    if spec.impostor_markers.is_empty() {
        return None;
    }
    let text = text.to_lowercase();
    let marker = spec.impostor_markers.iter().find(|m| text.contains(m.as_str()))?;
    Some(ToolError::BinaryNotFound {
        binary: spec.binary.clone(),
        detail: format!("a different program answered as '{}' ({})", spec.binary, marker),
    })
}

fn tail(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

fn remediation(code: ErrorCode, error: &ToolError, spec: Option<&ToolSpec>) -> String {
    match code {
        ErrorCode::UnknownToolError => {
            "Call one of the registered tools; names are case-sensitive.".to_string()
        }
        ErrorCode::EmptyInputError => "Pass at least one target.".to_string(),
        ErrorCode::UnsupportedInputModeError => match spec {
            Some(spec) if !spec.supports(InputMode::List) => {
                format!("{} takes exactly one target per call; split the list.", spec.name)
            }
            _ => "This tool cannot take targets through any supported input mode.".to_string(),
        },
        ErrorCode::InvalidParameterError => {
            let ToolError::InvalidParameter { name, .. } = error else {
                return "Check the parameter types against the tool schema.".to_string();
            };
            match spec.and_then(|s| s.flag(name)) {
                Some(flag) => format!(
                    "Pass '{}' as a {} value{}.",
                    name,
                    flag.kind.json_type(),
                    if flag.description.is_empty() {
                        String::new()
                    } else {
                        format!(" ({})", flag.description)
                    }
                ),
                None if name == "request" => {
                    "Send a JSON object with tool_name, targets and options.".to_string()
                }
                None if name == "targets" => {
                    "Targets must be single-line values that do not start with '-'.".to_string()
                }
                None => format!("Remove '{}'; it is not a parameter of this tool.", name),
            }
        }
        ErrorCode::BinaryNotFoundError => match spec {
            Some(spec) => spec.install_hint.clone(),
            None => "Install the tool and make sure it is on PATH.".to_string(),
        },
        ErrorCode::TimeoutError => {
            "Narrow the target set or pass a larger timeout_secs; the scan was not retried."
                .to_string()
        }
        ErrorCode::MalformedOutputError => {
            "The tool output could not be parsed; check raw_excerpt and the installed tool version."
                .to_string()
        }
        ErrorCode::NonZeroExitError => {
            "The tool reported a failure; raw_excerpt holds its stderr.".to_string()
        }
        ErrorCode::UnknownError => {
            "Unexpected failure; raw_excerpt holds the captured diagnostics.".to_string()
        }
    }
}
