use crate::error::ToolError;

const MAX_ARGUMENT_LEN: usize = 4096;
const LINE_BREAKING_CHARS: &[char] = &['\n', '\r', '\0'];

/// Screens caller-supplied strings before they become argv entries.
///
/// Arguments go straight to execve, so shell metacharacters are inert. What
/// still matters: a value that starts with `-` can be parsed as an option by
/// the wrapped tool, and a line break inside a target would split one target
/// into two once the list is piped through stdin.
pub struct ArgumentGuard;

impl ArgumentGuard {
    pub fn validate_target(target: &str) -> Result<(), ToolError> {
        Self::validate_value("targets", target)
    }

    pub fn validate_value(name: &str, value: &str) -> Result<(), ToolError> {
        Self::validate_literal(name, value)?;
        Self::reject_option_like(name, value)
    }

    /// Every rule except the leading `-` one. For values whose content is
    /// already fixed by a declared pattern and which reach argv as the
    /// argument of a flag, where `-` is a legal value (`nmap -p -`).
    pub fn validate_literal(name: &str, value: &str) -> Result<(), ToolError> {
        if value.trim().is_empty() {
            return Err(ToolError::invalid(name, "blank value"));
        }

        if value.len() > MAX_ARGUMENT_LEN {
            return Err(ToolError::invalid(
                name,
                format!("value exceeds {} bytes", MAX_ARGUMENT_LEN),
            ));
        }

        for &ch in LINE_BREAKING_CHARS {
            if value.contains(ch) {
                return Err(ToolError::invalid(
                    name,
                    format!("line-breaking character {:?} in value", ch),
                ));
            }
        }

        if value.chars().any(|c| c.is_control() && c != '\t') {
            return Err(ToolError::invalid(name, "control character in value"));
        }

        Ok(())
    }

    pub fn reject_option_like(name: &str, value: &str) -> Result<(), ToolError> {
        if value.trim_start().starts_with('-') {
            return Err(ToolError::invalid(
                name,
                format!("value '{}' would be read as an option", value),
            ));
        }
        Ok(())
    }
}
