//! Target delivery-mode resolution.

use tracing::debug;

use crate::error::ToolError;
use crate::sandbox::ArgumentGuard;
use crate::spec::{InputMode, ToolSpec};

/// Outcome of mode resolution for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedInput {
    /// One target passed directly on the command line.
    Single(String),
    /// Targets newline-joined into a stdin payload.
    List { payload: String, count: usize },
}

impl ResolvedInput {
    pub fn mode(&self) -> InputMode {
        match self {
            ResolvedInput::Single(_) => InputMode::Single,
            ResolvedInput::List { .. } => InputMode::List,
        }
    }

    pub fn target_count(&self) -> usize {
        match self {
            ResolvedInput::Single(_) => 1,
            ResolvedInput::List { count, .. } => *count,
        }
    }
}

pub struct InputResolver;

impl InputResolver {
    /// Picks the delivery mode for `targets`.
    ///
    /// A lone target goes through the direct flag whenever the tool has one;
    /// stdin is used only for real lists or list-only tools. Nothing reaches a
    /// process when the list is empty.
    pub fn resolve(spec: &ToolSpec, targets: &[String]) -> Result<ResolvedInput, ToolError> {
        if targets.is_empty() {
            return Err(ToolError::EmptyInput);
        }

        for target in targets {
            ArgumentGuard::validate_target(target)?;
        }

        let resolved = if targets.len() == 1 && spec.supports(InputMode::Single) {
            ResolvedInput::Single(targets[0].trim().to_string())
        } else if spec.supports(InputMode::List) {
            ResolvedInput::List {
                payload: targets
                    .iter()
                    .map(|t| t.trim())
                    .collect::<Vec<_>>()
                    .join("\n"),
                count: targets.len(),
            }
        } else {
            return Err(ToolError::UnsupportedInputMode {
                tool: spec.name.clone(),
                count: targets.len(),
            });
        };

        debug!(
            "Resolved {} target(s) for {} as {:?}",
            targets.len(),
            spec.name,
            resolved.mode()
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Render;

    fn single_only() -> ToolSpec {
        ToolSpec::builder("single_only", "true")
            .single(Render::flag("-u"))
            .build()
            .unwrap()
    }

    fn list_only() -> ToolSpec {
        ToolSpec::builder("list_only", "true")
            .list(&["-i", "/dev/stdin"])
            .build()
            .unwrap()
    }

    fn both() -> ToolSpec {
        ToolSpec::builder("both", "true")
            .single(Render::flag("-u"))
            .list(&["-l", "-"])
            .build()
            .unwrap()
    }

    fn targets(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_empty_targets_rejected() {
        for spec in [single_only(), list_only(), both()] {
            assert_eq!(InputResolver::resolve(&spec, &[]), Err(ToolError::EmptyInput));
        }
    }

    #[test]
    fn test_single_target_uses_direct_flag() {
        let resolved = InputResolver::resolve(&both(), &targets(&["https://example.com"])).unwrap();
        assert_eq!(resolved, ResolvedInput::Single("https://example.com".into()));
    }

    #[test]
    fn test_single_target_on_list_only_tool_goes_to_stdin() {
        let resolved = InputResolver::resolve(&list_only(), &targets(&["https://a.com"])).unwrap();
        assert_eq!(
            resolved,
            ResolvedInput::List {
                payload: "https://a.com".into(),
                count: 1
            }
        );
    }

    #[test]
    fn test_many_targets_join_in_order() {
        let resolved =
            InputResolver::resolve(&both(), &targets(&["https://a.com", "http://b.com"])).unwrap();
        assert_eq!(
            resolved,
            ResolvedInput::List {
                payload: "https://a.com\nhttp://b.com".into(),
                count: 2
            }
        );
    }

    #[test]
    fn test_many_targets_on_single_only_tool_unsupported() {
        let result = InputResolver::resolve(&single_only(), &targets(&["a.com", "b.com"]));
        assert!(matches!(result, Err(ToolError::UnsupportedInputMode { count: 2, .. })));
    }

    #[test]
    fn test_no_input_tool_cannot_take_targets() {
        let spec = ToolSpec::builder("quiet", "true").no_input().build().unwrap();
        let result = InputResolver::resolve(&spec, &targets(&["a.com"]));
        assert!(matches!(result, Err(ToolError::UnsupportedInputMode { .. })));
    }

    #[test]
    fn test_injected_target_rejected() {
        let result = InputResolver::resolve(&both(), &targets(&["a.com", "-oX /tmp/x"]));
        assert!(matches!(result, Err(ToolError::InvalidParameter { .. })));
    }
}
