//! Declarative description of one wrapped binary's invocation contract.
//!
//! Adding a tool is a data addition: a [`ToolSpec`] says how targets reach the
//! binary, how each logical parameter is typed and rendered, and how stdout is
//! read back. Nothing in the shared pipeline branches on a tool name.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use crate::error::RegistryError;

/// How target input reaches the wrapped tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// One target passed as a direct argument.
    Single,
    /// Newline-joined targets written to stdin.
    List,
    /// The tool takes no target input.
    None,
}

/// Type of a logical parameter. Values are coerced to this before rendering.
#[derive(Debug, Clone)]
pub enum ValueKind {
    Integer { min: i64, max: i64 },
    IntegerList { min: i64, max: i64 },
    Text,
    TextList,
    Bool,
    Choice(Vec<String>),
    ChoiceList(Vec<String>),
    /// Named aliases resolve to integers; bare integers pass through.
    Aliased {
        aliases: Vec<(String, i64)>,
        min: i64,
        max: i64,
    },
    Pattern(Regex),
    FilePath,
}

impl ValueKind {
    pub fn choice(values: &[&str]) -> Self {
        ValueKind::Choice(values.iter().map(|v| v.to_string()).collect())
    }

    pub fn choice_list(values: &[&str]) -> Self {
        ValueKind::ChoiceList(values.iter().map(|v| v.to_string()).collect())
    }

    pub fn pattern(tool: &str, pattern: &str) -> Result<Self, RegistryError> {
        Regex::new(pattern)
            .map(ValueKind::Pattern)
            .map_err(|source| RegistryError::InvalidPattern {
                tool: tool.to_string(),
                source,
            })
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self,
            ValueKind::IntegerList { .. } | ValueKind::TextList | ValueKind::ChoiceList(_)
        )
    }

    /// JSON type name used in the published tool schema.
    pub fn json_type(&self) -> &'static str {
        match self {
            ValueKind::Integer { .. } => "integer",
            ValueKind::Bool => "boolean",
            ValueKind::IntegerList { .. } | ValueKind::TextList | ValueKind::ChoiceList(_) => {
                "array"
            }
            _ => "string",
        }
    }
}

/// Where a rendered value lands in argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Render {
    /// `flag value`
    Flag(String),
    /// `flag` when true, nothing when false.
    Switch(String),
    /// `prefix` immediately followed by the value, e.g. `-sV`.
    Attached(String),
    /// The bare value.
    Positional,
}

impl Render {
    pub fn flag(flag: &str) -> Self {
        Render::Flag(flag.to_string())
    }

    pub fn switch(flag: &str) -> Self {
        Render::Switch(flag.to_string())
    }

    pub fn attached(prefix: &str) -> Self {
        Render::Attached(prefix.to_string())
    }
}

/// How a multi-valued parameter collapses into arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinRule {
    Comma,
    Repeat,
    Separator(String),
    Wrapped {
        prefix: String,
        separator: String,
        suffix: String,
    },
}

impl JoinRule {
    /// The argument values, each rendered once: one combined value, or every
    /// value on its own for `Repeat`.
    pub fn collapse(&self, values: &[String]) -> Vec<String> {
        match self {
            JoinRule::Repeat => values.to_vec(),
            JoinRule::Comma => vec![values.join(",")],
            JoinRule::Separator(sep) => vec![values.join(sep)],
            JoinRule::Wrapped {
                prefix,
                separator,
                suffix,
            } => vec![format!("{}{}{}", prefix, values.join(separator), suffix)],
        }
    }
}

/// One logical parameter of a tool.
#[derive(Debug, Clone)]
pub struct FlagTemplate {
    pub name: String,
    pub kind: ValueKind,
    pub render: Render,
    pub join: JoinRule,
    pub required: bool,
    pub default: Option<Value>,
    pub description: String,
}

impl FlagTemplate {
    pub fn new(name: &str, kind: ValueKind, render: Render) -> Self {
        Self {
            name: name.to_string(),
            kind,
            render,
            join: JoinRule::Comma,
            required: false,
            default: None,
            description: String::new(),
        }
    }

    pub fn join(mut self, join: JoinRule) -> Self {
        self.join = join;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// How targets are placed on the command line.
#[derive(Debug, Clone)]
pub struct TargetTemplate {
    /// Rendering of a lone target in `single` mode.
    pub single: Render,
    /// Arguments telling the tool to read its list from stdin.
    pub list_args: Vec<String>,
}

/// Pulls named fields out of free-text lines.
#[derive(Debug, Clone)]
pub struct LineExtractor {
    pattern: Regex,
}

impl LineExtractor {
    pub fn new(tool: &str, pattern: &str) -> Result<Self, RegistryError> {
        let pattern = Regex::new(pattern).map_err(|source| RegistryError::InvalidPattern {
            tool: tool.to_string(),
            source,
        })?;
        if pattern.capture_names().flatten().next().is_none() {
            return Err(RegistryError::invalid(
                tool,
                "line extractor needs at least one named capture group",
            ));
        }
        Ok(Self { pattern })
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

/// Delimited columns mapped to field names.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub delimiter: char,
    pub columns: Vec<String>,
    pub skip_header: bool,
}

impl TableLayout {
    pub fn new(delimiter: char, columns: &[&str]) -> Self {
        Self {
            delimiter,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            skip_header: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum OutputFormat {
    JsonLines,
    PlainText(LineExtractor),
    StructuredTable(TableLayout),
}

impl OutputFormat {
    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::JsonLines => "json-lines",
            OutputFormat::PlainText(_) => "plain-text",
            OutputFormat::StructuredTable(_) => "structured-table",
        }
    }
}

/// Default time budget: `base + per_target * targets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub base: Duration,
    pub per_target: Duration,
}

impl TimeoutPolicy {
    pub fn fixed(secs: u64) -> Self {
        Self {
            base: Duration::from_secs(secs),
            per_target: Duration::ZERO,
        }
    }

    pub fn scaled(base_secs: u64, per_target_secs: u64) -> Self {
        Self {
            base: Duration::from_secs(base_secs),
            per_target: Duration::from_secs(per_target_secs),
        }
    }

    pub fn for_targets(&self, count: usize) -> Duration {
        self.base + self.per_target * count as u32
    }
}

/// Immutable invocation contract of one wrapped binary.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub binary: String,
    pub description: String,
    pub install_hint: String,
    pub input_modes: BTreeSet<InputMode>,
    pub target: TargetTemplate,
    pub base_args: Vec<String>,
    pub flag_templates: Vec<FlagTemplate>,
    pub output_format: OutputFormat,
    pub timeout: TimeoutPolicy,
    /// A non-zero exit is a failure only when this is set.
    pub exit_code_significant: bool,
    /// Output fragments that identify a different program under the same name.
    pub impostor_markers: Vec<String>,
}

impl ToolSpec {
    pub fn builder(name: &str, binary: &str) -> ToolSpecBuilder {
        ToolSpecBuilder::new(name, binary)
    }

    pub fn supports(&self, mode: InputMode) -> bool {
        self.input_modes.contains(&mode)
    }

    pub fn flag(&self, name: &str) -> Option<&FlagTemplate> {
        self.flag_templates.iter().find(|f| f.name == name)
    }

    /// Structural checks run once at registration.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::invalid(&self.name, "empty tool name"));
        }
        if self.binary.trim().is_empty() {
            return Err(RegistryError::invalid(&self.name, "empty binary name"));
        }
        if self.input_modes.is_empty() {
            return Err(RegistryError::invalid(&self.name, "no input modes declared"));
        }
        if self.supports(InputMode::Single) && matches!(self.target.single, Render::Switch(_)) {
            return Err(RegistryError::invalid(
                &self.name,
                "single-target rendering cannot be a switch",
            ));
        }
        if self.timeout.base.is_zero() && self.timeout.per_target.is_zero() {
            return Err(RegistryError::invalid(&self.name, "zero timeout policy"));
        }

        let mut seen = HashSet::new();
        for flag in &self.flag_templates {
            if !seen.insert(flag.name.as_str()) {
                return Err(RegistryError::invalid(
                    &self.name,
                    format!("duplicate parameter '{}'", flag.name),
                ));
            }
            let is_bool = matches!(flag.kind, ValueKind::Bool);
            if matches!(flag.render, Render::Switch(_)) != is_bool {
                return Err(RegistryError::invalid(
                    &self.name,
                    format!("parameter '{}' must pair switch rendering with a boolean", flag.name),
                ));
            }
            if let Some(default) = &flag.default {
                crate::command::coerce(flag, default).map_err(|e| {
                    RegistryError::invalid(&self.name, format!("bad default: {}", e))
                })?;
            }
        }
        Ok(())
    }
}

/// Fluent construction for catalog entries and tests.
pub struct ToolSpecBuilder {
    spec: ToolSpec,
}

impl ToolSpecBuilder {
    fn new(name: &str, binary: &str) -> Self {
        Self {
            spec: ToolSpec {
                name: name.to_string(),
                binary: binary.to_string(),
                description: String::new(),
                install_hint: format!("Install '{}' and make sure it is on PATH", binary),
                input_modes: BTreeSet::new(),
                target: TargetTemplate {
                    single: Render::Positional,
                    list_args: Vec::new(),
                },
                base_args: Vec::new(),
                flag_templates: Vec::new(),
                output_format: OutputFormat::JsonLines,
                timeout: TimeoutPolicy::fixed(300),
                exit_code_significant: false,
                impostor_markers: Vec::new(),
            },
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.spec.description = description.to_string();
        self
    }

    pub fn install_hint(mut self, hint: &str) -> Self {
        self.spec.install_hint = hint.to_string();
        self
    }

    pub fn single(mut self, render: Render) -> Self {
        self.spec.input_modes.insert(InputMode::Single);
        self.spec.target.single = render;
        self
    }

    pub fn list(mut self, args: &[&str]) -> Self {
        self.spec.input_modes.insert(InputMode::List);
        self.spec.target.list_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn no_input(mut self) -> Self {
        self.spec.input_modes.insert(InputMode::None);
        self
    }

    pub fn base_args(mut self, args: &[&str]) -> Self {
        self.spec.base_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn flag(mut self, template: FlagTemplate) -> Self {
        self.spec.flag_templates.push(template);
        self
    }

    pub fn output(mut self, format: OutputFormat) -> Self {
        self.spec.output_format = format;
        self
    }

    pub fn timeout(mut self, policy: TimeoutPolicy) -> Self {
        self.spec.timeout = policy;
        self
    }

    pub fn exit_code_significant(mut self) -> Self {
        self.spec.exit_code_significant = true;
        self
    }

    pub fn impostor_markers(mut self, markers: &[&str]) -> Self {
        self.spec.impostor_markers = markers.iter().map(|m| m.to_lowercase()).collect();
        self
    }

    pub fn build(self) -> Result<ToolSpec, RegistryError> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_requires_input_mode() {
        let result = ToolSpec::builder("bare", "true").build();
        assert!(matches!(result, Err(RegistryError::InvalidSpec { .. })));
    }

    #[test]
    fn test_switch_requires_bool() {
        let result = ToolSpec::builder("mixed", "true")
            .single(Render::Positional)
            .flag(FlagTemplate::new("depth", ValueKind::Integer { min: 0, max: 9 }, Render::switch("-d")))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let result = ToolSpec::builder("dup", "true")
            .single(Render::Positional)
            .flag(FlagTemplate::new("x", ValueKind::Text, Render::flag("-x")))
            .flag(FlagTemplate::new("x", ValueKind::Text, Render::flag("-y")))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_default_rejected() {
        let result = ToolSpec::builder("defaults", "true")
            .single(Render::Positional)
            .flag(
                FlagTemplate::new("port", ValueKind::Integer { min: 1, max: 65535 }, Render::flag("-p"))
                    .default_value(json!("https")),
            )
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_extractor_needs_named_group() {
        assert!(LineExtractor::new("t", r"^\d+$").is_err());
        assert!(LineExtractor::new("t", r"^(?P<n>\d+)$").is_ok());
        assert!(matches!(
            LineExtractor::new("t", r"(?P<n>"),
            Err(RegistryError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_join_rules() {
        let values = vec!["js".to_string(), "json".to_string()];
        assert_eq!(JoinRule::Comma.collapse(&values), vec!["js,json"]);
        assert_eq!(JoinRule::Separator("|".into()).collapse(&values), vec!["js|json"]);
        assert_eq!(JoinRule::Repeat.collapse(&values), vec!["js", "json"]);
        let wrapped = JoinRule::Wrapped {
            prefix: r"\.(".into(),
            separator: "|".into(),
            suffix: ")$".into(),
        };
        assert_eq!(wrapped.collapse(&values), vec![r"\.(js|json)$"]);
    }

    #[test]
    fn test_timeout_policy_scales() {
        let policy = TimeoutPolicy::scaled(20, 15);
        assert_eq!(policy.for_targets(1), Duration::from_secs(35));
        assert_eq!(policy.for_targets(2), Duration::from_secs(50));
    }
}
