//! Argument-vector assembly with typed parameter coercion.

use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::ToolError;
use crate::input::ResolvedInput;
use crate::sandbox::ArgumentGuard;
use crate::spec::{FlagTemplate, Render, ToolSpec, ValueKind};

/// Fully rendered invocation, ready for the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    /// `argv[0]` is the binary.
    pub argv: Vec<String>,
    pub stdin_payload: Option<String>,
    pub timeout: Duration,
}

impl ResolvedCommand {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

/// A parameter value after type coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coerced {
    One(String),
    Many(Vec<String>),
    Switch(bool),
}

impl Coerced {
    fn is_empty(&self) -> bool {
        matches!(self, Coerced::Many(values) if values.is_empty())
    }
}

pub struct CommandBuilder;

impl CommandBuilder {
    /// Renders `spec` + `options` into argv.
    ///
    /// Order: binary, base args, option flags, targets, positional options.
    pub fn build(
        spec: &ToolSpec,
        input: &ResolvedInput,
        options: &Map<String, Value>,
        timeout_override: Option<Duration>,
    ) -> Result<ResolvedCommand, ToolError> {
        if let Some(unknown) = options.keys().find(|name| spec.flag(name).is_none()) {
            return Err(ToolError::invalid(
                unknown.as_str(),
                format!("not a parameter of {}", spec.name),
            ));
        }

        let mut flags = Vec::new();
        let mut positionals = Vec::new();

        for template in &spec.flag_templates {
            let supplied = options.get(&template.name).filter(|v| !v.is_null());
            let Some(value) = supplied.or(template.default.as_ref()) else {
                if template.required {
                    return Err(ToolError::invalid(&template.name, "required parameter missing"));
                }
                continue;
            };

            let coerced = coerce(template, value)?;
            if coerced.is_empty() {
                if template.required {
                    return Err(ToolError::invalid(&template.name, "required parameter is empty"));
                }
                continue;
            }

            let rendered = render(template, &coerced);
            match template.render {
                Render::Positional => positionals.extend(rendered),
                _ => flags.extend(rendered),
            }
        }

        let mut argv = Vec::with_capacity(1 + spec.base_args.len() + flags.len() + 2);
        argv.push(spec.binary.clone());
        argv.extend(spec.base_args.iter().cloned());
        argv.extend(flags);

        let stdin_payload = match input {
            ResolvedInput::Single(target) => {
                argv.extend(render_target(&spec.target.single, target));
                None
            }
            ResolvedInput::List { payload, .. } => {
                argv.extend(spec.target.list_args.iter().cloned());
                Some(payload.clone())
            }
        };
        argv.extend(positionals);

        let timeout =
            timeout_override.unwrap_or_else(|| spec.timeout.for_targets(input.target_count()));

        debug!("Built command for {}: {:?}", spec.name, argv);
        Ok(ResolvedCommand {
            argv,
            stdin_payload,
            timeout,
        })
    }
}

fn render_target(render: &Render, target: &str) -> Vec<String> {
    match render {
        Render::Flag(flag) => vec![flag.clone(), target.to_string()],
        Render::Attached(prefix) => vec![format!("{}{}", prefix, target)],
        Render::Positional | Render::Switch(_) => vec![target.to_string()],
    }
}

fn render(template: &FlagTemplate, value: &Coerced) -> Vec<String> {
    match (&template.render, value) {
        (Render::Switch(flag), Coerced::Switch(true)) => vec![flag.clone()],
        (Render::Switch(_), _) => Vec::new(),
        (render, Coerced::Switch(on)) => render_target(render, if *on { "true" } else { "false" }),
        (render, Coerced::One(v)) => render_target(render, v),
        (render, Coerced::Many(values)) => template
            .join
            .collapse(values)
            .iter()
            .flat_map(|v| render_target(render, v))
            .collect(),
    }
}

/// Coerces a JSON value to the template's declared kind.
pub fn coerce(template: &FlagTemplate, value: &Value) -> Result<Coerced, ToolError> {
    let name = template.name.as_str();
    match &template.kind {
        ValueKind::Integer { min, max } => {
            Ok(Coerced::One(coerce_int(name, value, *min, *max)?.to_string()))
        }
        ValueKind::IntegerList { min, max } => {
            let values = split_list(name, value)?
                .iter()
                .map(|item| coerce_int(name, item, *min, *max).map(|n| n.to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Coerced::Many(values))
        }
        ValueKind::Text => Ok(Coerced::One(coerce_text(name, value)?)),
        ValueKind::TextList => {
            let values = match value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| coerce_text(name, item))
                    .collect::<Result<Vec<_>, _>>()?,
                other => vec![coerce_text(name, other)?],
            };
            Ok(Coerced::Many(values))
        }
        ValueKind::Bool => Ok(Coerced::Switch(coerce_bool(name, value)?)),
        ValueKind::Choice(allowed) => Ok(Coerced::One(coerce_choice(name, value, allowed)?)),
        ValueKind::ChoiceList(allowed) => {
            let values = split_list(name, value)?
                .iter()
                .map(|item| coerce_choice(name, item, allowed))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Coerced::Many(values))
        }
        ValueKind::Aliased { aliases, min, max } => {
            if let Value::String(s) = value {
                let key = s.trim().to_lowercase();
                if let Some((_, mode)) = aliases.iter().find(|(alias, _)| *alias == key) {
                    return Ok(Coerced::One(mode.to_string()));
                }
            }
            coerce_int(name, value, *min, *max)
                .map(|n| Coerced::One(n.to_string()))
                .map_err(|_| {
                    let known: Vec<&str> = aliases.iter().map(|(a, _)| a.as_str()).collect();
                    ToolError::invalid(
                        name,
                        format!("expected a number or one of [{}], got {}", known.join(", "), value),
                    )
                })
        }
        ValueKind::Pattern(pattern) => {
            let text = text_of(name, value)?;
            ArgumentGuard::validate_literal(name, &text)?;
            if !pattern.is_match(&text) {
                return Err(ToolError::invalid(
                    name,
                    format!("'{}' does not match {}", text, pattern.as_str()),
                ));
            }
            // A bare positional value starting with `-` is still an option.
            if template.render == Render::Positional {
                ArgumentGuard::reject_option_like(name, &text)?;
            }
            Ok(Coerced::One(text))
        }
        ValueKind::FilePath => {
            let path = coerce_text(name, value)?;
            if !Path::new(&path).is_file() {
                return Err(ToolError::invalid(name, format!("file not found: {}", path)));
            }
            Ok(Coerced::One(path))
        }
    }
}

fn coerce_int(name: &str, value: &Value, min: i64, max: i64) -> Result<i64, ToolError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    let n = parsed.ok_or_else(|| ToolError::invalid(name, format!("expected an integer, got {}", value)))?;
    if n < min || n > max {
        return Err(ToolError::invalid(
            name,
            format!("{} is outside {}..={}", n, min, max),
        ));
    }
    Ok(n)
}

fn coerce_text(name: &str, value: &Value) -> Result<String, ToolError> {
    let text = text_of(name, value)?;
    ArgumentGuard::validate_value(name, &text)?;
    Ok(text)
}

fn text_of(name: &str, value: &Value) -> Result<String, ToolError> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(ToolError::invalid(name, format!("expected a string, got {}", other))),
    }
}

fn coerce_bool(name: &str, value: &Value) -> Result<bool, ToolError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(ToolError::invalid(name, format!("expected a boolean, got '{}'", s))),
        },
        other => Err(ToolError::invalid(name, format!("expected a boolean, got {}", other))),
    }
}

fn coerce_choice(name: &str, value: &Value, allowed: &[String]) -> Result<String, ToolError> {
    let Value::String(s) = value else {
        return Err(ToolError::invalid(name, format!("expected a string, got {}", value)));
    };
    let wanted = s.trim();
    allowed
        .iter()
        .find(|choice| choice.eq_ignore_ascii_case(wanted))
        .cloned()
        .ok_or_else(|| {
            ToolError::invalid(
                name,
                format!("'{}' is not one of [{}]", wanted, allowed.join(", ")),
            )
        })
}

/// Arrays pass through; a comma string or a scalar becomes a list.
fn split_list(name: &str, value: &Value) -> Result<Vec<Value>, ToolError> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| Value::String(part.to_string()))
            .collect()),
        Value::Number(_) => Ok(vec![value.clone()]),
        other => Err(ToolError::invalid(name, format!("expected a list, got {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{InputMode, JoinRule, TimeoutPolicy};
    use serde_json::json;

    fn probe_spec() -> ToolSpec {
        ToolSpec::builder("probe", "probe")
            .single(Render::flag("-u"))
            .list(&["-l", "-"])
            .base_args(&["-json"])
            .timeout(TimeoutPolicy::scaled(20, 15))
            .flag(FlagTemplate::new(
                "status_codes",
                ValueKind::IntegerList { min: 100, max: 599 },
                Render::flag("-mc"),
            ))
            .flag(FlagTemplate::new("verbose", ValueKind::Bool, Render::switch("-v")))
            .flag(FlagTemplate::new("header", ValueKind::TextList, Render::flag("-H")).join(JoinRule::Repeat))
            .flag(
                FlagTemplate::new("scan_type", ValueKind::choice(&["sV", "sS"]), Render::attached("-"))
                    .default_value(json!("sV")),
            )
            .flag(FlagTemplate::new(
                "hash_type",
                ValueKind::Aliased {
                    aliases: vec![("md5".into(), 0), ("ntlm".into(), 1000)],
                    min: 0,
                    max: 99999,
                },
                Render::flag("-m"),
            ))
            .flag(FlagTemplate::new("wordlist", ValueKind::Text, Render::Positional))
            .build()
            .unwrap()
    }

    fn options(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_single_target_argv() {
        let spec = probe_spec();
        let input = ResolvedInput::Single("https://example.com".into());
        let cmd = CommandBuilder::build(&spec, &input, &Map::new(), None).unwrap();
        assert_eq!(cmd.argv, vec!["probe", "-json", "-sV", "-u", "https://example.com"]);
        assert_eq!(cmd.stdin_payload, None);
        assert_eq!(cmd.timeout, Duration::from_secs(35));
    }

    #[test]
    fn test_list_mode_status_codes_comma_joined() {
        let spec = probe_spec();
        let input = ResolvedInput::List {
            payload: "https://a.com\nhttp://b.com".into(),
            count: 2,
        };
        let cmd =
            CommandBuilder::build(&spec, &input, &options(json!({"status_codes": [200, 301]})), None)
                .unwrap();
        assert_eq!(
            cmd.argv,
            vec!["probe", "-json", "-mc", "200,301", "-sV", "-l", "-"]
        );
        assert_eq!(cmd.stdin_payload.as_deref(), Some("https://a.com\nhttp://b.com"));
        assert_eq!(cmd.timeout, Duration::from_secs(50));
        assert_eq!(input.mode(), InputMode::List);
    }

    #[test]
    fn test_numeric_strings_coerce() {
        let spec = probe_spec();
        let input = ResolvedInput::Single("a.com".into());
        let cmd =
            CommandBuilder::build(&spec, &input, &options(json!({"status_codes": "200, 404"})), None)
                .unwrap();
        assert!(cmd.argv.windows(2).any(|w| w == ["-mc", "200,404"]));
    }

    #[test]
    fn test_non_numeric_status_code_rejected() {
        let spec = probe_spec();
        let input = ResolvedInput::Single("a.com".into());
        let result =
            CommandBuilder::build(&spec, &input, &options(json!({"status_codes": ["abc"]})), None);
        assert!(matches!(result, Err(ToolError::InvalidParameter { ref name, .. }) if name == "status_codes"));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let spec = probe_spec();
        let input = ResolvedInput::Single("a.com".into());
        let result =
            CommandBuilder::build(&spec, &input, &options(json!({"status_codes": [99]})), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_null_options_omitted() {
        let spec = probe_spec();
        let input = ResolvedInput::Single("a.com".into());
        let cmd = CommandBuilder::build(
            &spec,
            &input,
            &options(json!({"status_codes": null, "header": null, "wordlist": null})),
            None,
        )
        .unwrap();
        assert!(!cmd.argv.iter().any(|a| a == "None" || a == "null" || a == "-mc"));
    }

    #[test]
    fn test_switch_and_repeat_rendering() {
        let spec = probe_spec();
        let input = ResolvedInput::Single("a.com".into());
        let cmd = CommandBuilder::build(
            &spec,
            &input,
            &options(json!({
                "verbose": true,
                "header": ["X-A: 1", "X-B: 2"],
                "scan_type": "ss",
                "wordlist": "words.txt"
            })),
            None,
        )
        .unwrap();
        assert_eq!(
            cmd.argv,
            vec!["probe", "-json", "-v", "-H", "X-A: 1", "-H", "X-B: 2", "-sS", "-u", "a.com", "words.txt"]
        );
    }

    #[test]
    fn test_false_switch_omitted() {
        let spec = probe_spec();
        let input = ResolvedInput::Single("a.com".into());
        let cmd =
            CommandBuilder::build(&spec, &input, &options(json!({"verbose": false})), None).unwrap();
        assert!(!cmd.argv.contains(&"-v".to_string()));
    }

    #[test]
    fn test_aliases_resolve() {
        let spec = probe_spec();
        let input = ResolvedInput::Single("hashes.txt".into());
        let cmd =
            CommandBuilder::build(&spec, &input, &options(json!({"hash_type": "NTLM"})), None).unwrap();
        assert!(cmd.argv.windows(2).any(|w| w == ["-m", "1000"]));

        let cmd =
            CommandBuilder::build(&spec, &input, &options(json!({"hash_type": "1400"})), None).unwrap();
        assert!(cmd.argv.windows(2).any(|w| w == ["-m", "1400"]));

        let result =
            CommandBuilder::build(&spec, &input, &options(json!({"hash_type": "whirlpool-ish"})), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_option_rejected() {
        let spec = probe_spec();
        let input = ResolvedInput::Single("a.com".into());
        let result = CommandBuilder::build(&spec, &input, &options(json!({"colour": "red"})), None);
        assert!(matches!(result, Err(ToolError::InvalidParameter { ref name, .. }) if name == "colour"));
    }

    #[test]
    fn test_invalid_choice_rejected() {
        let spec = probe_spec();
        let input = ResolvedInput::Single("a.com".into());
        let result =
            CommandBuilder::build(&spec, &input, &options(json!({"scan_type": "sZ; rm"})), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_required_parameter_missing() {
        let spec = ToolSpec::builder("needs", "needs")
            .single(Render::Positional)
            .flag(FlagTemplate::new("wordlist", ValueKind::Text, Render::flag("-w")).required())
            .build()
            .unwrap();
        let input = ResolvedInput::Single("a.com".into());
        let result = CommandBuilder::build(&spec, &input, &Map::new(), None);
        assert!(matches!(result, Err(ToolError::InvalidParameter { .. })));
    }

    #[test]
    fn test_file_path_must_exist() {
        let spec = ToolSpec::builder("files", "files")
            .single(Render::Positional)
            .flag(FlagTemplate::new("wordlist", ValueKind::FilePath, Render::flag("-w")))
            .build()
            .unwrap();
        let input = ResolvedInput::Single("a.com".into());
        let missing = CommandBuilder::build(
            &spec,
            &input,
            &options(json!({"wordlist": "/nonexistent/secops/words.txt"})),
            None,
        );
        assert!(missing.is_err());

        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let cmd = CommandBuilder::build(&spec, &input, &options(json!({"wordlist": path.clone()})), None)
            .unwrap();
        assert!(cmd.argv.contains(&path));
    }

    #[test]
    fn test_timeout_override_wins() {
        let spec = probe_spec();
        let input = ResolvedInput::Single("a.com".into());
        let cmd = CommandBuilder::build(&spec, &input, &Map::new(), Some(Duration::from_secs(3)))
            .unwrap();
        assert_eq!(cmd.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_pattern_value_may_be_a_dash_after_its_flag() {
        let ports = ValueKind::pattern("probe", r"^[TU0-9:,\-]+$").unwrap();
        let spec = ToolSpec::builder("probe", "probe")
            .single(Render::Positional)
            .flag(FlagTemplate::new("ports", ports.clone(), Render::flag("-p")))
            .flag(FlagTemplate::new("range", ports, Render::Positional))
            .build()
            .unwrap();
        let input = ResolvedInput::Single("10.0.0.1".into());

        let cmd = CommandBuilder::build(&spec, &input, &options(json!({"ports": "-"})), None).unwrap();
        assert_eq!(cmd.argv, vec!["probe", "-p", "-", "10.0.0.1"]);

        let result = CommandBuilder::build(&spec, &input, &options(json!({"range": "-1"})), None);
        assert!(matches!(result, Err(ToolError::InvalidParameter { ref name, .. }) if name == "range"));
    }
}
