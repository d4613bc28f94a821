use anyhow::{bail, Context, Result};
use secops_tools::{InvocationRequest, ToolDispatcher, ToolResult};
use serde_json::{Map, Value};
use std::time::Duration;

/// Parses `key=value`. The value is read as JSON when it parses, else kept
/// as a plain string, so `-o port=443` and `-o wordlist=/tmp/w.txt` both work.
pub fn parse_option(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Option '{}' is not in key=value form", raw);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Option '{}' has an empty key", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn build_request(
    tool: &str,
    targets: Vec<String>,
    options: &[String],
    options_json: Option<&str>,
    timeout_secs: Option<u64>,
) -> Result<InvocationRequest> {
    let mut merged = Map::new();
    if let Some(raw) = options_json {
        let parsed: Value = serde_json::from_str(raw).context("--options is not valid JSON")?;
        let Value::Object(object) = parsed else {
            bail!("--options must be a JSON object");
        };
        merged.extend(object);
    }
    for raw in options {
        let (key, value) = parse_option(raw)?;
        merged.insert(key, value);
    }

    let mut request = InvocationRequest::new(tool, targets).with_options(merged);
    if let Some(secs) = timeout_secs {
        request = request.with_timeout(Duration::from_secs(secs));
    }
    Ok(request)
}

pub async fn run(dispatcher: &ToolDispatcher, request: InvocationRequest) -> Result<ToolResult> {
    let result = dispatcher.invoke(request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(result)
}
