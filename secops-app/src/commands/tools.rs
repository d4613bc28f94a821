use anyhow::Result;
use secops_tools::{InputMode, ToolSpec, ToolSpecRegistry};
use std::io::Write;

pub fn run(registry: &ToolSpecRegistry, schemas: bool) -> Result<()> {
    let mut out = std::io::stdout().lock();
    if schemas {
        writeln!(out, "{}", serde_json::to_string_pretty(&registry.schemas())?)?;
    } else {
        write!(out, "{}", listing(registry))?;
    }
    Ok(())
}

/// One line per tool: name, binary, input modes, description.
pub fn listing(registry: &ToolSpecRegistry) -> String {
    registry
        .specs()
        .map(|spec| {
            format!(
                "{:<30} {:<10} {:<12} {}\n",
                spec.name,
                spec.binary,
                modes(spec),
                spec.description
            )
        })
        .collect()
}

fn modes(spec: &ToolSpec) -> String {
    spec.input_modes
        .iter()
        .map(|mode| match mode {
            InputMode::Single => "single",
            InputMode::List => "list",
            InputMode::None => "none",
        })
        .collect::<Vec<_>>()
        .join(",")
}
