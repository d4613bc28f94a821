use anyhow::Result;
use secops_tools::{SystemExecutor, ToolSpecRegistry};
use std::path::PathBuf;

/// Whether one tool's binary resolves.
#[derive(Debug)]
pub struct BinaryStatus {
    pub tool: String,
    pub binary: String,
    pub location: Option<PathBuf>,
    pub install_hint: String,
}

pub fn check(registry: &ToolSpecRegistry) -> Vec<BinaryStatus> {
    registry
        .specs()
        .map(|spec| BinaryStatus {
            tool: spec.name.clone(),
            binary: spec.binary.clone(),
            location: SystemExecutor::locate(&spec.binary).ok(),
            install_hint: spec.install_hint.clone(),
        })
        .collect()
}

pub fn run(registry: &ToolSpecRegistry) -> Result<()> {
    println!("Tool binaries\n");

    let statuses = check(registry);
    for status in &statuses {
        match &status.location {
            Some(path) => println!("  ✓ {:<30} {}", status.tool, path.display()),
            None => println!(
                "  ✗ {:<30} '{}' not found. {}",
                status.tool, status.binary, status.install_hint
            ),
        }
    }

    let missing = statuses.iter().filter(|s| s.location.is_none()).count();
    println!();
    if missing == 0 {
        println!("All {} tools available", statuses.len());
        Ok(())
    } else {
        anyhow::bail!("{} of {} tools have no usable binary", missing, statuses.len());
    }
}
