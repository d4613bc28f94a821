use anyhow::{bail, Context, Result};
use secops_tools::{DispatchSettings, ResourceLimits, ToolSpecRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "secops.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Per-tool adjustments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolOverride {
    pub binary: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub default_timeout_secs: Option<u64>,
    pub max_timeout_secs: u64,
    pub max_output_bytes: usize,
    pub excerpt_bytes: usize,
    pub log_level: String,
    pub log_format: LogFormat,
    pub audit_log: Option<PathBuf>,
    pub limits: ResourceLimits,
    pub tools: BTreeMap<String, ToolOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timeout_secs: None,
            max_timeout_secs: 3600,
            max_output_bytes: 4 * 1024 * 1024,
            excerpt_bytes: 2048,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            audit_log: None,
            limits: ResourceLimits::default(),
            tools: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Explicit path if given, else `./secops.yaml` when present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content).context("Invalid YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_secs == Some(0) {
            bail!("default_timeout_secs must be greater than zero");
        }
        if self.max_timeout_secs == 0 {
            bail!("max_timeout_secs must be greater than zero");
        }
        if self.max_output_bytes == 0 {
            bail!("max_output_bytes must be greater than zero");
        }
        if self.excerpt_bytes == 0 {
            bail!("excerpt_bytes must be greater than zero");
        }
        for (name, tool) in &self.tools {
            if tool.timeout_secs == Some(0) {
                bail!("tools.{}.timeout_secs must be greater than zero", name);
            }
            if matches!(&tool.binary, Some(binary) if binary.trim().is_empty()) {
                bail!("tools.{}.binary must not be empty", name);
            }
        }
        Ok(())
    }

    /// Applies binary overrides to `registry` and returns the dispatcher
    /// settings. An override for an unregistered tool is a configuration error.
    pub fn apply(&self, registry: &mut ToolSpecRegistry) -> Result<DispatchSettings> {
        let mut settings = DispatchSettings {
            default_timeout: self.default_timeout_secs.map(Duration::from_secs),
            max_timeout: Duration::from_secs(self.max_timeout_secs),
            excerpt_bytes: self.excerpt_bytes,
            ..Default::default()
        };

        for (name, tool) in &self.tools {
            if registry.get(name).is_none() {
                bail!("Config overrides unknown tool '{}'", name);
            }
            if let Some(binary) = &tool.binary {
                registry
                    .override_binary(name, binary)
                    .with_context(|| format!("Invalid binary override for {}", name))?;
            }
            if let Some(secs) = tool.timeout_secs {
                settings
                    .timeout_overrides
                    .insert(name.clone(), Duration::from_secs(secs));
            }
        }
        Ok(settings)
    }
}
