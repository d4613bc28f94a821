use anyhow::{Context, Result};
use secops_tools::{
    builtin_registry, AuditLogger, JsonlAuditLogger, SystemExecutor, ToolDispatcher,
    TracingAuditLogger,
};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

/// Builds the registry and dispatcher from configuration. Any error here is a
/// configuration defect and stops the process before a call is served.
pub fn build_dispatcher(config: &Config) -> Result<ToolDispatcher> {
    let mut registry = builtin_registry().context("Built-in tool catalog is invalid")?;
    let settings = config.apply(&mut registry)?;

    let executor = SystemExecutor::new()
        .with_max_output_bytes(config.max_output_bytes)
        .with_limits(config.limits);

    let audit: Arc<dyn AuditLogger> = match &config.audit_log {
        Some(path) => {
            info!("Audit log: {}", path.display());
            Arc::new(JsonlAuditLogger::new(path))
        }
        None => Arc::new(TracingAuditLogger),
    };

    info!("Loaded {} tools", registry.count());
    Ok(ToolDispatcher::new(Arc::new(registry), Arc::new(executor), audit).with_settings(settings))
}
