// Audit sinks for dispatched invocations.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::traits::AuditLogger;

/// Emits audit entries as structured log events.
pub struct TracingAuditLogger;

#[async_trait]
impl AuditLogger for TracingAuditLogger {
    async fn log(&self, entry: Value) {
        info!(target: "secops::audit", "{}", entry);
    }
}

pub struct NullAuditLogger;

#[async_trait]
impl AuditLogger for NullAuditLogger {
    async fn log(&self, _entry: Value) {}
}

/// Appends one JSON document per line.
pub struct JsonlAuditLogger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlAuditLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    async fn append(&self, entry: &Value) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut line = entry.to_string();
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[async_trait]
impl AuditLogger for JsonlAuditLogger {
    async fn log(&self, entry: Value) {
        if let Err(e) = self.append(&entry).await {
            warn!("Failed to write audit entry to {}: {}", self.path.display(), e);
        }
    }
}
