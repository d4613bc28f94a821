use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of one dispatched call, shared by its logs, audit entry and result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub invocation_id: String,
    pub tool_name: String,
    pub started_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(tool_name: &str) -> Self {
        Self {
            invocation_id: uuid::Uuid::new_v4().to_string(),
            tool_name: tool_name.to_string(),
            started_at: Utc::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = ExecutionContext::new("httpx_wrapper");
        let b = ExecutionContext::new("httpx_wrapper");
        assert_ne!(a.invocation_id, b.invocation_id);
        assert_eq!(a.tool_name, "httpx_wrapper");
    }
}
