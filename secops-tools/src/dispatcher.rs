use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use crate::classifier::ErrorClassifier;
use crate::command::CommandBuilder;
use crate::error::{ErrorCode, ToolError};
use crate::execution_context::ExecutionContext;
use crate::executor::{ExecutionResult, ProcessExecutor};
use crate::input::InputResolver;
use crate::normalizer::{Finding, OutputNormalizer};
use crate::registry::ToolSpecRegistry;
use crate::request::InvocationRequest;
use crate::result::{ResultMetadata, ToolResult};
use crate::spec::ToolSpec;
use crate::traits::AuditLogger;

/// Dispatcher-wide knobs, filled from configuration.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Replaces every tool's own timeout policy when set.
    pub default_timeout: Option<Duration>,
    /// Ceiling applied after every other timeout source.
    pub max_timeout: Duration,
    pub excerpt_bytes: usize,
    /// Per-tool timeouts; these beat `default_timeout`.
    pub timeout_overrides: HashMap<String, Duration>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            default_timeout: None,
            max_timeout: Duration::from_secs(3600),
            excerpt_bytes: 2048,
            timeout_overrides: HashMap::new(),
        }
    }
}

/// Sole entry point: request in, exactly one [`ToolResult`] out.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolSpecRegistry>,
    executor: Arc<dyn ProcessExecutor>,
    audit: Arc<dyn AuditLogger>,
    pending_audits: Arc<watch::Sender<usize>>,
    settings: Arc<DispatchSettings>,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<ToolSpecRegistry>,
        executor: Arc<dyn ProcessExecutor>,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        Self {
            registry,
            executor,
            audit,
            pending_audits: Arc::new(watch::channel(0).0),
            settings: Arc::new(DispatchSettings::default()),
        }
    }

    pub fn with_settings(mut self, settings: DispatchSettings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    pub fn registry(&self) -> &ToolSpecRegistry {
        &self.registry
    }

    /// Waits up to `limit` for audit entries still being written. Returns
    /// false if some were still pending when the wait ran out.
    pub async fn flush_audit(&self, limit: Duration) -> bool {
        let mut pending = self.pending_audits.subscribe();
        let drained = matches!(
            tokio::time::timeout(limit, pending.wait_for(|count| *count == 0)).await,
            Ok(Ok(_))
        );
        if !drained {
            warn!("{} audit entries still pending after {:?}", *pending.borrow(), limit);
        }
        drained
    }

    pub async fn call(
        &self,
        tool_name: &str,
        targets: Vec<String>,
        options: Map<String, Value>,
    ) -> ToolResult {
        self.invoke(InvocationRequest::new(tool_name, targets).with_options(options))
            .await
    }

    pub async fn invoke(&self, request: InvocationRequest) -> ToolResult {
        let ctx = ExecutionContext::new(&request.tool_name);
        let span = info_span!(
            "invoke",
            tool = %ctx.tool_name,
            invocation_id = %ctx.invocation_id
        );
        info!(parent: &span, "Dispatching {} with {} target(s)", ctx.tool_name, request.targets.len());

        let target_count = request.targets.len();
        let result = self.execute_with_protection(ctx.clone(), request, span.clone()).await;

        info!(
            parent: &span,
            "Finished {} with status {:?} in {}ms",
            ctx.tool_name,
            result.status,
            ctx.elapsed_ms()
        );
        self.log_audit_isolated(&ctx, target_count, &result);
        result
    }

    /// Runs the pipeline on its own task so a panic anywhere inside becomes a
    /// classified result instead of unwinding into the caller.
    async fn execute_with_protection(
        &self,
        ctx: ExecutionContext,
        request: InvocationRequest,
        span: tracing::Span,
    ) -> ToolResult {
        let this = self.clone();
        let task_ctx = ctx.clone();
        let mut handle = AbortOnDrop(tokio::spawn(
            async move { this.run(&task_ctx, request).await }.instrument(span),
        ));

        match (&mut handle.0).await {
            Ok(result) => result,
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    error!("Invocation of {} panicked", ctx.tool_name);
                    "invocation task panicked"
                } else {
                    error!("Invocation of {} was cancelled", ctx.tool_name);
                    "invocation task was cancelled"
                };
                let spec = self.registry.get(&ctx.tool_name);
                self.failure(
                    &ToolError::Internal(reason.to_string()),
                    spec.as_deref(),
                    None,
                    self.metadata(&ctx, 0),
                )
            }
        }
    }

    async fn run(&self, ctx: &ExecutionContext, request: InvocationRequest) -> ToolResult {
        let mut metadata = self.metadata(ctx, request.targets.len());
        let spec = self.registry.get(&request.tool_name);
        let mut execution = None;

        let outcome = match &spec {
            Some(spec) => {
                self.pipeline(spec, &request, &mut metadata, &mut execution)
                    .await
            }
            None => Err(ToolError::UnknownTool(request.tool_name.clone())),
        };

        match outcome {
            Ok(findings) => {
                let excerpt = execution
                    .as_ref()
                    .and_then(|e| ErrorClassifier::excerpt(e, self.settings.excerpt_bytes));
                ToolResult::ok(findings, excerpt, metadata)
            }
            Err(error) => self.failure(&error, spec.as_deref(), execution.as_ref(), metadata),
        }
    }

    /// resolve → build → execute → inspect → normalize. The first failing
    /// stage decides the classification. Stdout is searched for impostor
    /// markers only when it yields no findings.
    async fn pipeline(
        &self,
        spec: &ToolSpec,
        request: &InvocationRequest,
        metadata: &mut ResultMetadata,
        execution: &mut Option<ExecutionResult>,
    ) -> Result<Vec<Finding>, ToolError> {
        let input = InputResolver::resolve(spec, &request.targets)?;
        metadata.delivery_mode = Some(input.mode());

        let timeout = self.effective_timeout(spec, request, input.target_count());
        let command = CommandBuilder::build(spec, &input, &request.options, Some(timeout))?;

        let captured = execution.insert(self.executor.execute(&command).await?);
        metadata.exit_code = captured.exit_code;
        metadata.duration_ms = Some(captured.duration.as_millis() as u64);
        metadata.timed_out = captured.timed_out;
        metadata.truncated = captured.truncated;

        if let Some(error) = ErrorClassifier::inspect(spec, captured) {
            return Err(error);
        }

        let normalized = match OutputNormalizer::normalize(&spec.output_format, &captured.stdout) {
            Ok(normalized) if !normalized.findings.is_empty() => normalized,
            unparsed => {
                if let Some(error) = ErrorClassifier::inspect_unparsed(spec, captured) {
                    return Err(error);
                }
                unparsed?
            }
        };
        metadata.skipped_lines = normalized.skipped_lines;
        Ok(normalized.findings)
    }

    fn effective_timeout(
        &self,
        spec: &ToolSpec,
        request: &InvocationRequest,
        target_count: usize,
    ) -> Duration {
        let chosen = request
            .timeout()
            .or_else(|| self.settings.timeout_overrides.get(&spec.name).copied())
            .or(self.settings.default_timeout)
            .unwrap_or_else(|| spec.timeout.for_targets(target_count));
        let ceiling = self.settings.max_timeout.max(Duration::from_secs(1));
        chosen.clamp(Duration::from_secs(1), ceiling)
    }

    fn metadata(&self, ctx: &ExecutionContext, target_count: usize) -> ResultMetadata {
        ResultMetadata {
            tool: ctx.tool_name.clone(),
            invocation_id: ctx.invocation_id.clone(),
            target_count,
            ..Default::default()
        }
    }

    fn failure(
        &self,
        error: &ToolError,
        spec: Option<&ToolSpec>,
        execution: Option<&ExecutionResult>,
        metadata: ResultMetadata,
    ) -> ToolResult {
        let payload = ErrorClassifier::classify(error, spec);
        let mut raw_excerpt =
            execution.and_then(|e| ErrorClassifier::excerpt(e, self.settings.excerpt_bytes));
        if payload.code == ErrorCode::UnknownError && raw_excerpt.is_none() {
            raw_excerpt = Some(error.to_string());
        }
        warn!("{} failed with {}: {}", metadata.tool, payload.code, payload.message);
        ToolResult::error(payload, raw_excerpt, metadata)
    }

    fn log_audit_isolated(&self, ctx: &ExecutionContext, target_count: usize, result: &ToolResult) {
        let entry = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "invocation_id": ctx.invocation_id,
            "tool": ctx.tool_name,
            "targets": target_count,
            "delivery_mode": result.metadata.delivery_mode,
            "status": result.status,
            "error_code": result.error_code(),
            "exit_code": result.metadata.exit_code,
            "duration_ms": ctx.elapsed_ms(),
        });

        // Fire and forget; `flush_audit` can still wait for it.
        let audit = self.audit.clone();
        let pending = PendingAudit::track(self.pending_audits.clone());
        tokio::spawn(async move {
            audit.log(entry).await;
            drop(pending);
        });
    }
}

/// Counts one in-flight audit write until dropped, panics included.
struct PendingAudit(Arc<watch::Sender<usize>>);

impl PendingAudit {
    fn track(counter: Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|count| *count += 1);
        Self(counter)
    }
}

impl Drop for PendingAudit {
    fn drop(&mut self) {
        self.0.send_modify(|count| *count -= 1);
    }
}

/// Aborts the pipeline task when the caller stops waiting, which drops the
/// child process handle and takes its process group down with it.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
