pub mod error;
pub mod spec;
pub mod request;
pub mod sandbox;
pub mod input;
pub mod command;
pub mod executor;
pub mod normalizer;
pub mod classifier;
pub mod result;
pub mod registry;
pub mod catalog;
pub mod dispatcher;
pub mod execution_context;
pub mod audit_adapter;
pub mod traits;

pub use audit_adapter::{JsonlAuditLogger, NullAuditLogger, TracingAuditLogger};
pub use catalog::builtin_registry;
pub use classifier::ErrorClassifier;
pub use command::{CommandBuilder, ResolvedCommand};
pub use dispatcher::{DispatchSettings, ToolDispatcher};
pub use error::{ErrorCode, RegistryError, ToolError};
pub use execution_context::ExecutionContext;
pub use executor::{ExecutionResult, ProcessExecutor, SystemExecutor};
pub use input::{InputResolver, ResolvedInput};
pub use normalizer::{Finding, OutputNormalizer};
pub use registry::ToolSpecRegistry;
pub use request::InvocationRequest;
pub use result::{ErrorPayload, ResultMetadata, Status, ToolResult};
pub use sandbox::ResourceLimits;
pub use spec::{InputMode, OutputFormat, ToolSpec};
pub use traits::AuditLogger;
