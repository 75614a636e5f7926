//! Middleware hooks around registry-mediated execution
//!
//! Middleware is best-effort: a failing hook is logged and skipped, never
//! propagated to the caller.

use std::fmt;

use async_trait::async_trait;
use tracing::info;

use super::EntryKind;
use crate::context::Context;
use crate::engine::ExecuteOptions;
use crate::workflow::ExecutionResult;

/// Call being intercepted
#[derive(Debug, Clone)]
pub struct ExecutionCall {
    pub workflow_name: String,
    pub kind: EntryKind,

    /// Context as handed to the hook; `before` sees earlier replacements
    pub context: Context,
    pub options: ExecuteOptions,
}

/// Before/after interception hook
///
/// # Example
///
/// ```ignore
/// struct Stamp;
///
/// #[async_trait]
/// impl Middleware for Stamp {
///     async fn before(&self, call: &ExecutionCall) -> anyhow::Result<Option<Context>> {
///         Ok(Some(call.context.with("requested_at", Utc::now().to_rfc3339())))
///     }
/// }
///
/// registry.use_middleware(Stamp);
/// ```
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str {
        "middleware"
    }

    /// Runs before execution; `Some(context)` replaces the context
    async fn before(&self, _call: &ExecutionCall) -> anyhow::Result<Option<Context>> {
        Ok(None)
    }

    /// Runs after execution, success or not
    async fn after(&self, _call: &ExecutionCall, _result: &ExecutionResult) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Logs every call and its outcome at `info`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    async fn before(&self, call: &ExecutionCall) -> anyhow::Result<Option<Context>> {
        info!(
            workflow = %call.workflow_name,
            kind = %call.kind,
            context_keys = call.context.len(),
            "executing"
        );
        Ok(None)
    }

    async fn after(&self, call: &ExecutionCall, result: &ExecutionResult) -> anyhow::Result<()> {
        info!(
            workflow = %call.workflow_name,
            kind = %call.kind,
            success = result.success,
            duration_ms = result.duration.as_millis() as u64,
            error = result.error_message().unwrap_or_default(),
            "executed"
        );
        Ok(())
    }
}

type BeforeFn = dyn Fn(&ExecutionCall) -> anyhow::Result<Option<Context>> + Send + Sync;

/// Middleware from a synchronous `before` closure
pub struct FnMiddleware {
    name: String,
    before: Box<BeforeFn>,
}

impl FnMiddleware {
    pub fn new<F>(name: impl Into<String>, before: F) -> Self
    where
        F: Fn(&ExecutionCall) -> anyhow::Result<Option<Context>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            before: Box::new(before),
        }
    }
}

impl fmt::Debug for FnMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for FnMiddleware {
    fn name(&self) -> &str {
        &self.name
    }

    async fn before(&self, call: &ExecutionCall) -> anyhow::Result<Option<Context>> {
        (self.before)(call)
    }
}
