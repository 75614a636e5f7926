//! Step definition and step errors

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::Condition;
use crate::context::Context;
use crate::engine::ExecuteOptions;

/// Error code carried by placeholder steps of documented-but-unimplemented workflows
pub const NOT_IMPLEMENTED_CODE: &str = "NOT_IMPLEMENTED";

/// Error type for step failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepError {
    /// Error message
    pub message: String,

    /// Error code for programmatic handling
    pub code: Option<String>,

    /// Whether a retry composition may retry the failure
    ///
    /// `None` means "unspecified"; the default retry condition treats it as retryable.
    pub retryable: Option<bool>,

    /// Additional error details (for debugging)
    pub details: Option<Value>,
}

impl StepError {
    /// Create an error with unspecified retryability
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            retryable: None,
            details: None,
        }
    }

    /// Create an explicitly retryable error
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            retryable: Some(true),
            ..Self::new(message)
        }
    }

    /// Create an error that retry compositions must not retry
    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            retryable: Some(false),
            ..Self::new(message)
        }
    }

    /// Error raised by placeholder steps
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::non_retryable(message).with_code(NOT_IMPLEMENTED_CODE)
    }

    /// Set the error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Add error details
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StepError {}

impl From<anyhow::Error> for StepError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

/// Running state handed to step handlers and predicates
#[derive(Debug, Clone)]
pub struct StepState {
    /// Id of the executing instance
    pub instance_id: Uuid,

    /// Name of the workflow (or composition) being executed
    pub workflow_name: String,

    /// Index of the step in its definition
    pub step_index: usize,

    /// Name of the step about to run
    pub step_name: String,

    /// Steps that have completed so far, in completion order
    pub completed_steps: Vec<String>,

    /// Options the execution was started with
    pub options: ExecuteOptions,
}

impl StepState {
    /// State for conditions evaluated outside of a workflow instance
    pub fn detached(workflow_name: impl Into<String>, options: ExecuteOptions) -> Self {
        let workflow_name = workflow_name.into();
        Self {
            instance_id: Uuid::now_v7(),
            step_name: workflow_name.clone(),
            workflow_name,
            step_index: 0,
            completed_steps: Vec::new(),
            options,
        }
    }
}

/// Boxed future returned by step handlers
pub type StepFuture = BoxFuture<'static, Result<Value, StepError>>;

/// Type-erased step handler
pub type StepHandler = Arc<dyn Fn(Context, StepState) -> StepFuture + Send + Sync>;

/// A named unit of work inside a workflow definition
///
/// The handler receives a snapshot of the accumulated context and returns a
/// partial result. A JSON object is shallow-merged into the context, `null`
/// merges nothing.
///
/// # Example
///
/// ```
/// use conductor::workflow::Step;
/// use serde_json::json;
///
/// let step = Step::new("load_plan", |ctx, _state| async move {
///     let id = ctx.get("plan_id").cloned().unwrap_or_default();
///     Ok(json!({ "plan": { "id": id } }))
/// })
/// .when("plan_id exists");
/// ```
#[derive(Clone)]
pub struct Step {
    name: String,
    handler: StepHandler,
    condition: Option<Condition>,
    parallel: bool,
    timeout: Option<Duration>,
}

impl Step {
    /// Create a step from an async closure
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Context, StepState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
    {
        let handler: StepHandler = Arc::new(move |ctx, state| handler(ctx, state).boxed());
        Self {
            name: name.into(),
            handler,
            condition: None,
            parallel: false,
            timeout: None,
        }
    }

    /// Only run the step when the condition holds
    pub fn when(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Mark the step as part of a parallel group
    pub fn parallel(self) -> Self {
        self.with_parallel(true)
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Race the step against a soft timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn invoke(&self, context: Context, state: StepState) -> StepFuture {
        (self.handler)(context, state)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("condition", &self.condition)
            .field("parallel", &self.parallel)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_error_retryability() {
        assert_eq!(StepError::new("x").retryable, None);
        assert_eq!(StepError::retryable("x").retryable, Some(true));
        assert_eq!(StepError::non_retryable("x").retryable, Some(false));
    }

    #[test]
    fn test_not_implemented_error() {
        let error = StepError::not_implemented("missing");
        assert_eq!(error.code.as_deref(), Some(NOT_IMPLEMENTED_CODE));
        assert_eq!(error.retryable, Some(false));
    }

    #[test]
    fn test_from_anyhow_keeps_context_chain() {
        let err = anyhow::anyhow!("connection refused").context("loading plan");
        let step_error = StepError::from(err);
        assert_eq!(step_error.message, "loading plan: connection refused");
    }

    #[test]
    fn test_builder_flags() {
        let step = Step::new("notify", |_, _| async { Ok(Value::Null) })
            .parallel()
            .with_timeout(Duration::from_millis(250))
            .when("notify === true");

        assert_eq!(step.name(), "notify");
        assert!(step.is_parallel());
        assert_eq!(step.timeout(), Some(Duration::from_millis(250)));
        assert!(step.condition().is_some());
    }

    #[tokio::test]
    async fn test_invoke_passes_context() {
        let step = Step::new("double", |ctx, _| async move {
            let n = ctx.get("n").and_then(Value::as_i64).unwrap_or(0);
            Ok(json!({ "doubled": n * 2 }))
        });

        let state = StepState::detached("wf", ExecuteOptions::default());
        let out = step
            .invoke(Context::from(json!({ "n": 21 })), state)
            .await
            .unwrap();
        assert_eq!(out, json!({ "doubled": 42 }));
    }
}
