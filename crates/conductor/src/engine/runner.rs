//! The "execute a named workflow" seam

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::registry::RegistryError;
use crate::workflow::{ErrorHandling, ExecutionResult, WorkflowDefinition};

/// Per-call execution options
///
/// `timeout`, `communication_pattern` and `data_passing_strategy` are
/// validated by the registry and handed to steps through
/// [`StepState::options`](crate::workflow::StepState); the engine itself does
/// not act on them. `error_handling` overrides the definition's policy.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub timeout: Option<Duration>,
    pub error_handling: Option<ErrorHandling>,
    pub communication_pattern: Option<String>,
    pub data_passing_strategy: Option<String>,

    /// Checkpoint after every step when a store is configured
    pub resumable: bool,

    /// Cooperative cancellation, checked between steps and between children
    pub cancellation: Option<CancellationToken>,

    /// Caller-defined options read by steps
    pub extra: Map<String, Value>,

    /// Workflows and compositions currently running on this call path,
    /// outermost first; maintained by the registry
    call_chain: Vec<String>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_error_handling(mut self, policy: ErrorHandling) -> Self {
        self.error_handling = Some(policy);
        self
    }

    pub fn with_communication_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.communication_pattern = Some(pattern.into());
        self
    }

    pub fn with_data_passing_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.data_passing_strategy = Some(strategy.into());
        self
    }

    pub fn resumable(mut self) -> Self {
        self.resumable = true;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Names running on this call path, outermost first
    pub fn call_chain(&self) -> &[String] {
        &self.call_chain
    }

    /// Options for a nested run of `name`
    ///
    /// Fails with the cycle, rendered `a -> b -> a`, when `name` is already
    /// running on this call path.
    pub(crate) fn enter(&self, name: &str) -> Result<Self, String> {
        if let Some(start) = self.call_chain.iter().position(|n| n == name) {
            let cycle: Vec<&str> = self.call_chain[start..]
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(name))
                .collect();
            return Err(cycle.join(" -> "));
        }

        let mut nested = self.clone();
        nested.call_chain.push(name.to_string());
        Ok(nested)
    }

    /// Check the options for malformed values
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err("timeout must be a positive duration".to_string());
        }
        if self
            .communication_pattern
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            return Err("communication_pattern must not be empty".to_string());
        }
        if self
            .data_passing_strategy
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
        {
            return Err("data_passing_strategy must not be empty".to_string());
        }
        Ok(())
    }
}

/// Executes workflows by name on behalf of instances and compositions
///
/// Implemented by [`WorkflowRegistry`](crate::registry::WorkflowRegistry), so
/// dependencies and composed children go through the same middleware and
/// history pipeline as top-level calls.
#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    /// Run a registered workflow or composition
    async fn run_workflow(
        &self,
        name: &str,
        context: Context,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult, RegistryError>;

    /// Run an unregistered definition
    async fn run_definition(
        &self,
        definition: Arc<WorkflowDefinition>,
        context: Context,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult, RegistryError>;
}
