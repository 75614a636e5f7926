//! Builder that registers compositions with a registry

use std::sync::Arc;

use tracing::info;

use super::composition::{
    Branch, ChildWorkflow, Composition, CompositionKind, ConditionalOptions, ParallelOptions,
    RetryOptions, SequentialOptions,
};
use crate::context::Context;
use crate::engine::ExecuteOptions;
use crate::registry::{RegistryError, WorkflowRegistry};
use crate::workflow::ExecutionResult;

/// Builds compositions and registers them under their name
///
/// # Example
///
/// ```ignore
/// let composer = WorkflowComposer::new(registry.clone());
///
/// composer.sequential(
///     "onboarding",
///     ["create_account", "send_welcome"],
///     SequentialOptions::default(),
/// )?;
///
/// let result = composer.execute("onboarding", context, &ExecuteOptions::default()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct WorkflowComposer {
    registry: WorkflowRegistry,
}

impl WorkflowComposer {
    pub fn new(registry: WorkflowRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Run children one after another
    pub fn sequential<I>(
        &self,
        name: impl Into<String>,
        workflows: I,
        options: SequentialOptions,
    ) -> Result<Arc<Composition>, RegistryError>
    where
        I: IntoIterator,
        I::Item: Into<ChildWorkflow>,
    {
        self.register(Composition::new(
            name,
            CompositionKind::Sequential {
                workflows: workflows.into_iter().map(Into::into).collect(),
                options,
            },
        ))
    }

    /// Run children concurrently and wait for all of them
    pub fn parallel<I>(
        &self,
        name: impl Into<String>,
        workflows: I,
        options: ParallelOptions,
    ) -> Result<Arc<Composition>, RegistryError>
    where
        I: IntoIterator,
        I::Item: Into<ChildWorkflow>,
    {
        self.register(Composition::new(
            name,
            CompositionKind::Parallel {
                workflows: workflows.into_iter().map(Into::into).collect(),
                options,
            },
        ))
    }

    /// Run the first matching branch (or every match with `evaluate_all`)
    pub fn conditional(
        &self,
        name: impl Into<String>,
        branches: impl IntoIterator<Item = Branch>,
        options: ConditionalOptions,
    ) -> Result<Arc<Composition>, RegistryError> {
        self.register(Composition::new(
            name,
            CompositionKind::Conditional {
                branches: branches.into_iter().collect(),
                options,
            },
        ))
    }

    /// Re-run a child with backoff until it succeeds or the policy gives up
    pub fn retry(
        &self,
        name: impl Into<String>,
        workflow: impl Into<ChildWorkflow>,
        options: RetryOptions,
    ) -> Result<Arc<Composition>, RegistryError> {
        self.register(Composition::new(
            name,
            CompositionKind::Retry {
                workflow: workflow.into(),
                options,
            },
        ))
    }

    /// Execute a registered composition
    pub async fn execute(
        &self,
        name: &str,
        context: impl Into<Context>,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult, RegistryError> {
        self.registry.execute_composition(name, context, options).await
    }

    fn register(&self, composition: Composition) -> Result<Arc<Composition>, RegistryError> {
        let composition = self.registry.register_composition(composition)?;
        info!(
            composition = %composition.name,
            kind = %composition.composition_type(),
            children = composition.children().len(),
            "composition created"
        );
        Ok(composition)
    }
}
