//! Workflow composition
//!
//! This module provides:
//! - [`Composition`] combinators (sequential, parallel, conditional, retry)
//! - [`WorkflowComposer`] for building and registering them
//! - [`RetryPolicy`] backoff configuration

#[allow(clippy::module_inception)]
mod composer;
mod composition;
mod retry;

pub use composer::WorkflowComposer;
pub use composition::{
    default_retry_condition, Branch, ChildWorkflow, Composition, CompositionKind, CompositionType,
    ConditionalOptions, ParallelOptions, RetryCondition, RetryOptions, SequentialOptions,
};
pub use retry::{BackoffStrategy, RetryPolicy};
