//! Workflow building blocks
//!
//! This module contains the types a workflow is made of:
//! - [`Step`] units of async work and their [`StepError`]s
//! - [`Condition`]s gating steps and conditional branches
//! - [`WorkflowDefinition`] ordered steps plus metadata
//! - [`ExecutionResult`] the terminal outcome of a run

mod condition;
mod definition;
pub(crate) mod result;
mod step;

pub use condition::{compare, is_truthy, Comparison, Condition, ConditionError, Operator, Predicate};
pub use definition::{Dependency, ErrorHandling, WorkflowDefinition};
pub use result::{
    ChildResult, ErrorKind, ExecutionError, ExecutionResult, InstanceStatus, StepFailure, Summary,
};
pub use step::{Step, StepError, StepFuture, StepHandler, StepState, NOT_IMPLEMENTED_CODE};
