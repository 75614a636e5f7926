//! Workflow execution engine
//!
//! The engine module provides the `WorkflowInstance` which runs one
//! definition against one context, and the `WorkflowRunner` seam through which
//! instances and compositions execute other workflows by name.

mod instance;
mod runner;

pub use instance::{InstanceError, WorkflowInstance};
pub use runner::{ExecuteOptions, WorkflowRunner};
