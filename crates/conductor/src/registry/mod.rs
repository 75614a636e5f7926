//! Workflow registry
//!
//! This module provides:
//! - [`WorkflowRegistry`], the named store of definitions and compositions
//! - Registration-time validation
//! - The [`Middleware`] chain around execution
//! - Bounded, redacted [`ExecutionHistory`]
//! - Synchronisation with external workflow documentation

mod documentation;
mod error;
mod history;
mod middleware;
mod validation;
mod workflow_registry;

pub use documentation::{
    merge_documentation, placeholder_definition, DocumentationSource, DocumentationStatus,
    StaticDocumentation, StepMismatch, ValidationReport, WorkflowDoc, PLACEHOLDER_STEP,
};
pub use error::{RegistryError, ValidationError};
pub use history::{ExecutionHistory, HistoryRecord, REDACTED};
pub use middleware::{ExecutionCall, FnMiddleware, LoggingMiddleware, Middleware};
pub use validation::{validate_composition, validate_definition};
pub use workflow_registry::{EntryKind, RegistryEntry, RegistryStats, WorkflowRegistry};
