//! Registry error types

use crate::engine::InstanceError;

/// Malformed definition or composition, rejected at registration
///
/// Messages are deterministic so callers can match on them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("workflow name must be a non-empty string")]
    EmptyName,

    /// Names are stored verbatim, so padding would make them unreachable
    #[error("name '{name}' must not have leading or trailing whitespace")]
    PaddedName { name: String },

    #[error("workflow '{workflow}' must define at least one step")]
    NoSteps { workflow: String },

    #[error("workflow '{workflow}': step {index} must have a non-empty name")]
    UnnamedStep { workflow: String, index: usize },

    #[error("workflow '{workflow}': dependency {index} must name a workflow")]
    UnnamedDependency { workflow: String, index: usize },

    #[error("workflow '{workflow}': dependency {index} refers to the workflow itself")]
    SelfDependency { workflow: String, index: usize },

    #[error("workflow '{workflow}': step '{step}' has an invalid condition: {reason}")]
    InvalidCondition {
        workflow: String,
        step: String,
        reason: String,
    },

    #[error("workflow '{workflow}': step '{step}' timeout must be a positive duration")]
    InvalidStepTimeout { workflow: String, step: String },

    #[error("workflow '{workflow}': timeout must be a positive duration")]
    InvalidTimeout { workflow: String },

    #[error("composition name must be a non-empty string")]
    EmptyCompositionName,

    #[error("composition '{composition}' must have at least one child workflow")]
    NoChildren { composition: String },

    #[error("composition '{composition}': child {index} must name a workflow")]
    UnnamedChild { composition: String, index: usize },

    #[error("composition '{composition}': child {index} refers to the composition itself")]
    SelfReference { composition: String, index: usize },

    #[error("composition '{composition}': branch {index} has an invalid condition: {reason}")]
    InvalidBranchCondition {
        composition: String,
        index: usize,
        reason: String,
    },

    #[error("composition '{composition}': max_attempts must be at least 1")]
    InvalidMaxAttempts { composition: String },

    #[error("composition '{composition}': child {index} is invalid: {source}")]
    InvalidChild {
        composition: String,
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },
}

/// Errors from registry operations
///
/// Workflow failures are not errors: they come back as an
/// [`ExecutionResult`](crate::workflow::ExecutionResult) with `success == false`.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Registration rejected
    #[error("invalid workflow: {0}")]
    Validation(#[from] ValidationError),

    /// No workflow or composition under this name
    #[error("workflow not found: {0}")]
    NotFound(String),

    /// Name is not registered as a composition
    #[error("composition not found: {0}")]
    CompositionNotFound(String),

    /// Execute options failed validation
    #[error("invalid execute options: {0}")]
    InvalidOptions(String),

    /// Instance lifecycle misuse
    #[error("instance error: {0}")]
    Instance(#[from] InstanceError),
}

impl RegistryError {
    /// Whether the error means the name is unknown
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::CompositionNotFound(_))
    }
}
