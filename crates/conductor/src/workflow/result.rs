//! Execution results

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StepError;
use crate::context::Context;

/// Lifecycle of a workflow instance
///
/// ```text
/// Created ──► Running ──┬──► Completed
///                       ├──► Failed
///                       └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Classification of execution failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A step handler returned an error or panicked
    StepExecution,
    /// A step of a parallel group failed
    ParallelExecution,
    /// A step lost the race against its soft timeout
    Timeout,
    /// A declared dependency failed
    DependencyFailure,
    /// Cancellation was observed between steps
    Cancelled,
    /// A named child workflow is not registered
    NotFound,
    /// A placeholder step of an unimplemented workflow ran
    NotImplemented,
    /// A composition's own policy declared failure
    Composition,
}

/// Error carried by a failed [`ExecutionResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub message: String,

    /// Underlying error message, when the message wraps another failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,

    /// Retryability reported by the failing step, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            retryable: None,
            code: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_retryable(mut self, retryable: Option<bool>) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }

    /// Wrap a step error, keeping its retryability and code
    pub fn from_step(kind: ErrorKind, message: impl Into<String>, source: &StepError) -> Self {
        Self::new(kind, message)
            .with_cause(source.message.clone())
            .with_retryable(source.retryable)
            .with_code(source.code.clone())
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExecutionError {}

/// Child outcome counts of a composition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Result of one child run inside a composition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildResult {
    pub workflow: String,
    pub result: ExecutionResult,
}

/// A step failure tolerated under [`ErrorHandling::Continue`](super::ErrorHandling::Continue)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: String,
    pub error: ExecutionError,
}

/// Terminal outcome of a workflow or composition run
///
/// `success == true` implies `error.is_none()`. `data` is the context as of the
/// last step executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub status: InstanceStatus,
    pub data: Context,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,

    #[serde(with = "duration_millis")]
    pub duration: Duration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<Uuid>,

    // Retry compositions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retried: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhausted_retries: Option<bool>,

    // Sequential / parallel compositions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,

    // Conditional compositions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildResult>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_steps: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_failures: Vec<StepFailure>,
}

impl ExecutionResult {
    fn base(success: bool, status: InstanceStatus, data: Context, duration: Duration) -> Self {
        Self {
            success,
            status,
            data,
            error: None,
            duration,
            instance_id: None,
            attempts: None,
            retried: None,
            exhausted_retries: None,
            summary: None,
            executed: None,
            children: Vec::new(),
            skipped_steps: Vec::new(),
            step_failures: Vec::new(),
        }
    }

    /// Successful completion
    pub fn completed(data: Context, duration: Duration) -> Self {
        Self::base(true, InstanceStatus::Completed, data, duration)
    }

    /// Failure with the partial context reached so far
    pub fn failed(data: Context, error: ExecutionError, duration: Duration) -> Self {
        Self {
            error: Some(error),
            ..Self::base(false, InstanceStatus::Failed, data, duration)
        }
    }

    /// Cooperative cancellation observed between steps or children
    pub fn cancelled(data: Context, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            error: Some(ExecutionError::new(ErrorKind::Cancelled, message)),
            ..Self::base(false, InstanceStatus::Cancelled, data, duration)
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

/// Serde support for Duration as milliseconds
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Serde support for Option<Duration> as milliseconds
pub(crate) mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completed_has_no_error() {
        let result = ExecutionResult::completed(Context::new(), Duration::from_millis(5));
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.status, InstanceStatus::Completed);
    }

    #[test]
    fn test_from_step_keeps_retryability() {
        let step_error = StepError::non_retryable("bad input").with_code("INVALID");
        let error = ExecutionError::from_step(ErrorKind::StepExecution, "Step 'a' failed: bad input", &step_error);

        assert_eq!(error.cause.as_deref(), Some("bad input"));
        assert_eq!(error.retryable, Some(false));
        assert_eq!(error.code.as_deref(), Some("INVALID"));
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let result = ExecutionResult::failed(
            Context::from(json!({ "a": 1 })),
            ExecutionError::new(ErrorKind::Timeout, "too slow"),
            Duration::from_millis(1500),
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["duration"], json!(1500));
        assert_eq!(json["status"], json!("failed"));
        assert_eq!(json["error"]["kind"], json!("timeout"));
        assert!(json.get("attempts").is_none());
        assert!(json.get("children").is_none());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!InstanceStatus::Created.is_terminal());
        assert!(!InstanceStatus::Running.is_terminal());
        assert!(InstanceStatus::Cancelled.is_terminal());
    }
}
