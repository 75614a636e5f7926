//! Workflow definition

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Step;

/// How an instance reacts to a failing step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorHandling {
    /// The first failing step fails the workflow
    #[default]
    FailFast,

    /// Failing steps are recorded and execution moves on
    Continue,
}

impl fmt::Display for ErrorHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail-fast"),
            Self::Continue => write!(f, "continue"),
        }
    }
}

/// A workflow that must succeed before the dependent workflow's steps run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Registered workflow or composition name
    pub workflow: String,

    /// Child context mapping: child key -> dotted path in the parent context
    ///
    /// When absent the dependency receives the whole parent context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

impl Dependency {
    pub fn new(workflow: impl Into<String>) -> Self {
        Self {
            workflow: workflow.into(),
            context: None,
        }
    }

    /// Pass `parent_path` from the parent context as `child_key`
    pub fn with_mapping(mut self, child_key: impl Into<String>, parent_path: impl Into<String>) -> Self {
        self.context
            .get_or_insert_with(BTreeMap::new)
            .insert(child_key.into(), parent_path.into());
        self
    }
}

impl From<&str> for Dependency {
    fn from(workflow: &str) -> Self {
        Self::new(workflow)
    }
}

impl From<String> for Dependency {
    fn from(workflow: String) -> Self {
        Self::new(workflow)
    }
}

/// An ordered list of steps plus metadata
///
/// # Example
///
/// ```
/// use conductor::workflow::{Step, WorkflowDefinition};
/// use serde_json::json;
///
/// let definition = WorkflowDefinition::new("create_plan")
///     .category("planning")
///     .depends_on("load_customer")
///     .step(Step::new("draft", |_, _| async { Ok(json!({ "draft": true })) }))
///     .step(Step::new("publish", |_, _| async { Ok(json!({ "published": true })) }));
///
/// assert_eq!(definition.step_names(), vec!["draft", "publish"]);
/// ```
#[derive(Clone, Default)]
pub struct WorkflowDefinition {
    pub name: String,
    pub steps: Vec<Step>,
    pub dependencies: Vec<Dependency>,
    pub category: Option<String>,
    pub description: Option<String>,

    /// Default soft timeout for steps that do not declare their own
    ///
    /// Applied to each step separately; it does not bound the workflow as a
    /// whole. A documented workflow timeout merged in at registration behaves
    /// the same way.
    pub timeout: Option<Duration>,

    /// Context keys callers should re-read after the workflow completes
    pub context_refresh: BTreeSet<String>,
    pub error_handling: Option<ErrorHandling>,
    pub retryable: Option<bool>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a step
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append several steps in order
    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Declare a dependency on another workflow
    pub fn depends_on(mut self, dependency: impl Into<Dependency>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Per-step soft timeout for steps without their own, not a whole-workflow budget
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn refresh(mut self, key: impl Into<String>) -> Self {
        self.context_refresh.insert(key.into());
        self
    }

    pub fn error_handling(mut self, policy: ErrorHandling) -> Self {
        self.error_handling = Some(policy);
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(Step::name).collect()
    }
}

impl fmt::Debug for WorkflowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowDefinition")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .field("dependencies", &self.dependencies)
            .field("category", &self.category)
            .field("timeout", &self.timeout)
            .field("error_handling", &self.error_handling)
            .field("retryable", &self.retryable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_handling_serde() {
        let json = serde_json::to_string(&ErrorHandling::FailFast).unwrap();
        assert_eq!(json, "\"fail-fast\"");

        let parsed: ErrorHandling = serde_json::from_str("\"continue\"").unwrap();
        assert_eq!(parsed, ErrorHandling::Continue);
    }

    #[test]
    fn test_dependency_mapping() {
        let dep = Dependency::new("load_customer")
            .with_mapping("customer_id", "order.customer.id")
            .with_mapping("region", "region");

        let mapping = dep.context.unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["customer_id"], "order.customer.id");
    }

    #[test]
    fn test_dependency_deserializes_without_mapping() {
        let dep: Dependency = serde_json::from_str(r#"{ "workflow": "x" }"#).unwrap();
        assert_eq!(dep, Dependency::new("x"));
    }

    #[test]
    fn test_debug_lists_step_names() {
        let definition = WorkflowDefinition::new("wf")
            .step(Step::new("a", |_, _| async { Ok(serde_json::Value::Null) }));
        assert!(format!("{definition:?}").contains("[\"a\"]"));
    }
}
