//! External workflow documentation
//!
//! Documentation records describe workflows by name. They fill metadata gaps in
//! registered definitions and produce fail-loud placeholders for workflows that
//! are documented but not implemented yet.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::workflow::result::option_duration_millis;
use crate::workflow::{ErrorHandling, Step, StepError, WorkflowDefinition};

/// Step name used when a documented workflow lists no steps
pub const PLACEHOLDER_STEP: &str = "execute";

/// Documentation for one workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowDoc {
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,

    /// Milliseconds
    #[serde(with = "option_duration_millis", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    pub steps: Vec<String>,
    pub context_refresh: Vec<String>,
    pub error_handling: Option<ErrorHandling>,
    pub retryable: Option<bool>,
}

/// Source of workflow documentation
pub trait DocumentationSource: Send + Sync {
    /// All documented workflows
    fn workflows(&self) -> Vec<WorkflowDoc>;

    fn get(&self, name: &str) -> Option<WorkflowDoc> {
        self.workflows().into_iter().find(|doc| doc.name == name)
    }
}

/// Documentation held in memory, typically loaded from JSON
#[derive(Debug, Clone, Default)]
pub struct StaticDocumentation {
    docs: Vec<WorkflowDoc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentationFile {
    List(Vec<WorkflowDoc>),
    Wrapped { workflows: Vec<WorkflowDoc> },
}

impl StaticDocumentation {
    pub fn new(docs: impl IntoIterator<Item = WorkflowDoc>) -> Self {
        Self {
            docs: docs.into_iter().collect(),
        }
    }

    /// Parse either a JSON array of records or `{"workflows": [...]}`
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let docs = match serde_json::from_str(json)? {
            DocumentationFile::List(docs) => docs,
            DocumentationFile::Wrapped { workflows } => workflows,
        };
        Ok(Self { docs })
    }
}

impl DocumentationSource for StaticDocumentation {
    fn workflows(&self) -> Vec<WorkflowDoc> {
        self.docs.clone()
    }
}

/// Fill metadata the definition left empty; explicit fields always win
pub fn merge_documentation(mut definition: WorkflowDefinition, doc: &WorkflowDoc) -> WorkflowDefinition {
    if definition.category.is_none() {
        definition.category = doc.category.clone();
    }
    if definition.description.is_none() {
        definition.description = doc.description.clone();
    }
    if definition.timeout.is_none() {
        definition.timeout = doc.timeout.filter(|t| !t.is_zero());
    }
    if definition.context_refresh.is_empty() {
        definition.context_refresh = doc.context_refresh.iter().cloned().collect();
    }
    if definition.error_handling.is_none() {
        definition.error_handling = doc.error_handling;
    }
    if definition.retryable.is_none() {
        definition.retryable = doc.retryable;
    }
    definition
}

/// Definition whose steps always fail with a not-implemented error
pub fn placeholder_definition(doc: &WorkflowDoc) -> WorkflowDefinition {
    let step_names: Vec<String> = if doc.steps.is_empty() {
        vec![PLACEHOLDER_STEP.to_string()]
    } else {
        doc.steps.clone()
    };

    let steps = step_names.into_iter().map(|step| {
        let message = format!("Workflow '{}' step '{}' is not implemented", doc.name, step);
        Step::new(step, move |_, _| {
            let message = message.clone();
            async move { Err(StepError::not_implemented(message)) }
        })
    });

    let definition = WorkflowDefinition::new(doc.name.clone()).steps(steps);
    merge_documentation(definition, doc)
}

/// Documented steps that differ from the registered definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMismatch {
    pub workflow: String,
    /// Documented but not defined
    pub missing_steps: Vec<String>,
    /// Defined but not documented
    pub extra_steps: Vec<String>,
}

/// Registry contents compared against documentation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Registered and matching their documentation
    pub valid: Vec<String>,
    /// Documented but not registered
    pub missing: Vec<String>,
    /// Registered workflows with no documentation
    pub undocumented: Vec<String>,
    /// Registered but steps differ from documentation
    pub mismatched: Vec<StepMismatch>,
    /// Registered only as not-implemented placeholders
    pub placeholders: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty() && self.placeholders.is_empty()
    }
}

/// Coverage of documented workflows by real implementations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentationStatus {
    pub documented: usize,
    pub registered: usize,
    /// Documented and registered with a real definition
    pub implemented: usize,
    pub placeholders: usize,
    /// `implemented / documented`, 1.0 when nothing is documented
    pub coverage: f64,
}

/// Compare documented step names with a definition's step names
pub(crate) fn step_mismatch(doc: &WorkflowDoc, definition: &WorkflowDefinition) -> Option<StepMismatch> {
    if doc.steps.is_empty() {
        return None;
    }

    let documented: BTreeSet<&str> = doc.steps.iter().map(String::as_str).collect();
    let defined: BTreeSet<&str> = definition.steps.iter().map(Step::name).collect();

    if documented == defined {
        return None;
    }

    Some(StepMismatch {
        workflow: doc.name.clone(),
        missing_steps: documented.difference(&defined).map(|s| s.to_string()).collect(),
        extra_steps: defined.difference(&documented).map(|s| s.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::engine::WorkflowInstance;
    use crate::workflow::{ErrorKind, NOT_IMPLEMENTED_CODE};
    use serde_json::{json, Value};
    use std::sync::Arc;

    const DOCS: &str = r#"{
        "workflows": [
            {
                "name": "create_plan",
                "category": "planning",
                "timeout": 5000,
                "steps": ["draft", "publish"],
                "contextRefresh": ["plans"],
                "errorHandling": "continue",
                "retryable": true
            },
            { "name": "archive_plan" }
        ]
    }"#;

    #[test]
    fn test_from_json_accepts_both_shapes() {
        let wrapped = StaticDocumentation::from_json(DOCS).unwrap();
        assert_eq!(wrapped.workflows().len(), 2);

        let doc = wrapped.get("create_plan").unwrap();
        assert_eq!(doc.timeout, Some(Duration::from_millis(5000)));
        assert_eq!(doc.error_handling, Some(ErrorHandling::Continue));

        let list = StaticDocumentation::from_json(r#"[{ "name": "a" }]"#).unwrap();
        assert_eq!(list.workflows()[0].name, "a");
    }

    #[test]
    fn test_explicit_fields_win_over_documentation() {
        let docs = StaticDocumentation::from_json(DOCS).unwrap();
        let doc = docs.get("create_plan").unwrap();

        let definition = WorkflowDefinition::new("create_plan")
            .category("custom")
            .step(Step::new("draft", |_, _| async { Ok(Value::Null) }));
        let merged = merge_documentation(definition, &doc);

        assert_eq!(merged.category.as_deref(), Some("custom"));
        assert_eq!(merged.timeout, Some(Duration::from_millis(5000)));
        assert_eq!(merged.retryable, Some(true));
        assert!(merged.context_refresh.contains("plans"));
    }

    #[test]
    fn test_step_mismatch() {
        let doc = WorkflowDoc {
            name: "wf".to_string(),
            steps: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        };
        let definition = WorkflowDefinition::new("wf")
            .step(Step::new("a", |_, _| async { Ok(Value::Null) }))
            .step(Step::new("c", |_, _| async { Ok(Value::Null) }));

        let mismatch = step_mismatch(&doc, &definition).unwrap();
        assert_eq!(mismatch.missing_steps, vec!["b"]);
        assert_eq!(mismatch.extra_steps, vec!["c"]);
    }

    #[tokio::test]
    async fn test_placeholder_fails_not_implemented() {
        let doc = WorkflowDoc {
            name: "archive_plan".to_string(),
            ..Default::default()
        };
        let definition = placeholder_definition(&doc);
        assert_eq!(definition.step_names(), vec![PLACEHOLDER_STEP]);

        let result = WorkflowInstance::new(Arc::new(definition), Context::from(json!({})))
            .execute()
            .await
            .unwrap();

        let error = result.error.unwrap();
        assert_eq!(error.kind, ErrorKind::NotImplemented);
        assert_eq!(error.retryable, Some(false));
        assert_eq!(error.code.as_deref(), Some(NOT_IMPLEMENTED_CODE));
        assert_eq!(
            error.message,
            "Workflow 'archive_plan' step 'execute' is not implemented"
        );
    }
}
