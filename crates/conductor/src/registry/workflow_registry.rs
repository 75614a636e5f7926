//! Named store of workflow definitions and compositions
//!
//! The registry is the only shared mutable state of the engine. It is a cheap
//! handle over `Arc`-ed state; clones share definitions, middleware and history.
//! Locks are `parking_lot` and never held across an `.await`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::documentation::{
    merge_documentation, placeholder_definition, step_mismatch, DocumentationSource,
    DocumentationStatus, ValidationReport,
};
use super::error::RegistryError;
use super::history::{ExecutionHistory, HistoryRecord};
use super::middleware::{ExecutionCall, Middleware};
use super::validation::{validate_composition, validate_definition};
use crate::composer::Composition;
use crate::config::RegistryConfig;
use crate::context::Context;
use crate::engine::{ExecuteOptions, WorkflowInstance, WorkflowRunner};
use crate::persistence::{load_checkpoint, CheckpointStore};
use crate::workflow::{ErrorKind, ExecutionError, ExecutionResult, WorkflowDefinition};

/// What a registry name resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Workflow,
    Composition,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workflow => write!(f, "workflow"),
            Self::Composition => write!(f, "composition"),
        }
    }
}

/// A registered definition or composition
#[derive(Debug, Clone)]
pub enum RegistryEntry {
    Workflow {
        definition: Arc<WorkflowDefinition>,
        registered_at: DateTime<Utc>,
    },
    Composition {
        composition: Arc<Composition>,
        registered_at: DateTime<Utc>,
    },
}

impl RegistryEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Workflow { .. } => EntryKind::Workflow,
            Self::Composition { .. } => EntryKind::Composition,
        }
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        match self {
            Self::Workflow { registered_at, .. } | Self::Composition { registered_at, .. } => {
                *registered_at
            }
        }
    }
}

/// Counts of registry contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub workflows: usize,
    pub compositions: usize,
    pub placeholders: usize,
    pub middleware: usize,
    pub history: usize,
}

enum Target {
    Workflow(Arc<WorkflowDefinition>),
    Composition(Arc<Composition>),
}

impl Target {
    fn kind(&self) -> EntryKind {
        match self {
            Self::Workflow(_) => EntryKind::Workflow,
            Self::Composition(_) => EntryKind::Composition,
        }
    }
}

struct RegistryInner {
    config: RegistryConfig,
    entries: RwLock<HashMap<String, RegistryEntry>>,
    placeholders: RwLock<HashSet<String>>,
    middleware: RwLock<Vec<Arc<dyn Middleware>>>,
    history: Mutex<ExecutionHistory>,
    documentation: RwLock<Option<Arc<dyn DocumentationSource>>>,
    checkpoints: RwLock<Option<Arc<dyn CheckpointStore>>>,
}

/// Registry of workflows and compositions
///
/// # Example
///
/// ```ignore
/// let registry = WorkflowRegistry::new();
/// registry.register(
///     WorkflowDefinition::new("greet")
///         .step(Step::new("hello", |ctx, _| async move {
///             Ok(json!({ "greeting": format!("hello {}", ctx.get("name").unwrap_or(&json!("you"))) }))
///         })),
/// )?;
///
/// let result = registry.execute("greet", json!({ "name": "ana" }), &ExecuteOptions::default()).await?;
/// assert!(result.success);
/// ```
#[derive(Clone)]
pub struct WorkflowRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl WorkflowRegistry {
    /// Create an empty registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        let history = ExecutionHistory::new(config.history_limit, config.redacted_keys.clone());
        Self {
            inner: Arc::new(RegistryInner {
                config,
                entries: RwLock::new(HashMap::new()),
                placeholders: RwLock::new(HashSet::new()),
                middleware: RwLock::new(Vec::new()),
                history: Mutex::new(history),
                documentation: RwLock::new(None),
                checkpoints: RwLock::new(None),
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Validate and store a definition under its own name
    ///
    /// Re-registering a name replaces the previous entry. Documentation for
    /// the name fills metadata the definition left empty.
    pub fn register(&self, definition: WorkflowDefinition) -> Result<Arc<WorkflowDefinition>, RegistryError> {
        validate_definition(&definition)?;

        let definition = match self.documentation_for(&definition.name) {
            Some(doc) => merge_documentation(definition, &doc),
            None => definition,
        };
        let definition = Arc::new(definition);
        let name = definition.name.clone();

        self.inner.placeholders.write().remove(&name);
        let replaced = self
            .inner
            .entries
            .write()
            .insert(
                name.clone(),
                RegistryEntry::Workflow {
                    definition: Arc::clone(&definition),
                    registered_at: Utc::now(),
                },
            )
            .is_some();

        info!(
            workflow = %name,
            steps = definition.steps.len(),
            dependencies = definition.dependencies.len(),
            replaced,
            "workflow registered"
        );
        Ok(definition)
    }

    /// Store a definition under an explicit name
    pub fn register_as(
        &self,
        name: impl Into<String>,
        mut definition: WorkflowDefinition,
    ) -> Result<Arc<WorkflowDefinition>, RegistryError> {
        definition.name = name.into();
        self.register(definition)
    }

    /// Validate and store a composition
    pub fn register_composition(&self, composition: Composition) -> Result<Arc<Composition>, RegistryError> {
        validate_composition(&composition)?;

        let composition = Arc::new(composition);
        let name = composition.name.clone();

        self.inner.placeholders.write().remove(&name);
        self.inner.entries.write().insert(
            name.clone(),
            RegistryEntry::Composition {
                composition: Arc::clone(&composition),
                registered_at: Utc::now(),
            },
        );

        debug!(composition = %name, kind = %composition.composition_type(), "composition registered");
        Ok(composition)
    }

    /// Append a middleware to the chain
    pub fn use_middleware(&self, middleware: impl Middleware + 'static) {
        self.use_middleware_arc(Arc::new(middleware));
    }

    pub fn use_middleware_arc(&self, middleware: Arc<dyn Middleware>) {
        debug!(middleware = middleware.name(), "middleware added");
        self.inner.middleware.write().push(middleware);
    }

    /// Documentation consulted on registration and by the documentation helpers
    pub fn set_documentation(&self, source: impl DocumentationSource + 'static) {
        *self.inner.documentation.write() = Some(Arc::new(source));
    }

    /// Store used by resumable executions
    pub fn set_checkpoint_store(&self, store: Arc<dyn CheckpointStore>) {
        *self.inner.checkpoints.write() = Some(store);
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn get(&self, name: &str) -> Option<RegistryEntry> {
        self.inner.entries.read().get(name).cloned()
    }

    pub fn definition(&self, name: &str) -> Option<Arc<WorkflowDefinition>> {
        match self.get(name)? {
            RegistryEntry::Workflow { definition, .. } => Some(definition),
            RegistryEntry::Composition { .. } => None,
        }
    }

    pub fn composition(&self, name: &str) -> Option<Arc<Composition>> {
        match self.get(name)? {
            RegistryEntry::Composition { composition, .. } => Some(composition),
            RegistryEntry::Workflow { .. } => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.entries.read().contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let (workflows, compositions) = {
            let entries = self.inner.entries.read();
            let compositions = entries
                .values()
                .filter(|e| e.kind() == EntryKind::Composition)
                .count();
            (entries.len() - compositions, compositions)
        };

        RegistryStats {
            workflows,
            compositions,
            placeholders: self.inner.placeholders.read().len(),
            middleware: self.inner.middleware.read().len(),
            history: self.inner.history.lock().len(),
        }
    }

    /// The newest `limit` history records, oldest first
    pub fn history(&self, limit: usize) -> Vec<HistoryRecord> {
        self.inner.history.lock().recent(limit)
    }

    pub fn clear_history(&self) {
        self.inner.history.lock().clear();
    }

    /// Remove every entry and all history
    ///
    /// Middleware, documentation and the checkpoint store stay configured.
    pub fn clear(&self) {
        self.inner.entries.write().clear();
        self.inner.placeholders.write().clear();
        self.clear_history();
        info!("registry cleared");
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute a workflow or composition by name
    ///
    /// Only an unknown name or invalid options are errors; workflow failures
    /// come back as a result with `success == false`.
    pub async fn execute(
        &self,
        name: &str,
        context: impl Into<Context>,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult, RegistryError> {
        let target = match self.get(name) {
            Some(RegistryEntry::Workflow { definition, .. }) => Target::Workflow(definition),
            Some(RegistryEntry::Composition { composition, .. }) => Target::Composition(composition),
            None => {
                warn!(workflow = %name, "workflow not found");
                return Err(RegistryError::NotFound(name.to_string()));
            }
        };
        self.run(name, target, context.into(), options).await
    }

    /// Execute a registered composition by name
    pub async fn execute_composition(
        &self,
        name: &str,
        context: impl Into<Context>,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult, RegistryError> {
        let composition = self
            .composition(name)
            .ok_or_else(|| RegistryError::CompositionNotFound(name.to_string()))?;
        self.run(name, Target::Composition(composition), context.into(), options)
            .await
    }

    /// Execute an unregistered definition through the same pipeline
    pub async fn execute_definition(
        &self,
        definition: impl Into<Arc<WorkflowDefinition>>,
        context: impl Into<Context>,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult, RegistryError> {
        let definition = definition.into();
        validate_definition(&definition)?;
        let name = definition.name.clone();
        self.run(&name, Target::Workflow(definition), context.into(), options)
            .await
    }

    /// Resume a workflow from the checkpoint saved for `instance_id`
    ///
    /// Returns `Ok(None)` when no checkpoint exists. Resumed runs skip
    /// middleware but are recorded in history.
    pub async fn resume(
        &self,
        instance_id: Uuid,
        options: &ExecuteOptions,
    ) -> Result<Option<ExecutionResult>, RegistryError> {
        let Some(store) = self.checkpoint_store() else {
            return Ok(None);
        };

        let checkpoint = match load_checkpoint(store.as_ref(), instance_id).await {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(%instance_id, error = %e, "failed to load checkpoint");
                return Ok(None);
            }
        };

        let name = checkpoint.workflow_name.clone();
        let definition = self
            .definition(&name)
            .ok_or_else(|| RegistryError::NotFound(name.clone()))?;
        let context = checkpoint.context.clone();

        info!(workflow = %name, %instance_id, step_index = checkpoint.step_index, "resuming workflow");
        let instance = WorkflowInstance::resume(definition, checkpoint)?;

        // A resumed run always owns its checkpoint, so it is cleared on completion
        let options = options
            .enter(&name)
            .map_err(RegistryError::InvalidOptions)?
            .resumable();
        let result = self.configure(instance, &options).execute().await?;

        self.record(&name, EntryKind::Workflow, &context, &result);
        Ok(Some(result))
    }

    #[instrument(skip_all, fields(workflow = %name, kind = %target.kind()))]
    async fn run(
        &self,
        name: &str,
        target: Target,
        context: Context,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult, RegistryError> {
        options.validate().map_err(RegistryError::InvalidOptions)?;

        let kind = target.kind();
        let options = match options.enter(name) {
            Ok(nested) => nested,
            Err(cycle) => {
                warn!(%cycle, "circular workflow reference");
                let result = ExecutionResult::failed(
                    context.clone(),
                    ExecutionError::new(ErrorKind::DependencyFailure, format!("circular dependency {cycle}"))
                        .with_retryable(Some(false)),
                    Duration::ZERO,
                );
                self.record(name, kind, &context, &result);
                return Ok(result);
            }
        };
        let options = &options;
        let middleware: Vec<Arc<dyn Middleware>> = self.inner.middleware.read().clone();

        let mut call = ExecutionCall {
            workflow_name: name.to_string(),
            kind,
            context,
            options: options.clone(),
        };

        for m in &middleware {
            match m.before(&call).await {
                Ok(Some(replacement)) => call.context = replacement,
                Ok(None) => {}
                Err(e) => warn!(middleware = m.name(), error = %format!("{e:#}"), "before hook failed; skipping"),
            }
        }

        let result = match target {
            Target::Workflow(definition) => {
                let instance = WorkflowInstance::new(definition, call.context.clone());
                self.configure(instance, options).execute().await?
            }
            Target::Composition(composition) => {
                composition.execute(self, call.context.clone(), options).await
            }
        };

        for m in &middleware {
            if let Err(e) = m.after(&call, &result).await {
                warn!(middleware = m.name(), error = %format!("{e:#}"), "after hook failed; ignoring");
            }
        }

        self.record(name, kind, &call.context, &result);
        Ok(result)
    }

    fn configure(&self, instance: WorkflowInstance, options: &ExecuteOptions) -> WorkflowInstance {
        let instance = instance
            .with_options(options.clone())
            .with_runner(Arc::new(self.clone()))
            .with_default_step_timeout(self.inner.config.default_step_timeout);

        match self.checkpoint_store() {
            Some(store) => instance.with_checkpoint_store(store),
            None => instance,
        }
    }

    fn record(&self, name: &str, kind: EntryKind, context: &Context, result: &ExecutionResult) {
        let mut history = self.inner.history.lock();
        let record = history.record_for(name, kind, context, result);
        history.push(record);
    }

    fn checkpoint_store(&self) -> Option<Arc<dyn CheckpointStore>> {
        self.inner.checkpoints.read().clone()
    }

    // =========================================================================
    // Documentation
    // =========================================================================

    fn documentation(&self) -> Option<Arc<dyn DocumentationSource>> {
        self.inner.documentation.read().clone()
    }

    fn documentation_for(&self, name: &str) -> Option<super::documentation::WorkflowDoc> {
        self.documentation()?.get(name)
    }

    /// Compare registered workflows against the documentation
    pub fn validate_all_workflows(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        let docs = self
            .documentation()
            .map(|source| source.workflows())
            .unwrap_or_default();
        let placeholders = self.inner.placeholders.read().clone();

        let documented: HashSet<&str> = docs.iter().map(|d| d.name.as_str()).collect();

        for doc in &docs {
            match self.definition(&doc.name) {
                _ if placeholders.contains(&doc.name) => report.placeholders.push(doc.name.clone()),
                Some(definition) => match step_mismatch(doc, &definition) {
                    Some(mismatch) => report.mismatched.push(mismatch),
                    None => report.valid.push(doc.name.clone()),
                },
                None if self.composition(&doc.name).is_some() => report.valid.push(doc.name.clone()),
                None => report.missing.push(doc.name.clone()),
            }
        }

        report.undocumented = self
            .names()
            .into_iter()
            .filter(|name| !documented.contains(name.as_str()))
            .collect();

        report.valid.sort();
        report.missing.sort();
        report.placeholders.sort();
        report.mismatched.sort_by(|a, b| a.workflow.cmp(&b.workflow));

        if !report.is_valid() {
            warn!(
                missing = report.missing.len(),
                mismatched = report.mismatched.len(),
                placeholders = report.placeholders.len(),
                "workflows out of sync with documentation"
            );
        }
        report
    }

    /// Names of registered workflows in a category, sorted
    pub fn get_workflows_by_category(&self, category: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .entries
            .read()
            .iter()
            .filter_map(|(name, entry)| match entry {
                RegistryEntry::Workflow { definition, .. }
                    if definition.category.as_deref() == Some(category) =>
                {
                    Some(name.clone())
                }
                _ => None,
            })
            .collect();
        names.sort();
        names
    }

    pub fn get_documentation_status(&self) -> DocumentationStatus {
        let docs = self
            .documentation()
            .map(|source| source.workflows())
            .unwrap_or_default();
        let placeholders = self.inner.placeholders.read().clone();

        let documented = docs.len();
        let implemented = docs
            .iter()
            .filter(|d| self.contains(&d.name) && !placeholders.contains(&d.name))
            .count();
        let coverage = if documented == 0 {
            1.0
        } else {
            implemented as f64 / documented as f64
        };

        DocumentationStatus {
            documented,
            registered: self.len(),
            implemented,
            placeholders: placeholders.len(),
            coverage,
        }
    }

    /// Register a not-implemented placeholder for every documented workflow
    /// that has no definition yet
    ///
    /// Returns the names that were registered.
    pub fn auto_register_from_config(&self) -> Result<Vec<String>, RegistryError> {
        let Some(source) = self.documentation() else {
            return Ok(Vec::new());
        };

        let mut registered = Vec::new();
        for doc in source.workflows() {
            if doc.name.trim().is_empty() || self.contains(&doc.name) {
                continue;
            }
            if doc.name.trim() != doc.name {
                warn!(workflow = ?doc.name, "documented name has surrounding whitespace; skipping");
                continue;
            }
            self.register(placeholder_definition(&doc))?;
            self.inner.placeholders.write().insert(doc.name.clone());
            registered.push(doc.name);
        }

        if !registered.is_empty() {
            warn!(count = registered.len(), workflows = ?registered, "registered not-implemented placeholders");
        }
        Ok(registered)
    }
}

#[async_trait]
impl WorkflowRunner for WorkflowRegistry {
    async fn run_workflow(
        &self,
        name: &str,
        context: Context,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult, RegistryError> {
        self.execute(name, context, options).await
    }

    async fn run_definition(
        &self,
        definition: Arc<WorkflowDefinition>,
        context: Context,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult, RegistryError> {
        self.execute_definition(definition, context, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FnMiddleware, StaticDocumentation, ValidationError};
    use crate::workflow::{ErrorKind, Step, StepError};
    use serde_json::{json, Value};

    fn constant(name: &str, output: Value) -> WorkflowDefinition {
        WorkflowDefinition::new(name).step(Step::new("emit", move |_, _| {
            let output = output.clone();
            async move { Ok(output) }
        }))
    }

    #[test]
    fn test_register_rejects_without_partial_state() {
        let registry = WorkflowRegistry::new();

        let err = registry.register(WorkflowDefinition::new("x")).unwrap_err();
        assert!(matches!(err, RegistryError::Validation(ValidationError::NoSteps { .. })));
        assert!(!registry.contains("x"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregistration_replaces() {
        let registry = WorkflowRegistry::new();
        registry.register(constant("wf", json!({ "v": 1 }))).unwrap();
        registry
            .register(constant("wf", json!({ "v": 2 })).category("second"))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.definition("wf").unwrap().category.as_deref(),
            Some("second")
        );
    }

    #[tokio::test]
    async fn test_unknown_name_is_an_error() {
        let registry = WorkflowRegistry::new();
        let err = registry
            .execute("missing", json!({}), &ExecuteOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::NotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_step_failure_is_a_failed_result() {
        let registry = WorkflowRegistry::new();
        registry
            .register(WorkflowDefinition::new("wf").step(Step::new("boom", |_, _| async {
                Err(StepError::new("nope"))
            })))
            .unwrap();

        let result = registry
            .execute("wf", json!({}), &ExecuteOptions::default())
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ErrorKind::StepExecution));
        assert!(!registry.history(1)[0].success);
    }

    #[tokio::test]
    async fn test_invalid_options_are_rejected() {
        let registry = WorkflowRegistry::new();
        registry.register(constant("wf", json!({}))).unwrap();

        let err = registry
            .execute(
                "wf",
                json!({}),
                &ExecuteOptions::new().with_timeout(std::time::Duration::ZERO),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidOptions(_)));
        assert!(registry.history(10).is_empty());
    }

    #[tokio::test]
    async fn test_middleware_replacement_and_failure() {
        let registry = WorkflowRegistry::new();
        registry
            .register(WorkflowDefinition::new("echo").step(Step::new("echo", |ctx, _| async move {
                Ok(json!({ "seen": ctx.get("injected").cloned().unwrap_or(Value::Null) }))
            })))
            .unwrap();

        registry.use_middleware(FnMiddleware::new("broken", |_| Err(anyhow::anyhow!("middleware down"))));
        registry.use_middleware(FnMiddleware::new("inject", |call| {
            Ok(Some(call.context.with("injected", "yes")))
        }));

        let result = registry
            .execute("echo", json!({}), &ExecuteOptions::default())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.data.get("seen"), Some(&json!("yes")));
    }

    #[tokio::test]
    async fn test_history_is_redacted() {
        let registry = WorkflowRegistry::with_config(RegistryConfig::default().with_history_limit(2));
        registry.register(constant("wf", json!({}))).unwrap();

        for i in 0..3 {
            registry
                .execute("wf", json!({ "run": i, "password": "hunter2" }), &ExecuteOptions::default())
                .await
                .unwrap();
        }

        let history = registry.history(10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].context["run"], json!(1));
        assert_eq!(history[1].context["password"], json!("[REDACTED]"));
    }

    #[test]
    fn test_documentation_helpers() {
        let registry = WorkflowRegistry::new();
        registry.set_documentation(
            StaticDocumentation::from_json(
                r#"[
                    { "name": "create_plan", "category": "planning", "steps": ["emit"] },
                    { "name": "archive_plan", "category": "planning", "steps": ["archive"] }
                ]"#,
            )
            .unwrap(),
        );

        registry.register(constant("create_plan", json!({}))).unwrap();
        registry.register(constant("adhoc", json!({}))).unwrap();

        let report = registry.validate_all_workflows();
        assert_eq!(report.valid, vec!["create_plan"]);
        assert_eq!(report.missing, vec!["archive_plan"]);
        assert_eq!(report.undocumented, vec!["adhoc"]);

        let added = registry.auto_register_from_config().unwrap();
        assert_eq!(added, vec!["archive_plan"]);
        assert_eq!(
            registry.get_workflows_by_category("planning"),
            vec!["archive_plan", "create_plan"]
        );

        let status = registry.get_documentation_status();
        assert_eq!(status.documented, 2);
        assert_eq!(status.implemented, 1);
        assert_eq!(status.placeholders, 1);
        assert!((status.coverage - 0.5).abs() < f64::EPSILON);

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.stats().placeholders, 0);
    }
}
