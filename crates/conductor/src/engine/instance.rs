//! Workflow instance: one run of a definition against one context
//!
//! The instance is responsible for:
//! - Resolving declared dependencies before any step runs
//! - Walking steps in order, grouping contiguous parallel steps
//! - Evaluating step conditions
//! - Racing steps against soft timeouts
//! - Merging step output into the context
//! - Advisory checkpointing for resumable runs

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::{join_all, FutureExt};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::runner::{ExecuteOptions, WorkflowRunner};
use crate::context::Context;
use crate::persistence::{checkpoint_key, remove_checkpoint, save_checkpoint, Checkpoint, CheckpointStore};
use crate::workflow::{
    Dependency, ErrorHandling, ErrorKind, ExecutionError, ExecutionResult, InstanceStatus, Step,
    StepError, StepFailure, StepState, WorkflowDefinition, NOT_IMPLEMENTED_CODE,
};

/// Errors from instance lifecycle misuse
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    /// Instances are single-use
    #[error("workflow instance {id} already started (status: {status})")]
    AlreadyStarted { id: Uuid, status: InstanceStatus },

    /// Checkpoint belongs to another workflow
    #[error("checkpoint for workflow '{found}' cannot resume workflow '{expected}'")]
    CheckpointMismatch { expected: String, found: String },
}

/// Single-use execution of a [`WorkflowDefinition`]
///
/// # Example
///
/// ```ignore
/// let mut instance = WorkflowInstance::new(definition, Context::from(json!({ "x": 1 })))
///     .with_runner(Arc::new(registry.clone()));
///
/// let result = instance.execute().await?;
/// assert!(result.success);
/// ```
pub struct WorkflowInstance {
    id: Uuid,
    definition: Arc<WorkflowDefinition>,
    context: Context,
    options: ExecuteOptions,
    status: InstanceStatus,
    runner: Option<Arc<dyn WorkflowRunner>>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    default_step_timeout: Option<Duration>,

    /// First step to run; non-zero when resuming
    start_index: usize,
    resolve_dependencies: bool,

    completed_steps: Vec<String>,
    skipped_steps: Vec<String>,
    step_failures: Vec<StepFailure>,
}

impl WorkflowInstance {
    /// Create an instance in the `Created` state
    pub fn new(definition: Arc<WorkflowDefinition>, context: Context) -> Self {
        Self {
            id: Uuid::now_v7(),
            definition,
            context,
            options: ExecuteOptions::default(),
            status: InstanceStatus::Created,
            runner: None,
            checkpoints: None,
            default_step_timeout: None,
            start_index: 0,
            resolve_dependencies: true,
            completed_steps: Vec::new(),
            skipped_steps: Vec::new(),
            step_failures: Vec::new(),
        }
    }

    /// Rebuild an instance from a checkpoint
    ///
    /// The instance keeps the checkpoint's id and context, starts after the
    /// checkpointed step, and does not re-run dependencies.
    pub fn resume(
        definition: Arc<WorkflowDefinition>,
        checkpoint: Checkpoint,
    ) -> Result<Self, InstanceError> {
        if checkpoint.workflow_name != definition.name {
            return Err(InstanceError::CheckpointMismatch {
                expected: definition.name.clone(),
                found: checkpoint.workflow_name,
            });
        }

        let mut instance = Self::new(definition, checkpoint.context);
        instance.id = checkpoint.instance_id;
        instance.start_index = checkpoint.step_index + 1;
        instance.resolve_dependencies = false;
        Ok(instance)
    }

    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }

    /// Runner used to resolve dependencies by name
    pub fn with_runner(mut self, runner: Arc<dyn WorkflowRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// Soft timeout for steps that declare none and whose definition declares none
    pub fn with_default_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_step_timeout = timeout;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> InstanceStatus {
        self.status
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn checkpoint_key(&self) -> String {
        checkpoint_key(self.id)
    }

    /// Run the workflow to a terminal state
    ///
    /// Step, dependency and timeout failures are reported in the returned
    /// result; `Err` is only returned when the instance was already started.
    #[instrument(skip(self), fields(workflow = %self.definition.name, instance_id = %self.id))]
    pub async fn execute(&mut self) -> Result<ExecutionResult, InstanceError> {
        if self.status != InstanceStatus::Created {
            return Err(InstanceError::AlreadyStarted {
                id: self.id,
                status: self.status,
            });
        }

        let started = Instant::now();
        self.status = InstanceStatus::Running;
        info!(steps = self.definition.steps.len(), "workflow started");

        if self.resolve_dependencies {
            if let Err(error) = self.run_dependencies().await {
                return Ok(self.fail(error, started).await);
            }
        }

        let definition = Arc::clone(&self.definition);
        let steps = &definition.steps;
        let mut index = self.start_index;

        while index < steps.len() {
            if self.options.is_cancelled() {
                return Ok(self.cancel(index, started));
            }

            let outcome = if steps[index].is_parallel() {
                let end = index
                    + steps[index..]
                        .iter()
                        .take_while(|s| s.is_parallel())
                        .count();
                let outcome = self.run_parallel_group(index, &steps[index..end]).await;
                index = end;
                outcome
            } else {
                let outcome = self.run_single(index, &steps[index]).await;
                index += 1;
                outcome
            };

            if let Err(error) = outcome {
                return Ok(self.fail(error, started).await);
            }

            self.save_checkpoint(index - 1).await;
        }

        Ok(self.complete(started).await)
    }

    // =========================================================================
    // Dependencies
    // =========================================================================

    async fn run_dependencies(&mut self) -> Result<(), ExecutionError> {
        let definition = Arc::clone(&self.definition);

        for dependency in &definition.dependencies {
            let name = dependency.workflow.as_str();
            let Some(runner) = self.runner.clone() else {
                return Err(dependency_failure(name, "no workflow runner is configured"));
            };

            debug!(dependency = %name, "resolving dependency");
            let child_context = dependency_context(dependency, &self.context);

            match runner.run_workflow(name, child_context, &self.options).await {
                Ok(result) if result.success => {
                    self.context = self.context.merge_context(&result.data);
                }
                Ok(result) => {
                    let reason = result.error_message().unwrap_or("unknown error");
                    return Err(dependency_failure(name, reason));
                }
                Err(e) => return Err(dependency_failure(name, &e.to_string())),
            }
        }

        Ok(())
    }

    // =========================================================================
    // Steps
    // =========================================================================

    async fn run_single(&mut self, index: usize, step: &Step) -> Result<(), ExecutionError> {
        let state = self.step_state(index, step);
        if !self.should_run(step, &state) {
            return Ok(());
        }

        debug!(step = %step.name(), index, "running step");
        let timeout = self.timeout_for(step);

        match run_step(step.clone(), self.context.clone(), state, timeout).await {
            Ok(output) => {
                self.apply_output(step.name(), output);
                Ok(())
            }
            Err(error) => self.tolerate(step.name(), error),
        }
    }

    /// Run a contiguous group of parallel steps against the same snapshot
    ///
    /// Outputs are merged in declaration order once every step has settled.
    /// Under fail-fast, any failure discards the whole group's output.
    async fn run_parallel_group(&mut self, start: usize, group: &[Step]) -> Result<(), ExecutionError> {
        let mut names = Vec::with_capacity(group.len());
        let mut pending = Vec::with_capacity(group.len());

        for (offset, step) in group.iter().enumerate() {
            let state = self.step_state(start + offset, step);
            if !self.should_run(step, &state) {
                continue;
            }
            names.push(step.name().to_string());
            pending.push(run_step(
                step.clone(),
                self.context.clone(),
                state,
                self.timeout_for(step),
            ));
        }

        debug!(group_size = pending.len(), start, "running parallel group");
        let outcomes = join_all(pending).await;

        let continue_on_error = self.error_handling() == ErrorHandling::Continue;
        let mut outputs = Vec::with_capacity(outcomes.len());
        let mut first_failure: Option<(String, ExecutionError)> = None;

        for (name, outcome) in names.into_iter().zip(outcomes) {
            match outcome {
                Ok(output) => outputs.push((name, output)),
                Err(error) if continue_on_error => {
                    warn!(step = %name, error = %error, "parallel step failed; continuing");
                    self.step_failures.push(StepFailure { step: name, error });
                }
                Err(error) => {
                    first_failure.get_or_insert((name, error));
                }
            }
        }

        if let Some((step, error)) = first_failure {
            let kind = if error.kind == ErrorKind::Timeout {
                ErrorKind::Timeout
            } else {
                ErrorKind::ParallelExecution
            };
            return Err(ExecutionError::new(kind, format!("Parallel execution failed: {step}: {}", error.message))
                .with_cause(error.message)
                .with_retryable(error.retryable)
                .with_code(error.code));
        }

        for (name, output) in outputs {
            self.apply_output(&name, output);
        }
        Ok(())
    }

    fn should_run(&mut self, step: &Step, state: &StepState) -> bool {
        let Some(condition) = step.condition() else {
            return true;
        };

        match condition.evaluate(&self.context, state) {
            Ok(true) => true,
            Ok(false) => {
                debug!(step = %step.name(), "condition not met; skipping step");
                self.skipped_steps.push(step.name().to_string());
                false
            }
            Err(e) => {
                warn!(step = %step.name(), error = %e, "condition evaluation failed; skipping step");
                self.skipped_steps.push(step.name().to_string());
                false
            }
        }
    }

    fn tolerate(&mut self, step: &str, error: ExecutionError) -> Result<(), ExecutionError> {
        if self.error_handling() == ErrorHandling::Continue {
            warn!(%step, error = %error, "step failed; continuing");
            self.step_failures.push(StepFailure {
                step: step.to_string(),
                error,
            });
            return Ok(());
        }
        Err(error)
    }

    fn apply_output(&mut self, step: &str, output: Value) {
        match output {
            Value::Object(partial) => self.context = self.context.merge(&partial),
            Value::Null => {}
            other => {
                warn!(%step, kind = json_kind(&other), "step returned a non-object value; ignoring");
            }
        }
        self.completed_steps.push(step.to_string());
    }

    fn step_state(&self, index: usize, step: &Step) -> StepState {
        StepState {
            instance_id: self.id,
            workflow_name: self.definition.name.clone(),
            step_index: index,
            step_name: step.name().to_string(),
            completed_steps: self.completed_steps.clone(),
            options: self.options.clone(),
        }
    }

    fn timeout_for(&self, step: &Step) -> Option<Duration> {
        step.timeout()
            .or(self.definition.timeout)
            .or(self.default_step_timeout)
    }

    fn error_handling(&self) -> ErrorHandling {
        self.options
            .error_handling
            .or(self.definition.error_handling)
            .unwrap_or_default()
    }

    // =========================================================================
    // Checkpoints
    // =========================================================================

    async fn save_checkpoint(&self, step_index: usize) {
        if !self.options.resumable {
            return;
        }
        let Some(store) = &self.checkpoints else {
            return;
        };

        let checkpoint = Checkpoint {
            instance_id: self.id,
            workflow_name: self.definition.name.clone(),
            step_index,
            context: self.context.clone(),
            saved_at: Utc::now(),
        };

        if let Err(e) = save_checkpoint(store.as_ref(), &checkpoint).await {
            warn!(step_index, error = %e, "failed to persist checkpoint");
        }
    }

    async fn clear_checkpoint(&self) {
        if !self.options.resumable {
            return;
        }
        if let Some(store) = &self.checkpoints {
            if let Err(e) = remove_checkpoint(store.as_ref(), self.id).await {
                warn!(error = %e, "failed to remove checkpoint");
            }
        }
    }

    // =========================================================================
    // Terminal transitions
    // =========================================================================

    async fn complete(&mut self, started: Instant) -> ExecutionResult {
        self.status = InstanceStatus::Completed;
        self.clear_checkpoint().await;

        let duration = started.elapsed();
        info!(
            duration_ms = duration.as_millis() as u64,
            skipped = self.skipped_steps.len(),
            "workflow completed"
        );

        let result = ExecutionResult::completed(self.context.clone(), duration);
        self.decorate(result)
    }

    async fn fail(&mut self, error: ExecutionError, started: Instant) -> ExecutionResult {
        self.status = InstanceStatus::Failed;
        self.clear_checkpoint().await;

        error!(kind = ?error.kind, error = %error.message, "workflow failed");

        let result = ExecutionResult::failed(self.context.clone(), error, started.elapsed());
        self.decorate(result)
    }

    /// Cancellation keeps the checkpoint so the caller can resume later
    fn cancel(&mut self, next_index: usize, started: Instant) -> ExecutionResult {
        self.status = InstanceStatus::Cancelled;
        info!(next_step = next_index, "workflow cancelled");

        let result = ExecutionResult::cancelled(
            self.context.clone(),
            format!("Workflow '{}' was cancelled", self.definition.name),
            started.elapsed(),
        );
        self.decorate(result)
    }

    fn decorate(&mut self, mut result: ExecutionResult) -> ExecutionResult {
        result.instance_id = Some(self.id);
        result.skipped_steps = std::mem::take(&mut self.skipped_steps);
        result.step_failures = std::mem::take(&mut self.step_failures);
        result
    }
}

impl std::fmt::Debug for WorkflowInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowInstance")
            .field("id", &self.id)
            .field("workflow", &self.definition.name)
            .field("status", &self.status)
            .field("start_index", &self.start_index)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Invoke a step, converting errors and panics into [`ExecutionError`]s
///
/// With a timeout the step is spawned and raced against a timer. On expiry the
/// spawned task is detached, not aborted: it keeps running in the background.
async fn run_step(
    step: Step,
    context: Context,
    state: StepState,
    timeout: Option<Duration>,
) -> Result<Value, ExecutionError> {
    let name = step.name().to_string();
    let future = step.invoke(context, state);

    let Some(limit) = timeout else {
        return match AssertUnwindSafe(future).catch_unwind().await {
            Ok(outcome) => outcome.map_err(|e| step_failure(&name, &e)),
            Err(panic) => Err(step_panicked(&name, panic_message(panic.as_ref()))),
        };
    };

    let handle = tokio::spawn(future);
    tokio::select! {
        joined = handle => match joined {
            Ok(outcome) => outcome.map_err(|e| step_failure(&name, &e)),
            Err(join_error) => Err(step_panicked(&name, join_error.to_string())),
        },
        _ = tokio::time::sleep(limit) => {
            warn!(step = %name, timeout_ms = limit.as_millis() as u64, "step timed out; it keeps running in the background");
            Err(ExecutionError::new(
                ErrorKind::Timeout,
                format!("Step '{}' timed out after {}ms", name, limit.as_millis()),
            )
            .with_retryable(Some(true)))
        }
    }
}

fn step_failure(step: &str, error: &StepError) -> ExecutionError {
    if error.code.as_deref() == Some(NOT_IMPLEMENTED_CODE) {
        return ExecutionError::from_step(ErrorKind::NotImplemented, error.message.clone(), error);
    }
    ExecutionError::from_step(
        ErrorKind::StepExecution,
        format!("Step '{}' failed: {}", step, error.message),
        error,
    )
}

fn step_panicked(step: &str, message: String) -> ExecutionError {
    ExecutionError::new(ErrorKind::StepExecution, format!("Step '{step}' panicked"))
        .with_cause(message)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn dependency_failure(name: &str, reason: &str) -> ExecutionError {
    ExecutionError::new(
        ErrorKind::DependencyFailure,
        format!("Dependency '{name}' failed: {reason}"),
    )
    .with_cause(reason.to_string())
}

/// Build the context handed to a dependency
fn dependency_context(dependency: &Dependency, parent: &Context) -> Context {
    let Some(mapping) = &dependency.context else {
        return parent.clone();
    };

    let mut values = Map::new();
    for (child_key, parent_path) in mapping {
        if let Some(value) = parent.get_path(parent_path) {
            values.insert(child_key.clone(), value.clone());
        }
    }
    Context::from_map(values)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{load_checkpoint, InMemoryCheckpointStore};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn instance(definition: WorkflowDefinition, context: Value) -> WorkflowInstance {
        WorkflowInstance::new(Arc::new(definition), Context::from(context))
    }

    #[tokio::test]
    async fn test_steps_merge_in_order() {
        let definition = WorkflowDefinition::new("wf")
            .step(Step::new("ex1", |_, _| async { Ok(json!({ "a": 1 })) }))
            .step(Step::new("ex2", |ctx, _| async move {
                let a = ctx.get("a").and_then(Value::as_i64).unwrap_or(0);
                Ok(json!({ "b": a + 1 }))
            }));

        let result = instance(definition, json!({})).execute().await.unwrap();

        assert!(result.success);
        assert_eq!(result.data.to_value(), json!({ "a": 1, "b": 2 }));
        assert_eq!(result.status, InstanceStatus::Completed);
    }

    #[tokio::test]
    async fn test_instance_is_single_use() {
        let definition = WorkflowDefinition::new("wf")
            .step(Step::new("noop", |_, _| async { Ok(Value::Null) }));
        let mut instance = instance(definition, json!({}));

        instance.execute().await.unwrap();
        assert_eq!(instance.status(), InstanceStatus::Completed);

        let err = instance.execute().await.unwrap_err();
        assert!(matches!(err, InstanceError::AlreadyStarted { status: InstanceStatus::Completed, .. }));
    }

    #[tokio::test]
    async fn test_false_condition_never_invokes_step() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let definition = WorkflowDefinition::new("wf").step(
            Step::new("guarded", move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(json!({ "ran": true })) }
            })
            .when("x === 5"),
        );

        let result = instance(definition, json!({ "x": 4 })).execute().await.unwrap();

        assert!(result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.data.to_value(), json!({ "x": 4 }));
        assert_eq!(result.skipped_steps, vec!["guarded"]);
    }

    #[tokio::test]
    async fn test_predicate_error_skips_step_only() {
        let definition = WorkflowDefinition::new("wf")
            .step(Step::new("risky", |_, _| async { Ok(json!({ "risky": true })) })
                .when(crate::workflow::Condition::predicate(|_, _| Err(anyhow::anyhow!("bad predicate")))))
            .step(Step::new("after", |_, _| async { Ok(json!({ "after": true })) }));

        let result = instance(definition, json!({})).execute().await.unwrap();

        assert!(result.success);
        assert_eq!(result.data.get("risky"), None);
        assert_eq!(result.data.get("after"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_step_error_fails_with_partial_context() {
        let definition = WorkflowDefinition::new("wf")
            .step(Step::new("first", |_, _| async { Ok(json!({ "first": true })) }))
            .step(Step::new("broken", |_, _| async { Err(StepError::new("disk full")) }))
            .step(Step::new("never", |_, _| async { Ok(json!({ "never": true })) }));

        let result = instance(definition, json!({})).execute().await.unwrap();

        assert!(!result.success);
        assert_eq!(result.status, InstanceStatus::Failed);
        let error = result.error.unwrap();
        assert_eq!(error.kind, ErrorKind::StepExecution);
        assert_eq!(error.message, "Step 'broken' failed: disk full");
        assert_eq!(error.cause.as_deref(), Some("disk full"));
        assert_eq!(result.data.to_value(), json!({ "first": true }));
    }

    #[tokio::test]
    async fn test_panicking_step_is_a_step_failure() {
        let definition = WorkflowDefinition::new("wf").step(Step::new("boom", |_, _| async {
            if true {
                panic!("unexpected state");
            }
            Ok(Value::Null)
        }));

        let result = instance(definition, json!({})).execute().await.unwrap();

        let error = result.error.unwrap();
        assert_eq!(error.kind, ErrorKind::StepExecution);
        assert_eq!(error.cause.as_deref(), Some("unexpected state"));
    }

    #[tokio::test]
    async fn test_continue_policy_records_failures() {
        let definition = WorkflowDefinition::new("wf")
            .error_handling(ErrorHandling::Continue)
            .step(Step::new("broken", |_, _| async { Err(StepError::new("nope")) }))
            .step(Step::new("ok", |_, _| async { Ok(json!({ "ok": true })) }));

        let result = instance(definition, json!({})).execute().await.unwrap();

        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.step_failures.len(), 1);
        assert_eq!(result.step_failures[0].step, "broken");
        assert_eq!(result.data.get("ok"), Some(&json!(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_timeout_leaves_step_running() {
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = finished.clone();
        let definition = WorkflowDefinition::new("wf").step(
            Step::new("slow", move |_, _| {
                let flag = flag.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    flag.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({ "slow": true }))
                }
            })
            .with_timeout(Duration::from_millis(100)),
        );

        let result = instance(definition, json!({})).execute().await.unwrap();

        let error = result.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Timeout);
        assert_eq!(error.message, "Step 'slow' timed out after 100ms");
        assert_eq!(result.data.get("slow"), None);

        // The detached step still completes on its own
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_definition_timeout_applies_to_steps() {
        let definition = WorkflowDefinition::new("wf")
            .timeout(Duration::from_millis(50))
            .step(Step::new("slow", |_, _| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(Value::Null)
            }));

        let result = instance(definition, json!({})).execute().await.unwrap();
        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_dependency_without_runner_fails() {
        let definition = WorkflowDefinition::new("wf")
            .depends_on("X")
            .step(Step::new("a", |_, _| async { Ok(json!({ "a": 1 })) }));

        let result = instance(definition, json!({})).execute().await.unwrap();

        assert_eq!(result.error_kind(), Some(ErrorKind::DependencyFailure));
        assert!(result.error_message().unwrap().starts_with("Dependency 'X' failed"));
        assert_eq!(result.data.get("a"), None);
    }

    #[test]
    fn test_dependency_context_mapping() {
        let parent = Context::from(json!({ "order": { "customer": { "id": 7 } }, "region": "eu" }));

        let mapped = dependency_context(
            &Dependency::new("load").with_mapping("customer_id", "order.customer.id"),
            &parent,
        );
        assert_eq!(mapped.to_value(), json!({ "customer_id": 7 }));

        let whole = dependency_context(&Dependency::new("load"), &parent);
        assert_eq!(whole, parent);
    }

    #[tokio::test]
    async fn test_cancellation_between_steps() {
        let token = tokio_util::sync::CancellationToken::new();
        let trigger = token.clone();
        let definition = WorkflowDefinition::new("wf")
            .step(Step::new("first", move |_, _| {
                trigger.cancel();
                async { Ok(json!({ "first": true })) }
            }))
            .step(Step::new("second", |_, _| async { Ok(json!({ "second": true })) }));

        let result = instance(definition, json!({}))
            .with_options(ExecuteOptions::new().with_cancellation(token))
            .execute()
            .await
            .unwrap();

        assert_eq!(result.status, InstanceStatus::Cancelled);
        assert_eq!(result.error_kind(), Some(ErrorKind::Cancelled));
        assert_eq!(result.data.get("first"), Some(&json!(true)));
        assert_eq!(result.data.get("second"), None);
    }

    #[tokio::test]
    async fn test_checkpoints_are_saved_and_cleared() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let observer = store.clone();

        let definition = WorkflowDefinition::new("wf")
            .step(Step::new("a", |_, _| async { Ok(json!({ "a": 1 })) }))
            .step(Step::new("b", move |_, state| {
                let observer = observer.clone();
                async move {
                    // Step "a" has been checkpointed by the time "b" starts
                    let saved = load_checkpoint(observer.as_ref(), state.instance_id)
                        .await
                        .map_err(|e| StepError::new(e.to_string()))?
                        .ok_or_else(|| StepError::new("missing checkpoint"))?;
                    Ok(json!({ "seen_index": saved.step_index }))
                }
            }));

        let result = instance(definition, json!({}))
            .with_options(ExecuteOptions::new().resumable())
            .with_checkpoint_store(store.clone())
            .execute()
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.data.get("seen_index"), Some(&json!(0)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_resume_starts_after_checkpointed_step() {
        let definition = Arc::new(
            WorkflowDefinition::new("wf")
                .step(Step::new("a", |_, _| async { Err(StepError::new("must not re-run")) }))
                .step(Step::new("b", |_, _| async { Ok(json!({ "b": true })) })),
        );

        let checkpoint = Checkpoint {
            instance_id: Uuid::now_v7(),
            workflow_name: "wf".to_string(),
            step_index: 0,
            context: Context::from(json!({ "a": 1 })),
            saved_at: Utc::now(),
        };
        let expected_id = checkpoint.instance_id;

        let mut resumed = WorkflowInstance::resume(definition, checkpoint).unwrap();
        assert_eq!(resumed.id(), expected_id);

        let result = resumed.execute().await.unwrap();
        assert!(result.success);
        assert_eq!(result.data.to_value(), json!({ "a": 1, "b": true }));
    }

    #[test]
    fn test_resume_rejects_foreign_checkpoint() {
        let definition = Arc::new(WorkflowDefinition::new("wf"));
        let checkpoint = Checkpoint {
            instance_id: Uuid::now_v7(),
            workflow_name: "other".to_string(),
            step_index: 0,
            context: Context::new(),
            saved_at: Utc::now(),
        };

        let err = WorkflowInstance::resume(definition, checkpoint).unwrap_err();
        assert!(matches!(err, InstanceError::CheckpointMismatch { .. }));
    }
}
