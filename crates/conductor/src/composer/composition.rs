//! Compositions: higher-order combinators over workflows
//!
//! A composition never runs steps itself. Every child goes through a
//! [`WorkflowRunner`], so dependency resolution, middleware and history apply
//! to composed children exactly as they do to top-level calls.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::retry::RetryPolicy;
use crate::context::Context;
use crate::engine::{ExecuteOptions, WorkflowRunner};
use crate::workflow::{
    ChildResult, Condition, ErrorKind, ExecutionError, ExecutionResult, StepState, Summary,
    WorkflowDefinition,
};

/// A child of a composition: a registered name or an inline definition
#[derive(Clone)]
pub enum ChildWorkflow {
    Named(String),
    Inline(Arc<WorkflowDefinition>),
}

impl ChildWorkflow {
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Inline(definition) => &definition.name,
        }
    }
}

impl fmt::Debug for ChildWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Inline(definition) => f.debug_tuple("Inline").field(&definition.name).finish(),
        }
    }
}

impl From<&str> for ChildWorkflow {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for ChildWorkflow {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<WorkflowDefinition> for ChildWorkflow {
    fn from(definition: WorkflowDefinition) -> Self {
        Self::Inline(Arc::new(definition))
    }
}

impl From<Arc<WorkflowDefinition>> for ChildWorkflow {
    fn from(definition: Arc<WorkflowDefinition>) -> Self {
        Self::Inline(definition)
    }
}

/// Control-flow pattern of a composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionType {
    Sequential,
    Parallel,
    Conditional,
    Retry,
}

impl fmt::Display for CompositionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
            Self::Conditional => write!(f, "conditional"),
            Self::Retry => write!(f, "retry"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequentialOptions {
    /// Stop at the first failing child
    pub fail_fast: bool,
    /// Feed each successful child's data into the next child's context
    pub pass_data_between: bool,
}

impl Default for SequentialOptions {
    fn default() -> Self {
        Self {
            fail_fast: true,
            pass_data_between: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelOptions {
    /// Require every child to succeed; otherwise one success is enough
    pub fail_fast: bool,
    /// Merge successful children's data into the composed data
    pub aggregate_results: bool,
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            fail_fast: false,
            aggregate_results: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConditionalOptions {
    /// Runs when no branch matches
    pub default_workflow: Option<ChildWorkflow>,
    /// Run every matching branch instead of only the first
    pub evaluate_all: bool,
}

/// Decides whether a failed attempt may be retried
pub type RetryCondition = Arc<dyn Fn(&ExecutionError) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct RetryOptions {
    pub policy: RetryPolicy,
    pub retry_condition: RetryCondition,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            retry_condition: Arc::new(default_retry_condition),
        }
    }
}

impl RetryOptions {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn with_retry_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&ExecutionError) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Arc::new(condition);
        self
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Retry unless the failure says it is not retryable
pub fn default_retry_condition(error: &ExecutionError) -> bool {
    error.retryable != Some(false)
}

/// One branch of a conditional composition
#[derive(Debug, Clone)]
pub struct Branch {
    pub condition: Condition,
    pub workflow: ChildWorkflow,
}

impl Branch {
    pub fn new(condition: impl Into<Condition>, workflow: impl Into<ChildWorkflow>) -> Self {
        Self {
            condition: condition.into(),
            workflow: workflow.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CompositionKind {
    Sequential {
        workflows: Vec<ChildWorkflow>,
        options: SequentialOptions,
    },
    Parallel {
        workflows: Vec<ChildWorkflow>,
        options: ParallelOptions,
    },
    Conditional {
        branches: Vec<Branch>,
        options: ConditionalOptions,
    },
    Retry {
        workflow: ChildWorkflow,
        options: RetryOptions,
    },
}

/// A named combinator registered next to plain workflow definitions
#[derive(Debug, Clone)]
pub struct Composition {
    pub name: String,
    pub kind: CompositionKind,
    pub created_at: DateTime<Utc>,
}

impl Composition {
    pub fn new(name: impl Into<String>, kind: CompositionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            created_at: Utc::now(),
        }
    }

    pub fn composition_type(&self) -> CompositionType {
        match self.kind {
            CompositionKind::Sequential { .. } => CompositionType::Sequential,
            CompositionKind::Parallel { .. } => CompositionType::Parallel,
            CompositionKind::Conditional { .. } => CompositionType::Conditional,
            CompositionKind::Retry { .. } => CompositionType::Retry,
        }
    }

    /// Every child the composition may run, in declaration order
    pub fn children(&self) -> Vec<&ChildWorkflow> {
        match &self.kind {
            CompositionKind::Sequential { workflows, .. }
            | CompositionKind::Parallel { workflows, .. } => workflows.iter().collect(),
            CompositionKind::Conditional { branches, options } => branches
                .iter()
                .map(|b| &b.workflow)
                .chain(options.default_workflow.as_ref())
                .collect(),
            CompositionKind::Retry { workflow, .. } => vec![workflow],
        }
    }

    /// Run the composition, delegating every child to `runner`
    ///
    /// Child failures are folded into the returned result according to the
    /// composition's own policy; this never fails outright.
    #[instrument(skip_all, fields(composition = %self.name, kind = %self.composition_type()))]
    pub async fn execute(
        &self,
        runner: &dyn WorkflowRunner,
        context: Context,
        options: &ExecuteOptions,
    ) -> ExecutionResult {
        let started = Instant::now();
        info!("composition started");

        let mut result = match &self.kind {
            CompositionKind::Sequential {
                workflows,
                options: seq,
            } => self.run_sequential(runner, workflows, seq, context, options).await,
            CompositionKind::Parallel {
                workflows,
                options: par,
            } => self.run_parallel(runner, workflows, par, context, options).await,
            CompositionKind::Conditional {
                branches,
                options: cond,
            } => self.run_conditional(runner, branches, cond, context, options).await,
            CompositionKind::Retry {
                workflow,
                options: retry,
            } => self.run_retry(runner, workflow, retry, context, options).await,
        };

        result.duration = started.elapsed();
        info!(
            success = result.success,
            duration_ms = result.duration.as_millis() as u64,
            "composition finished"
        );
        result
    }

    async fn run_sequential(
        &self,
        runner: &dyn WorkflowRunner,
        workflows: &[ChildWorkflow],
        seq: &SequentialOptions,
        context: Context,
        options: &ExecuteOptions,
    ) -> ExecutionResult {
        let total = workflows.len();
        let mut accumulated = context.clone();
        let mut children = Vec::with_capacity(total);
        let mut summary = Summary {
            total,
            ..Summary::default()
        };
        let mut abort: Option<ExecutionError> = None;

        for child in workflows {
            if options.is_cancelled() {
                let mut result = ExecutionResult::cancelled(accumulated, self.cancelled_message(), Duration::ZERO);
                result.summary = Some(summary);
                result.children = children;
                return result;
            }

            let input = if seq.pass_data_between {
                accumulated.clone()
            } else {
                context.clone()
            };
            let result = run_child(runner, child, input, options).await;

            if result.success {
                summary.successful += 1;
                accumulated = accumulated.merge_context(&result.data);
            } else {
                summary.failed += 1;
                if seq.fail_fast {
                    let message = failure_message(&result, child);
                    abort = Some(
                        ExecutionError::new(
                            ErrorKind::Composition,
                            format!(
                                "Sequential composition '{}' failed at '{}': {}",
                                self.name,
                                child.name(),
                                message
                            ),
                        )
                        .with_cause(message)
                        .with_retryable(result.error.as_ref().and_then(|e| e.retryable)),
                    );
                }
            }

            children.push(ChildResult {
                workflow: child.name().to_string(),
                result,
            });

            if abort.is_some() {
                debug!("sequential composition stopped at first failure");
                break;
            }
        }

        let error = abort.or_else(|| (summary.failed > 0).then(|| aggregate_error(&summary)));
        let mut result = finish(accumulated, error);
        result.summary = Some(summary);
        result.children = children;
        result
    }

    async fn run_parallel(
        &self,
        runner: &dyn WorkflowRunner,
        workflows: &[ChildWorkflow],
        par: &ParallelOptions,
        context: Context,
        options: &ExecuteOptions,
    ) -> ExecutionResult {
        if options.is_cancelled() {
            return ExecutionResult::cancelled(context, self.cancelled_message(), Duration::ZERO);
        }

        // All children start before any is awaited
        let pending = workflows
            .iter()
            .map(|child| run_child(runner, child, context.clone(), options));
        let results = join_all(pending).await;

        let mut data = context;
        let mut summary = Summary {
            total: workflows.len(),
            ..Summary::default()
        };
        let mut children = Vec::with_capacity(results.len());

        for (child, result) in workflows.iter().zip(results) {
            if result.success {
                summary.successful += 1;
                if par.aggregate_results {
                    data = data.merge_context(&result.data);
                }
            } else {
                summary.failed += 1;
            }
            children.push(ChildResult {
                workflow: child.name().to_string(),
                result,
            });
        }

        let success = if par.fail_fast {
            summary.failed == 0
        } else {
            summary.successful > 0 || summary.total == 0
        };

        let mut result = finish(data, (!success).then(|| aggregate_error(&summary)));
        result.summary = Some(summary);
        result.children = children;
        result
    }

    async fn run_conditional(
        &self,
        runner: &dyn WorkflowRunner,
        branches: &[Branch],
        cond: &ConditionalOptions,
        context: Context,
        options: &ExecuteOptions,
    ) -> ExecutionResult {
        let state = StepState::detached(self.name.clone(), options.clone());
        let mut matched = Vec::new();

        for (index, branch) in branches.iter().enumerate() {
            let holds = match branch.condition.evaluate(&context, &state) {
                Ok(holds) => holds,
                Err(e) => {
                    warn!(branch = index, error = %e, "branch condition failed; treating as false");
                    false
                }
            };
            if holds {
                debug!(branch = index, workflow = %branch.workflow.name(), "branch matched");
                matched.push(&branch.workflow);
                if !cond.evaluate_all {
                    break;
                }
            }
        }

        if matched.is_empty() {
            if let Some(default) = &cond.default_workflow {
                debug!(workflow = %default.name(), "no branch matched; running default");
                matched.push(default);
            } else {
                debug!("no branch matched");
                let mut result = ExecutionResult::completed(context, Duration::ZERO);
                result.executed = Some(false);
                return result;
            }
        }

        // Matching branches run independently from the initial context
        let mut data = context.clone();
        let mut summary = Summary {
            total: matched.len(),
            ..Summary::default()
        };
        let mut children = Vec::with_capacity(matched.len());
        let mut last_error = None;

        for child in matched {
            if options.is_cancelled() {
                let mut result = ExecutionResult::cancelled(data, self.cancelled_message(), Duration::ZERO);
                result.executed = Some(!children.is_empty());
                result.children = children;
                return result;
            }

            let result = run_child(runner, child, context.clone(), options).await;
            if result.success {
                summary.successful += 1;
                data = data.merge_context(&result.data);
            } else {
                summary.failed += 1;
                last_error = result.error.clone();
            }
            children.push(ChildResult {
                workflow: child.name().to_string(),
                result,
            });
        }

        let error = match (summary.failed, summary.total) {
            (0, _) => None,
            (1, 1) => last_error,
            _ => Some(aggregate_error(&summary)),
        };

        let mut result = finish(data, error);
        result.executed = Some(true);
        if summary.total > 1 {
            result.summary = Some(summary);
        }
        result.children = children;
        result
    }

    async fn run_retry(
        &self,
        runner: &dyn WorkflowRunner,
        child: &ChildWorkflow,
        retry: &RetryOptions,
        context: Context,
        options: &ExecuteOptions,
    ) -> ExecutionResult {
        let policy = &retry.policy;
        let mut attempt = 0u32;

        loop {
            if options.is_cancelled() {
                let mut result = ExecutionResult::cancelled(context, self.cancelled_message(), Duration::ZERO);
                result.attempts = Some(attempt);
                result.retried = Some(attempt > 1);
                return result;
            }

            attempt += 1;
            let mut result = run_child(runner, child, context.clone(), options).await;
            result.attempts = Some(attempt);
            result.retried = Some(attempt > 1);

            if result.success {
                if attempt > 1 {
                    info!(attempt, "retry composition succeeded after retrying");
                }
                return result;
            }

            let error = result.error.clone().unwrap_or_else(|| {
                ExecutionError::new(ErrorKind::Composition, failure_message(&result, child))
            });

            if !(retry.retry_condition)(&error) {
                debug!(attempt, "failure is not retryable; giving up");
                result.exhausted_retries = Some(false);
                return result;
            }

            if !policy.has_attempts_remaining(attempt) {
                warn!(attempt, error = %error.message, "retry attempts exhausted");
                result.exhausted_retries = Some(true);
                result.error = Some(
                    ExecutionError::new(
                        ErrorKind::Composition,
                        format!(
                            "Retry composition '{}' exhausted {} attempts: {}",
                            self.name, attempt, error.message
                        ),
                    )
                    .with_cause(error.message)
                    .with_retryable(error.retryable)
                    .with_code(error.code),
                );
                return result;
            }

            let delay = policy.delay_for_attempt(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");
            tokio::time::sleep(delay).await;
        }
    }

    fn cancelled_message(&self) -> String {
        format!("Composition '{}' was cancelled", self.name)
    }
}

/// Run one child, turning runner errors into a failed child result
async fn run_child(
    runner: &dyn WorkflowRunner,
    child: &ChildWorkflow,
    context: Context,
    options: &ExecuteOptions,
) -> ExecutionResult {
    let outcome = match child {
        ChildWorkflow::Named(name) => runner.run_workflow(name, context.clone(), options).await,
        ChildWorkflow::Inline(definition) => {
            runner
                .run_definition(Arc::clone(definition), context.clone(), options)
                .await
        }
    };

    match outcome {
        Ok(result) => result,
        Err(e) => {
            warn!(workflow = %child.name(), error = %e, "child workflow could not run");
            let kind = if e.is_not_found() {
                ErrorKind::NotFound
            } else {
                ErrorKind::Composition
            };
            ExecutionResult::failed(
                context,
                ExecutionError::new(kind, e.to_string()).with_retryable(Some(false)),
                Duration::ZERO,
            )
        }
    }
}

fn failure_message(result: &ExecutionResult, child: &ChildWorkflow) -> String {
    result
        .error_message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("workflow '{}' failed", child.name()))
}

fn aggregate_error(summary: &Summary) -> ExecutionError {
    ExecutionError::new(
        ErrorKind::Composition,
        format!("{} of {} workflows failed", summary.failed, summary.total),
    )
}

fn finish(data: Context, error: Option<ExecutionError>) -> ExecutionResult {
    match error {
        Some(error) => ExecutionResult::failed(data, error, Duration::ZERO),
        None => ExecutionResult::completed(data, Duration::ZERO),
    }
}
