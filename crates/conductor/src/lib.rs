//! # Conductor
//!
//! An in-process engine for multi-step asynchronous workflows.
//!
//! ## Features
//!
//! - **Step execution**: ordered steps with conditions, parallel groups and soft timeouts
//! - **Dependencies**: named workflows that must succeed before a workflow's own steps run
//! - **Compositions**: sequential, parallel, conditional and retry combinators over workflows
//! - **Middleware**: best-effort before/after hooks around every registry-mediated run
//! - **History**: bounded, redacted log of past executions
//! - **Checkpoints**: advisory per-step snapshots for caller-driven resumption
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     WorkflowRegistry                         │
//! │  (definitions, compositions, middleware chain, history)     │
//! └─────────────────────────────────────────────────────────────┘
//!               │                               │
//!               ▼                               ▼
//! ┌───────────────────────────┐   ┌───────────────────────────┐
//! │     WorkflowInstance      │   │        Composition        │
//! │ (steps, groups, timeouts) │   │ (children via the runner) │
//! └───────────────────────────┘   └───────────────────────────┘
//!               │                               │
//!               └──────── WorkflowRunner ───────┘
//!                 (dependencies and children run
//!                  back through the registry)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use conductor::prelude::*;
//! use serde_json::json;
//!
//! let registry = WorkflowRegistry::new();
//! registry.register(
//!     WorkflowDefinition::new("price_order")
//!         .step(Step::new("subtotal", |ctx, _| async move {
//!             let qty = ctx.get("qty").and_then(|v| v.as_i64()).unwrap_or(0);
//!             Ok(json!({ "subtotal": qty * 12 }))
//!         }))
//!         .step(Step::new("discount", |_, _| async { Ok(json!({ "discount": 5 })) })
//!             .when("subtotal > 100")),
//! )?;
//!
//! let result = registry
//!     .execute("price_order", json!({ "qty": 10 }), &ExecuteOptions::default())
//!     .await?;
//! assert_eq!(result.data.get("discount"), Some(&json!(5)));
//! ```

pub mod composer;
pub mod config;
pub mod context;
pub mod engine;
pub mod persistence;
pub mod registry;
pub mod telemetry;
pub mod workflow;

/// Prelude for common imports
pub mod prelude {
    pub use crate::composer::{
        BackoffStrategy, Branch, ChildWorkflow, Composition, ConditionalOptions, ParallelOptions,
        RetryOptions, RetryPolicy, SequentialOptions, WorkflowComposer,
    };
    pub use crate::config::RegistryConfig;
    pub use crate::context::Context;
    pub use crate::engine::{ExecuteOptions, WorkflowInstance, WorkflowRunner};
    pub use crate::persistence::{CheckpointStore, InMemoryCheckpointStore};
    pub use crate::registry::{Middleware, RegistryError, WorkflowRegistry};
    pub use crate::workflow::{
        Condition, ErrorHandling, ErrorKind, ExecutionResult, Step, StepError, StepState,
        WorkflowDefinition,
    };
}

// Re-export key types at crate root
pub use composer::{Composition, RetryPolicy, WorkflowComposer};
pub use config::RegistryConfig;
pub use context::Context;
pub use engine::{ExecuteOptions, InstanceError, WorkflowInstance, WorkflowRunner};
pub use persistence::{Checkpoint, CheckpointStore, InMemoryCheckpointStore, StoreError};
pub use registry::{RegistryError, ValidationError, WorkflowRegistry};
pub use workflow::{
    ErrorKind, ExecutionError, ExecutionResult, InstanceStatus, Step, StepError, StepState,
    WorkflowDefinition,
};
