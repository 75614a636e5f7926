//! Order Pipeline Demo
//!
//! Registers a handful of order-processing workflows, wires them together
//! with a dependency and a few compositions, and prints what happened.
//!
//! Run with: cargo run --example order_pipeline -p conductor
//! Set RUST_LOG=conductor=debug to see step-level tracing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};

use conductor::prelude::*;
use conductor::registry::{FnMiddleware, LoggingMiddleware};
use conductor::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(TelemetryConfig::from_env())?;

    println!("=== Order Pipeline Demo ===\n");

    let registry = WorkflowRegistry::with_config(RegistryConfig::from_env());
    registry.use_middleware(LoggingMiddleware);
    registry.use_middleware(FnMiddleware::new("stamp_channel", |call| {
        Ok(Some(call.context.with("channel", "web")))
    }));

    register_workflows(&registry)?;

    // Scenario 1: a workflow with a dependency
    println!("--- Scenario 1: Price Order (depends on load_customer) ---\n");
    let result = registry
        .execute(
            "price_order",
            json!({ "customer_id": "c-42", "qty": 12 }),
            &ExecuteOptions::default(),
        )
        .await?;
    print_result(&result);

    println!("\n{}\n", "=".repeat(60));

    // Scenario 2: compositions
    println!("--- Scenario 2: Fulfilment Compositions ---\n");
    let composer = WorkflowComposer::new(registry.clone());

    composer.parallel(
        "notify_all",
        ["email_receipt", "sms_receipt"],
        ParallelOptions::default(),
    )?;
    composer.retry(
        "reserve_stock_reliably",
        "reserve_stock",
        RetryOptions::new(RetryPolicy::fixed(Duration::from_millis(50), 4)),
    )?;
    composer.conditional(
        "ship",
        [
            Branch::new("express === true", "express_shipping"),
            Branch::new("total > 100", "free_shipping"),
        ],
        ConditionalOptions {
            default_workflow: Some("standard_shipping".into()),
            evaluate_all: false,
        },
    )?;
    composer.sequential(
        "fulfil_order",
        ["price_order", "reserve_stock_reliably", "ship", "notify_all"],
        SequentialOptions::default(),
    )?;

    let result = composer
        .execute(
            "fulfil_order",
            json!({ "customer_id": "c-42", "qty": 12 }),
            &ExecuteOptions::default(),
        )
        .await?;
    print_result(&result);
    for child in &result.children {
        println!(
            "  child {:<24} success={} attempts={:?}",
            child.workflow, child.result.success, child.result.attempts
        );
    }

    println!("\n{}\n", "=".repeat(60));

    // Scenario 3: what the registry remembers
    println!("--- Scenario 3: History ---\n");
    for record in registry.history(20) {
        println!(
            "  {:<24} {:<12} success={} {}ms",
            record.workflow_name,
            record.kind.to_string(),
            record.success,
            record.duration.as_millis()
        );
    }

    let stats = registry.stats();
    println!("\nRegistry: {stats:?}");

    Ok(())
}

fn register_workflows(registry: &WorkflowRegistry) -> Result<()> {
    registry.register(
        WorkflowDefinition::new("load_customer")
            .category("customers")
            .step(Step::new("lookup", |ctx, _| async move {
                let id = ctx.get("customer_id").cloned().unwrap_or(Value::Null);
                Ok(json!({ "customer": { "id": id, "tier": "gold" } }))
            })),
    )?;

    registry.register(
        WorkflowDefinition::new("price_order")
            .category("orders")
            .description("Price an order for a known customer")
            .depends_on("load_customer")
            .step(Step::new("subtotal", |ctx, _| async move {
                let qty = ctx.get("qty").and_then(Value::as_i64).unwrap_or(0);
                Ok(json!({ "subtotal": qty * 10 }))
            }))
            .step(
                Step::new("loyalty_discount", |_, _| async { Ok(json!({ "discount": 15 })) })
                    .when("customer.tier === 'gold'"),
            )
            .step(Step::new("total", |ctx, _| async move {
                let subtotal = ctx.get("subtotal").and_then(Value::as_i64).unwrap_or(0);
                let discount = ctx.get("discount").and_then(Value::as_i64).unwrap_or(0);
                Ok(json!({ "total": subtotal - discount }))
            })),
    )?;

    // Fails twice before the warehouse answers
    let attempts = Arc::new(AtomicU32::new(0));
    registry.register(
        WorkflowDefinition::new("reserve_stock").step(Step::new("reserve", move |_, _| {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 3 {
                    Err(StepError::retryable("warehouse busy"))
                } else {
                    Ok(json!({ "reservation": format!("r-{attempt}") }))
                }
            }
        })),
    )?;

    for (name, carrier) in [
        ("express_shipping", "overnight"),
        ("free_shipping", "ground-free"),
        ("standard_shipping", "ground"),
    ] {
        registry.register(WorkflowDefinition::new(name).category("shipping").step(Step::new(
            "book",
            move |_, _| async move { Ok(json!({ "carrier": carrier })) },
        )))?;
    }

    for (name, channel) in [("email_receipt", "email"), ("sms_receipt", "sms")] {
        registry.register(
            WorkflowDefinition::new(name).step(
                Step::new("send", move |_, _| async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    let mut sent = serde_json::Map::new();
                    sent.insert(format!("{channel}_sent"), json!(true));
                    Ok(Value::Object(sent))
                })
                .parallel(),
            ),
        )?;
    }

    Ok(())
}

fn print_result(result: &ExecutionResult) {
    println!("success: {}", result.success);
    println!("status: {:?}", result.status);
    println!("duration: {}ms", result.duration.as_millis());
    if let Some(error) = &result.error {
        println!("error: [{:?}] {}", error.kind, error.message);
    }
    match serde_json::to_string_pretty(&result.data) {
        Ok(data) => println!("data: {data}"),
        Err(e) => println!("data: <unprintable: {e}>"),
    }
}
