//! Bounded execution history

use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::EntryKind;
use crate::context::Context;
use crate::workflow::result::duration_millis;
use crate::workflow::{ExecutionError, ExecutionResult};

/// Replacement for sensitive values
pub const REDACTED: &str = "[REDACTED]";

/// One registry-mediated execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub workflow_name: String,
    pub kind: EntryKind,

    /// Input context after middleware, with sensitive values redacted
    pub context: Value,
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,

    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
}

/// Ring buffer of [`HistoryRecord`]s, oldest evicted first
#[derive(Debug)]
pub struct ExecutionHistory {
    records: VecDeque<HistoryRecord>,
    limit: usize,
    redacted_keys: BTreeSet<String>,
}

impl ExecutionHistory {
    pub fn new(limit: usize, redacted_keys: BTreeSet<String>) -> Self {
        Self {
            records: VecDeque::with_capacity(limit.min(64)),
            limit,
            redacted_keys,
        }
    }

    /// Build a record for a finished call
    pub fn record_for(
        &self,
        workflow_name: &str,
        kind: EntryKind,
        context: &Context,
        result: &ExecutionResult,
    ) -> HistoryRecord {
        HistoryRecord {
            id: Uuid::now_v7(),
            workflow_name: workflow_name.to_string(),
            kind,
            context: self.sanitize(&context.to_value()),
            success: result.success,
            error: result.error.clone(),
            duration: result.duration,
            timestamp: Utc::now(),
        }
    }

    pub fn push(&mut self, record: HistoryRecord) {
        if self.limit == 0 {
            return;
        }
        while self.records.len() >= self.limit {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// The newest `limit` records, oldest first
    pub fn recent(&self, limit: usize) -> Vec<HistoryRecord> {
        let skip = self.records.len().saturating_sub(limit);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Redact values under sensitive keys, recursively
    ///
    /// A key is sensitive when its lowercase form contains any configured key.
    pub fn sanitize(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| {
                        let value = if self.is_sensitive(key) {
                            Value::String(REDACTED.to_string())
                        } else {
                            self.sanitize(value)
                        };
                        (key.clone(), value)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.sanitize(v)).collect()),
            other => other.clone(),
        }
    }

    fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.redacted_keys.iter().any(|k| key.contains(k.as_str()))
    }
}
