//! Copy-on-write execution context
//!
//! A [`Context`] is the key/value accumulator threaded through a workflow's
//! steps and dependencies. Merging never mutates the source: it produces a new
//! context with a bumped version, so a snapshot handed to a step stays stable
//! while other steps of the same parallel group run.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Versioned, copy-on-write mapping from string keys to JSON values
#[derive(Clone, Default)]
pub struct Context {
    values: Arc<Map<String, Value>>,
    version: u64,
}

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context seeded from a JSON object map
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self {
            values: Arc::new(values),
            version: 0,
        }
    }

    /// Number of merges applied since this context was seeded
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Get a top-level value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Resolve a dotted path (`order.items.0.sku`) against the context
    ///
    /// Objects are walked by key, arrays by numeric index.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.values.get(segments.next()?)?;

        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Copy the context out as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object((*self.values).clone())
    }

    /// Return a new context with a single key set
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut partial = Map::new();
        partial.insert(key.into(), value.into());
        self.merge(&partial)
    }

    /// Shallow-merge a partial map, later keys overwriting earlier ones
    ///
    /// An empty partial returns an unchanged clone (same version).
    pub fn merge(&self, partial: &Map<String, Value>) -> Self {
        if partial.is_empty() {
            return self.clone();
        }

        let mut values = (*self.values).clone();
        for (key, value) in partial {
            values.insert(key.clone(), value.clone());
        }

        Self {
            values: Arc::new(values),
            version: self.version + 1,
        }
    }

    /// Shallow-merge another context into this one
    pub fn merge_context(&self, other: &Context) -> Self {
        self.merge(other.as_map())
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("version", &self.version)
            .field("values", &self.values)
            .finish()
    }
}

impl From<Map<String, Value>> for Context {
    fn from(values: Map<String, Value>) -> Self {
        Self::from_map(values)
    }
}

/// Non-object values seed an empty context
impl From<Value> for Context {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(values) => Self::from_map(values),
            _ => Self::new(),
        }
    }
}

impl Serialize for Context {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.values.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Map::deserialize(deserializer).map(Self::from_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Context {
        Context::from(value)
    }

    #[test]
    fn test_merge_is_copy_on_write() {
        let base = ctx(json!({ "a": 1 }));
        let merged = base.with("b", 2);

        assert_eq!(base.get("b"), None);
        assert_eq!(merged.get("a"), Some(&json!(1)));
        assert_eq!(merged.get("b"), Some(&json!(2)));
        assert_eq!(base.version(), 0);
        assert_eq!(merged.version(), 1);
    }

    #[test]
    fn test_later_keys_win() {
        let base = ctx(json!({ "a": 1, "b": 1 }));
        let partial = json!({ "b": 2 });
        let merged = base.merge(partial.as_object().unwrap());

        assert_eq!(merged.to_value(), json!({ "a": 1, "b": 2 }));
    }

    #[test]
    fn test_empty_merge_keeps_version() {
        let base = ctx(json!({ "a": 1 }));
        let merged = base.merge(&Map::new());
        assert_eq!(merged.version(), 0);
        assert_eq!(merged, base);
    }

    #[test]
    fn test_get_path() {
        let context = ctx(json!({
            "order": { "items": [{ "sku": "A-1" }, { "sku": "B-2" }], "total": 40 }
        }));

        assert_eq!(context.get_path("order.total"), Some(&json!(40)));
        assert_eq!(context.get_path("order.items.1.sku"), Some(&json!("B-2")));
        assert_eq!(context.get_path("order.items.9.sku"), None);
        assert_eq!(context.get_path("order.total.cents"), None);
        assert_eq!(context.get_path("missing"), None);
    }

    #[test]
    fn test_non_object_value_seeds_empty_context() {
        assert!(Context::from(json!([1, 2, 3])).is_empty());
    }

    #[test]
    fn test_serde_as_plain_map() {
        let context = ctx(json!({ "plan": "gold" })).with("seats", 3);
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json, json!({ "plan": "gold", "seats": 3 }));

        let parsed: Context = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, context);
        assert_eq!(parsed.version(), 0);
    }
}
