// Registry Configuration
//
// Configuration for the workflow registry, loaded from environment variables.

use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

/// Default number of history records kept by a registry
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Context keys whose values are redacted in execution history
pub const DEFAULT_REDACTED_KEYS: &[&str] = &[
    "password",
    "secret",
    "token",
    "api_key",
    "apikey",
    "authorization",
    "credential",
];

/// Configuration for a [`WorkflowRegistry`](crate::registry::WorkflowRegistry)
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    /// Maximum number of execution history records (oldest evicted first)
    pub history_limit: usize,

    /// Soft timeout for steps when neither the step nor its definition sets one
    pub default_step_timeout: Option<Duration>,

    /// Lowercase context keys redacted in history records
    pub redacted_keys: BTreeSet<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            default_step_timeout: None,
            redacted_keys: DEFAULT_REDACTED_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl RegistryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `CONDUCTOR_HISTORY_LIMIT`: History ring buffer size (default: 1000)
    /// - `CONDUCTOR_DEFAULT_STEP_TIMEOUT_MS`: Default step timeout in milliseconds (default: none)
    /// - `CONDUCTOR_REDACTED_KEYS`: Comma-separated keys to redact, replacing the defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let history_limit = lookup("CONDUCTOR_HISTORY_LIMIT")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.history_limit);

        let default_step_timeout = lookup("CONDUCTOR_DEFAULT_STEP_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let redacted_keys = lookup("CONDUCTOR_REDACTED_KEYS")
            .map(|v| {
                v.split(',')
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.redacted_keys);

        Self {
            history_limit,
            default_step_timeout,
            redacted_keys,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_default_step_timeout(mut self, timeout: Duration) -> Self {
        self.default_step_timeout = Some(timeout);
        self
    }

    /// Add a key to the redaction set
    pub fn with_redacted_key(mut self, key: impl Into<String>) -> Self {
        self.redacted_keys.insert(key.into().to_lowercase());
        self
    }
}
