// Telemetry Module
//
// Console logging for binaries and demos embedding the engine. The library only
// emits `tracing` events and spans (one span per workflow run, per composition
// and per registry call); installing a subscriber is left to the caller.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when no directive is configured or the directive does not parse
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// A global subscriber is already installed
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Console logging settings
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub enable_console: bool,
    /// Filter directive, e.g. `conductor=debug,info`
    pub log_filter: Option<String>,
    /// Print event targets (`conductor::engine::instance`)
    pub with_target: bool,
    /// Log when workflow and composition spans close, with their busy/idle time
    pub span_timings: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enable_console: true,
            log_filter: None,
            with_target: true,
            span_timings: false,
        }
    }
}

impl TelemetryConfig {
    /// Read settings from the process environment
    ///
    /// - `CONDUCTOR_LOG`, then `RUST_LOG`, then `LOG_LEVEL`: filter directive
    /// - `CONDUCTOR_LOG_SPANS`: `true`/`1` logs span timings
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let log_filter = ["CONDUCTOR_LOG", "RUST_LOG", "LOG_LEVEL"]
            .into_iter()
            .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()));
        let span_timings = lookup("CONDUCTOR_LOG_SPANS")
            .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"));

        Self {
            log_filter,
            span_timings,
            ..Self::default()
        }
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    pub fn with_span_timings(mut self, enabled: bool) -> Self {
        self.span_timings = enabled;
        self
    }
}

/// Parse the configured directive, falling back to [`DEFAULT_LOG_FILTER`]
pub fn build_filter(config: &TelemetryConfig) -> EnvFilter {
    match config.log_filter.as_deref().map(EnvFilter::try_new) {
        Some(Ok(filter)) => filter,
        Some(Err(e)) => {
            eprintln!("invalid log filter {:?} ({e}); using {DEFAULT_LOG_FILTER}", config.log_filter);
            EnvFilter::new(DEFAULT_LOG_FILTER)
        }
        None => EnvFilter::new(DEFAULT_LOG_FILTER),
    }
}

/// Install the global subscriber
///
/// ```ignore
/// use conductor::telemetry::{init_telemetry, TelemetryConfig};
///
/// init_telemetry(TelemetryConfig::from_env().with_span_timings(true))?;
/// ```
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(&config);

    let span_events = if config.span_timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let console = config.enable_console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(config.with_target)
            .with_span_events(span_events)
            .with_filter(filter)
    });

    tracing_subscriber::registry().with(console).try_init()?;
    tracing::debug!(span_timings = config.span_timings, "console logging enabled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = TelemetryConfig::default();
        assert!(config.enable_console);
        assert!(config.log_filter.is_none());
        assert!(!config.span_timings);
    }

    #[test]
    fn test_crate_variable_wins() {
        let config = TelemetryConfig::from_lookup(lookup(&[
            ("RUST_LOG", "warn"),
            ("CONDUCTOR_LOG", "conductor=trace"),
        ]));
        assert_eq!(config.log_filter.as_deref(), Some("conductor=trace"));

        let config = TelemetryConfig::from_lookup(lookup(&[("CONDUCTOR_LOG", " "), ("LOG_LEVEL", "debug")]));
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
    }

    #[test]
    fn test_span_timings_flag() {
        assert!(TelemetryConfig::from_lookup(lookup(&[("CONDUCTOR_LOG_SPANS", "TRUE")])).span_timings);
        assert!(!TelemetryConfig::from_lookup(lookup(&[("CONDUCTOR_LOG_SPANS", "no")])).span_timings);
    }

    #[test]
    fn test_invalid_filter_falls_back() {
        let config = TelemetryConfig::default().with_log_filter("conductor=notalevel");
        assert_eq!(build_filter(&config).to_string(), DEFAULT_LOG_FILTER);

        let config = TelemetryConfig::default().with_log_filter("conductor=debug");
        assert_eq!(build_filter(&config).to_string(), "conductor=debug");
    }
}
