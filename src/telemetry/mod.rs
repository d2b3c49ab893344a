//! Logging setup for the desk server and admin CLI
//!
//! Events go through `tracing`; the subscriber is a `tracing-subscriber`
//! registry with an [`EnvFilter`] and either a human-readable or a JSON
//! formatter.
//!
//! # Environment
//!
//! - `RUST_LOG`: filter directives (takes precedence)
//! - `LOG_LEVEL`: fallback filter, default `info`
//! - `LOG_JSON`: `true`/`1` for JSON lines

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON lines instead of text
    pub json_format: bool,
    /// Include thread ids in text output
    pub with_thread_ids: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_format: false,
            with_thread_ids: true,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            json_format: std::env::var("LOG_JSON")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            with_thread_ids: true,
        }
    }

    /// CLI variant: terse text output at `warn` unless overridden.
    pub fn for_cli() -> Self {
        Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
            json_format: false,
            with_thread_ids: false,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.log_level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::registry().with(config.env_filter());

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(config.with_thread_ids)
            .with_file(true)
            .with_line_number(true);
        subscriber.with(fmt_layer).try_init()?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(config.with_thread_ids);
        subscriber.with(fmt_layer).try_init()?;
    }

    Ok(())
}
