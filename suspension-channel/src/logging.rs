//! Logging setup for metro-alerts applications
//!
//! The channel itself only emits `tracing` events. Applications pick how
//! they are rendered once at startup, typically from the environment.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber installed
    Silent,
    /// Compact stderr output
    Development,
    /// Verbose output with source locations and thread ids
    Debug,
    /// One JSON object per line, for log shippers
    Json,
}

impl LoggingMode {
    /// Parse a `METRO_ALERTS_LOG_MODE` value; unknown values are silent
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => LoggingMode::Development,
            "debug" => LoggingMode::Debug,
            "json" => LoggingMode::Json,
            _ => LoggingMode::Silent,
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),
}

/// Initialize logging with the specified mode
///
/// Call once, before connecting any channel.
///
/// # Environment Variables
///
/// - `METRO_ALERTS_LOG_LEVEL`: filter directives (e.g. `debug` or
///   `suspension_channel=trace,stomp_client=info`), falling back to `RUST_LOG`
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info");

            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug");

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Json => {
            let filter = create_env_filter("info");

            Registry::default()
                .with(fmt::layer().json().with_current_span(false))
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from `METRO_ALERTS_LOG_MODE`
///
/// Accepts `silent`, `development`, `debug` or `json`. Defaults to silent.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = std::env::var("METRO_ALERTS_LOG_MODE")
        .map(|name| LoggingMode::from_name(&name))
        .unwrap_or(LoggingMode::Silent);

    init_logging(mode)
}

/// Check if a global subscriber is already installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

fn create_env_filter(default_level: &str) -> EnvFilter {
    // METRO_ALERTS_LOG_LEVEL, then RUST_LOG, then the mode default
    if let Ok(level) = std::env::var("METRO_ALERTS_LOG_LEVEL") {
        EnvFilter::new(level)
    } else if let Ok(rust_log) = std::env::var("RUST_LOG") {
        EnvFilter::new(rust_log)
    } else {
        EnvFilter::new(default_level)
    }
}
