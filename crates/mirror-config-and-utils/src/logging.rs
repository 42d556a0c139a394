//! Logging initialization.
//!
//! Everything funnels through the observability package: structured JSONL in
//! `logs/mirror.jsonl` under the base directory, plus stderr for the
//! foreground process.

use std::path::PathBuf;

/// Service name written into every log entry.
const SERVICE_NAME: &str = "trustline-mirror";

/// Initialize logging for the mirror process.
///
/// `level` is the default filter; `RUST_LOG` takes precedence when set.
pub fn init_logging(level: &str, log_path: Option<PathBuf>) {
    observability::init_with_config(observability::LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: parse_level(level).to_string().to_lowercase(),
        log_path,
        also_stderr: true,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
