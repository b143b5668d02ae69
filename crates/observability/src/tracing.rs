//! Tracing/logging initialization.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output format of the log layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event, for collectors.
    #[default]
    Json,
    /// Human-readable lines, for terminals.
    Pretty,
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(format: LogFormat, default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_timer(fmt::time::SystemTime)
            .with_current_span(false)
            .with_target(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}
