//! Tracing and logging setup shared by the binaries.

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::LogFormat;

/// Initialize process-wide logging with the server defaults (JSON, `info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Json, "info");
}

/// Initialize process-wide logging with an explicit format and default level.
///
/// `RUST_LOG` still wins over `default_level` when set.
pub fn init_with(format: LogFormat, default_level: &str) {
    tracing::init(format, default_level);
}
