//! Tracing and logging (shared setup).

/// Initialize process-wide tracing, with the format taken from `PORTAL_LOG_FORMAT`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with(tracing::LogFormat::from_env());
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::{DEFAULT_DIRECTIVE, LogFormat, init_with};
