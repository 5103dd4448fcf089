//! Tracing and logging (shared setup).

pub use crate::tracing::{LogFormat, UnknownLogFormat};

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat) {
    tracing::init(format);
}

/// Tracing configuration (filters, output format).
pub mod tracing;
