//! Tracing and logging setup shared by the binaries.

/// Initialize process-wide tracing in the given format.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init(format: LogFormat) {
    tracing::init(format);
}

/// Subscriber configuration (filters, output format).
pub mod tracing;

pub use tracing::LogFormat;
