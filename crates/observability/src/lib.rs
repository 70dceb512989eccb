//! Process-wide tracing setup shared by the ledger binaries.

/// Initialize process-wide tracing (JSON lines, `RUST_LOG` filter).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Subscriber configuration (filters, output format).
pub mod tracing;
