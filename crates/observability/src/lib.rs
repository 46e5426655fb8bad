//! Logging setup shared by the portal binaries and tests.

/// Log output configuration.
pub mod logging;

pub use logging::LogFormat;

/// Initialize process-wide logging from `RUST_LOG` and `PORTAL_LOG_FORMAT`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    logging::init(LogFormat::from_env());
}
