//! Process-wide tracing setup shared by the binaries.

pub mod tracing;

/// Initialize tracing with `RUST_LOG`, falling back to `info`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init(None);
}

/// Initialize tracing with `RUST_LOG`, falling back to `default_filter`.
pub fn init_with_filter(default_filter: &str) {
    tracing::init(Some(default_filter));
}
