//! Tracing/logging initialization.
//!
//! JSON lines with timestamps. `RUST_LOG` wins over the configured filter.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info";

/// Build the filter: `RUST_LOG`, then `fallback`, then [`DEFAULT_FILTER`].
pub fn env_filter(fallback: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(fallback: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(fallback))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init(Some("debug"));
        init(None);
        ::tracing::info!("still logging");
    }

    #[test]
    fn configured_fallback_applies_without_rust_log() {
        if std::env::var("RUST_LOG").is_err() {
            assert_eq!(env_filter(Some("warn")).to_string(), "warn");
            assert_eq!(env_filter(None).to_string(), DEFAULT_FILTER);
        }
    }
}
