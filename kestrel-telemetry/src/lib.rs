//! # kestrel-telemetry
//!
//! Logging setup for Kestrel binaries and in-memory event capture for tests.
//!
//! The `kestrel-rag` library only emits `tracing` events; installing a
//! subscriber is left to the application:
//!
//! ```rust,no_run
//! kestrel_telemetry::init_telemetry();
//! tracing::info!("ready");
//! ```

mod capture;

pub use capture::{CaptureLayer, CapturedEvent, EventCapture};

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Install a global fmt subscriber filtered by `RUST_LOG`, defaulting to
/// `info`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_telemetry() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter)
}

/// Install a global fmt subscriber with an explicit filter directive such as
/// `"kestrel_rag=debug,info"`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_with_filter(directives: &str) -> bool {
    install(EnvFilter::new(directives))
}

fn install(filter: EnvFilter) -> bool {
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_global_init_reports_false() {
        init_with_filter("warn");
        assert!(!init_telemetry());
        assert!(!init_with_filter("debug"));
    }
}
