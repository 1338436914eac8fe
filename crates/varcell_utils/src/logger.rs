use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "varcell=info,varcell_runtime=info,varcell_metrics=info";

/// Initialise tracing subscriber once per process.
pub fn init_logging() {
    init_logging_with(DEFAULT_FILTER);
}

/// Initialise tracing with a fallback filter used when `RUST_LOG` is absent.
///
/// Only the first call in a process installs a subscriber; later calls are
/// ignored, as is a subscriber installed by someone else first.
pub fn init_logging_with(fallback: &str) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

        let _ = fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .try_init();
    });
}
