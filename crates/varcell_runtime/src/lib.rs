//! Variable cells for natively compiled Python functions.
//!
//! Generated code stores every local, parameter, temporary and captured
//! variable in one of the cell types from [`cells`]. Cells own claims on
//! objects of an external object runtime (see [`object::ObjectRuntime`]) and
//! release them exactly once, whichever way an activation exits.

pub mod cells;
pub mod config;
pub mod error;
pub mod ffi;
pub mod object;
pub mod sync;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use cells::{CellState, ClosureBinding, ParameterCell, PlainCell, SharedCell, TempCell};
pub use config::{RuntimeConfig, get_config};
pub use error::{CellError, CellResult};
pub use object::{Borrowed, Claim, ObjectRuntime, OwnershipMode};
pub use sync::RefcountMode;

/// Load configuration from the environment (and `varcell.toml` with the
/// `toml-config` feature), check it against this build, store it in
/// [`get_config`] and apply it.
pub fn init_from_env() -> anyhow::Result<()> {
    let config = get_config().get().merge_with_env();
    init(&config)
}

/// Apply an explicit configuration.
pub fn init(config: &RuntimeConfig) -> anyhow::Result<()> {
    config.validate()?;
    get_config().update(|current| *current = config.clone());
    config.apply();
    Ok(())
}

/// Emit the claim statistics report if configured to.
pub fn shutdown() {
    let config = get_config().get();
    if config.profiling.enabled && config.profiling.report_on_shutdown {
        let profiler = varcell_metrics::get_profiler();
        profiler.report();
        for (kind, stats) in profiler.leaking_kinds() {
            tracing::warn!(
                kind = %kind,
                outstanding = stats.outstanding(),
                "variable cells still hold claims at shutdown"
            );
        }
    }
}
