//! `varcell`: the variable-storage runtime linked into natively compiled
//! Python programs.
//!
//! This crate bundles the cell runtime with its logging and statistics
//! support. Generated Rust code usually only needs the [`prelude`].

pub use varcell_metrics as metrics;
pub use varcell_runtime::{
    Borrowed, CellError, CellResult, CellState, Claim, ClosureBinding, ObjectRuntime,
    OwnershipMode, ParameterCell, PlainCell, RefcountMode, RuntimeConfig, SharedCell, TempCell,
    cells, config, error, ffi, object,
};
pub use varcell_utils::init_logging;

pub mod prelude {
    pub use varcell_runtime::{
        Borrowed, CellError, CellResult, Claim, ClosureBinding, ObjectRuntime, OwnershipMode,
        ParameterCell, PlainCell, SharedCell, TempCell,
    };
}

/// Set up logging and the cell runtime from the environment.
pub fn init() -> anyhow::Result<()> {
    init_logging();
    varcell_runtime::init_from_env()?;
    tracing::info!(
        refcount_mode = %RefcountMode::active(),
        "variable cell runtime ready"
    );
    Ok(())
}

/// Apply an explicit configuration after setting up logging.
pub fn init_with(config: &RuntimeConfig) -> anyhow::Result<()> {
    init_logging();
    varcell_runtime::init(config)
}

pub use varcell_runtime::shutdown;
