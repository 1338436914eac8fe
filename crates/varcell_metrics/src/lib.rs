//! Claim statistics for the variable-cell runtime

pub mod profiler;

pub use profiler::{CellKind, ClaimEvent, ClaimProfiler, KindStats, get_profiler};
