//! Claim profiling for tracking how variable cells acquire and release
//! ownership of runtime objects

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// The kind of variable cell an event was recorded for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    /// Ordinary function local
    Plain,
    /// Function parameter seeded from the call machinery
    Parameter,
    /// Heap cell shared with nested closures
    Shared,
    /// Anonymous compiler temporary
    Temp,
}

impl CellKind {
    pub const ALL: [Self; 4] = [Self::Plain, Self::Parameter, Self::Shared, Self::Temp];
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plain => "plain",
            Self::Parameter => "parameter",
            Self::Shared => "shared",
            Self::Temp => "temp",
        };
        f.write_str(name)
    }
}

/// Something that happened to a cell's claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimEvent {
    /// A cell was constructed (bound or not)
    Constructed,
    /// The cell took ownership of one claim
    Bound,
    /// The cell released the claim it owned
    Released,
    /// The claim was moved out of the cell without being released
    TransferredOut,
    /// A read or delete hit an uninitialized cell
    UnboundAccess,
    /// The last handle of a shared cell went away
    CellFreed,
}

/// Claim statistics for one cell kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    /// Cells constructed
    pub constructed: u64,

    /// Claims taken over by cells
    pub claims_bound: u64,

    /// Claims released by cells
    pub claims_released: u64,

    /// Claims moved out of cells to their callers
    pub transferred_out: u64,

    /// Unbound reads and deletes
    pub unbound_errors: u64,

    /// Shared cells freed after their last handle
    pub cells_freed: u64,
}

impl KindStats {
    pub fn record(&mut self, event: ClaimEvent) {
        match event {
            ClaimEvent::Constructed => self.constructed += 1,
            ClaimEvent::Bound => self.claims_bound += 1,
            ClaimEvent::Released => self.claims_released += 1,
            ClaimEvent::TransferredOut => self.transferred_out += 1,
            ClaimEvent::UnboundAccess => self.unbound_errors += 1,
            ClaimEvent::CellFreed => self.cells_freed += 1,
        }
    }

    /// Claims currently held by live cells of this kind
    pub fn outstanding(&self) -> u64 {
        self.claims_bound
            .saturating_sub(self.claims_released + self.transferred_out)
    }

    /// Check whether claims were bound and never let go of
    pub fn potential_leak(&self) -> bool {
        self.outstanding() > 0
    }
}

/// Claim profiler
pub struct ClaimProfiler {
    enabled: AtomicBool,
    stats: RwLock<HashMap<CellKind, KindStats>>,
}

impl ClaimProfiler {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            stats: RwLock::new(HashMap::new()),
        }
    }

    /// A profiler that ignores events until [`ClaimProfiler::enable`] is called
    pub fn disabled() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            stats: RwLock::new(HashMap::new()),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Record an event for a cell kind
    pub fn record(&self, kind: CellKind, event: ClaimEvent) {
        if !self.is_enabled() {
            return;
        }
        self.stats.write().entry(kind).or_default().record(event);
    }

    /// Get statistics for one cell kind
    pub fn kind_stats(&self, kind: CellKind) -> KindStats {
        self.stats.read().get(&kind).cloned().unwrap_or_default()
    }

    /// Sum of claims still held across all kinds
    pub fn outstanding_claims(&self) -> u64 {
        self.stats.read().values().map(KindStats::outstanding).sum()
    }

    /// Kinds that currently hold claims
    pub fn leaking_kinds(&self) -> Vec<(CellKind, KindStats)> {
        let stats = self.stats.read();
        CellKind::ALL
            .iter()
            .filter_map(|kind| {
                stats
                    .get(kind)
                    .filter(|s| s.potential_leak())
                    .map(|s| (*kind, s.clone()))
            })
            .collect()
    }

    /// Log a summary of all recorded statistics
    pub fn report(&self) {
        let stats = self.stats.read();
        for kind in CellKind::ALL {
            let Some(s) = stats.get(&kind) else {
                continue;
            };
            tracing::info!(
                kind = %kind,
                constructed = s.constructed,
                bound = s.claims_bound,
                released = s.claims_released,
                transferred = s.transferred_out,
                unbound = s.unbound_errors,
                freed = s.cells_freed,
                outstanding = s.outstanding(),
                "cell claim summary"
            );
        }
    }

    /// Clear all statistics
    pub fn reset(&self) {
        self.stats.write().clear();
    }
}

impl Default for ClaimProfiler {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_PROFILER: Lazy<ClaimProfiler> = Lazy::new(ClaimProfiler::disabled);

/// Get the process-wide claim profiler; disabled until configured
pub fn get_profiler() -> &'static ClaimProfiler {
    &GLOBAL_PROFILER
}
