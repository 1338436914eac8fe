//! Variable cells used by compiled functions
//!
//! Every cell kind shares the same two-state machine:
//!
//! - `Uninitialized --assign--> Bound`, `Bound --assign--> Bound`
//! - `Bound --clear--> Uninitialized` (releases the claim)
//! - `Bound --take--> Uninitialized` (hands the claim to the caller)
//! - `clear`/`take`/`read` on `Uninitialized` report an unbound error
//!
//! [`Slot`] implements that machine once; the cell types decide how it is
//! stored (inline for locals, behind a shared indirection for captures).

mod closure;
mod parameter;
mod plain;
mod shared;
mod temp;

use std::sync::Arc;

use varcell_metrics::{CellKind, ClaimEvent, get_profiler};

use crate::object::{Claim, ObjectRuntime};

pub use closure::ClosureBinding;
pub use parameter::ParameterCell;
pub use plain::PlainCell;
pub use shared::SharedCell;
pub use temp::TempCell;

/// Observable binding state of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellState {
    Uninitialized,
    Bound,
}

/// Why a claim leaves a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unbind {
    /// The claim is released (delete, rebinding)
    Release,
    /// The claim moves to the caller
    Transfer,
}

/// The value slot behind every cell kind
pub(crate) struct Slot<R: ObjectRuntime> {
    kind: CellKind,
    name: Arc<str>,
    value: Option<Claim<R>>,
}

impl<R: ObjectRuntime> Slot<R> {
    pub(crate) fn new(kind: CellKind, name: Arc<str>, value: Option<Claim<R>>) -> Self {
        let profiler = get_profiler();
        profiler.record(kind, ClaimEvent::Constructed);
        if value.is_some() {
            profiler.record(kind, ClaimEvent::Bound);
        }
        tracing::trace!(kind = %kind, name = %name, bound = value.is_some(), "cell constructed");
        Self { kind, name, value }
    }

    pub(crate) fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub(crate) fn state(&self) -> CellState {
        if self.value.is_some() {
            CellState::Bound
        } else {
            CellState::Uninitialized
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.value.is_some()
    }

    /// The bound object, without touching claims
    pub(crate) fn get(&self) -> Option<R::Object> {
        self.value.as_ref().map(Claim::object)
    }

    /// Store `claim`, returning the previous claim for the caller to drop.
    ///
    /// The old claim is handed back instead of dropped in place so that a
    /// release which re-enters the cell (a finalizer reading the variable)
    /// already observes the new value.
    pub(crate) fn replace(&mut self, claim: Claim<R>) -> Option<Claim<R>> {
        let profiler = get_profiler();
        profiler.record(self.kind, ClaimEvent::Bound);
        let old = self.value.replace(claim);
        if old.is_some() {
            profiler.record(self.kind, ClaimEvent::Released);
        }
        tracing::trace!(kind = %self.kind, name = %self.name, rebound = old.is_some(), "cell assigned");
        old
    }

    /// Move the claim out, leaving the slot uninitialized.
    pub(crate) fn unbind(&mut self, reason: Unbind) -> Option<Claim<R>> {
        let Some(claim) = self.value.take() else {
            get_profiler().record(self.kind, ClaimEvent::UnboundAccess);
            return None;
        };
        let event = match reason {
            Unbind::Release => ClaimEvent::Released,
            Unbind::Transfer => ClaimEvent::TransferredOut,
        };
        get_profiler().record(self.kind, event);
        tracing::trace!(kind = %self.kind, name = %self.name, ?reason, "cell unbound");
        Some(claim)
    }

    /// Note a failed read of an uninitialized slot
    pub(crate) fn record_unbound_read(&self) {
        get_profiler().record(self.kind, ClaimEvent::UnboundAccess);
    }
}

impl<R: ObjectRuntime> Drop for Slot<R> {
    fn drop(&mut self) {
        if let Some(claim) = self.value.take() {
            get_profiler().record(self.kind, ClaimEvent::Released);
            tracing::trace!(kind = %self.kind, name = %self.name, "cell destroyed while bound");
            drop(claim);
        }
    }
}
