use std::fmt;
use std::sync::Arc;

use varcell_metrics::CellKind;

use super::{CellState, Slot, Unbind};
use crate::error::{Access, CellError, CellResult};
use crate::object::{Borrowed, Claim, ObjectRuntime};

/// Storage for an ordinary local variable of one function activation.
///
/// Owns at most one claim. The claim is released when the cell is rebound,
/// deleted, or dropped. The type is move-only; two cells can never own the
/// same claim.
pub struct PlainCell<R: ObjectRuntime> {
    slot: Slot<R>,
}

impl<R: ObjectRuntime> PlainCell<R> {
    /// Create a cell, optionally bound to a claim the caller hands over.
    pub fn new(name: impl Into<Arc<str>>, initial: Option<Claim<R>>) -> Self {
        Self::with_kind(CellKind::Plain, name.into(), initial)
    }

    /// Create an uninitialized cell.
    pub fn unbound(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, None)
    }

    /// Create a cell bound to `value`.
    pub fn bound(name: impl Into<Arc<str>>, value: Claim<R>) -> Self {
        Self::new(name, Some(value))
    }

    /// Create a bound cell from a value the object runtime may fail to
    /// produce. On failure no cell exists and nothing needs releasing.
    pub fn try_new_with<F>(name: impl Into<Arc<str>>, produce: F) -> CellResult<Self>
    where
        F: FnOnce() -> anyhow::Result<Claim<R>>,
    {
        let value = produce()?;
        Ok(Self::bound(name, value))
    }

    pub(crate) fn with_kind(kind: CellKind, name: Arc<str>, initial: Option<Claim<R>>) -> Self {
        Self {
            slot: Slot::new(kind, name, initial),
        }
    }
}

impl<R: ObjectRuntime> PlainCell<R> {
    pub fn name(&self) -> &str {
        self.slot.name()
    }

    pub fn state(&self) -> CellState {
        self.slot.state()
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.is_initialized()
    }

    /// Borrow the bound object. No claim is acquired.
    pub fn read(&self) -> CellResult<Borrowed<'_, R>> {
        match self.slot.get() {
            Some(object) => Ok(Borrowed::new(object)),
            None => {
                self.slot.record_unbound_read();
                Err(self.unbound_error())
            }
        }
    }

    /// Acquire a new claim on the bound object, for values that must outlive
    /// the cell.
    pub fn read_owned(&self) -> CellResult<Claim<R>> {
        self.read().map(|view| view.to_claim())
    }

    /// Bind the cell to `value`, releasing any previous claim.
    pub fn assign(&mut self, value: Claim<R>) {
        drop(self.slot.replace(value));
    }

    /// Bind the cell to a borrowed object, acquiring a claim for it.
    pub fn assign_borrowed(&mut self, object: R::Object) {
        self.assign(Claim::acquire(object));
    }

    /// Delete the variable, releasing its claim.
    pub fn clear(&mut self) -> CellResult<()> {
        match self.slot.unbind(Unbind::Release) {
            Some(claim) => {
                drop(claim);
                Ok(())
            }
            None => Err(self.unbound_error()),
        }
    }

    /// Move the claim out to the caller without releasing it.
    pub fn take(&mut self) -> CellResult<Claim<R>> {
        self.slot
            .unbind(Unbind::Transfer)
            .ok_or_else(|| self.unbound_error())
    }

    fn unbound_error(&self) -> CellError {
        CellError::unbound(self.slot.name(), Access::Local)
    }
}

impl<R: ObjectRuntime> fmt::Debug for PlainCell<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlainCell")
            .field("name", &self.name())
            .field("value", &self.slot.get())
            .finish()
    }
}
