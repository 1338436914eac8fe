use std::fmt;
use std::sync::Arc;

use varcell_metrics::{CellKind, ClaimEvent, get_profiler};

use super::{CellState, ClosureBinding, Slot, Unbind};
use crate::error::{Access, CellError, CellResult};
use crate::object::{Claim, ObjectRuntime};
use crate::sync::{Lock, Shared};

struct SharedInner<R: ObjectRuntime> {
    name: Arc<str>,
    slot: Lock<Slot<R>>,
}

impl<R: ObjectRuntime> Drop for SharedInner<R> {
    fn drop(&mut self) {
        let bound = self.slot.with(Slot::is_initialized);
        get_profiler().record(CellKind::Shared, ClaimEvent::CellFreed);
        tracing::trace!(name = %self.name, bound, "shared cell freed");
        // The slot's own drop releases a bound value after this.
    }
}

/// A handle to a variable captured by nested closures.
///
/// Every handle owns one reference on the cell; the cell and its value live
/// until the last handle is released, which may be long after the defining
/// activation returned. All handles observe the same binding state.
///
/// Handles are not `Clone`. A new holder calls [`SharedCell::retain`], and
/// each handle is consumed once by [`SharedCell::release`] or by being
/// dropped, so the count cannot underflow.
///
/// Any handle can rebind the variable through `&self`, so reads hand out the
/// object itself rather than a view tied to the handle. Use
/// [`SharedCell::read_owned`] to keep a value across a possible rebind.
pub struct SharedCell<R: ObjectRuntime> {
    inner: Shared<SharedInner<R>>,
    access: Access,
}

impl<R: ObjectRuntime> SharedCell<R> {
    /// Allocate a cell for a captured variable. The creator holds the first
    /// reference.
    pub fn create(name: impl Into<Arc<str>>, initial: Option<Claim<R>>) -> Self {
        let name = name.into();
        let slot = Slot::new(CellKind::Shared, Arc::clone(&name), initial);
        Self {
            inner: Shared::new(SharedInner {
                name,
                slot: Lock::new(slot),
            }),
            access: Access::Local,
        }
    }

    pub fn unbound(name: impl Into<Arc<str>>) -> Self {
        Self::create(name, None)
    }

    /// Allocate a cell bound to a value the object runtime may fail to
    /// produce.
    pub fn try_create_with<F>(name: impl Into<Arc<str>>, produce: F) -> CellResult<Self>
    where
        F: FnOnce() -> anyhow::Result<Claim<R>>,
    {
        let value = produce()?;
        Ok(Self::create(name, Some(value)))
    }

    /// Take another reference on the cell for a nested activation that
    /// captures it.
    pub fn retain(&self) -> Self {
        let handle = Self {
            inner: Shared::clone(&self.inner),
            access: Access::Free,
        };
        tracing::trace!(name = %self.name(), refcount = handle.refcount(), "shared cell retained");
        handle
    }

    /// Give up this handle's reference. The last release frees the cell and
    /// releases its value.
    pub fn release(self) {
        tracing::trace!(name = %self.name(), refcount = self.refcount() - 1, "shared cell released");
        drop(self);
    }
}

impl<R: ObjectRuntime> SharedCell<R> {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of live handles on this cell.
    pub fn refcount(&self) -> usize {
        Shared::strong_count(&self.inner)
    }

    /// Whether two handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Shared::ptr_eq(&self.inner, &other.inner)
    }

    pub fn state(&self) -> CellState {
        self.inner.slot.with(Slot::state)
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.slot.with(Slot::is_initialized)
    }

    /// The bound object, without acquiring a claim. It stays valid only until
    /// the variable is next rebound or deleted through any handle.
    pub fn read(&self) -> CellResult<R::Object> {
        self.read_as(self.access)
    }

    /// A fresh claim on the bound object, acquired under the cell lock so a
    /// concurrent rebind cannot release it first.
    pub fn read_owned(&self) -> CellResult<Claim<R>> {
        self.read_owned_as(self.access)
    }

    /// Bind the variable, releasing any previous claim. Visible through
    /// every handle.
    pub fn assign(&self, value: Claim<R>) {
        let old = self.inner.slot.with_mut(|slot| slot.replace(value));
        drop(old);
    }

    pub fn assign_borrowed(&self, object: R::Object) {
        self.assign(Claim::acquire(object));
    }

    /// Delete the variable, releasing its claim.
    pub fn clear(&self) -> CellResult<()> {
        self.clear_as(self.access)
    }

    /// Move the claim out without releasing it.
    pub fn take(&self) -> CellResult<Claim<R>> {
        self.inner
            .slot
            .with_mut(|slot| slot.unbind(Unbind::Transfer))
            .ok_or_else(|| self.unbound_error(self.access))
    }

    /// The accessor a nested body uses for this captured variable. Borrowing
    /// the handle ties the binding's lifetime to the retained reference.
    pub fn bind(&self) -> ClosureBinding<'_, R> {
        ClosureBinding::new(self)
    }

    pub(crate) fn read_as(&self, access: Access) -> CellResult<R::Object> {
        self.inner
            .slot
            .with(Self::bound_object)
            .ok_or_else(|| self.unbound_error(access))
    }

    pub(crate) fn read_owned_as(&self, access: Access) -> CellResult<Claim<R>> {
        self.inner
            .slot
            .with(|slot| Self::bound_object(slot).map(Claim::acquire))
            .ok_or_else(|| self.unbound_error(access))
    }

    pub(crate) fn clear_as(&self, access: Access) -> CellResult<()> {
        let old = self
            .inner
            .slot
            .with_mut(|slot| slot.unbind(Unbind::Release));
        match old {
            Some(claim) => {
                drop(claim);
                Ok(())
            }
            None => Err(self.unbound_error(access)),
        }
    }

    fn bound_object(slot: &Slot<R>) -> Option<R::Object> {
        let object = slot.get();
        if object.is_none() {
            slot.record_unbound_read();
        }
        object
    }

    fn unbound_error(&self, access: Access) -> CellError {
        CellError::unbound(&self.inner.name, access)
    }
}

impl<R: ObjectRuntime> fmt::Debug for SharedCell<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.inner.slot.with(Slot::get);
        f.debug_struct("SharedCell")
            .field("name", &self.name())
            .field("value", &value)
            .field("refcount", &self.refcount())
            .finish()
    }
}
