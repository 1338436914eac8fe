//! Ownership of objects living in the wrapped object runtime
//!
//! The object runtime itself (allocation, reference counts, freeing) is not
//! part of this crate. Cells only need two primitives from it, captured by
//! [`ObjectRuntime`]: acquire one claim and release one claim. Every claim a
//! cell owns is represented by a [`Claim`], which releases itself on drop, so
//! a claim is released exactly once on every exit path.

use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;

use serde::{Deserialize, Serialize};

/// The reference-owner primitive of the wrapped object runtime.
///
/// Both operations are infallible and O(1). Releasing the last claim on an
/// object frees it.
pub trait ObjectRuntime: 'static {
    /// Handle to a runtime object. Holding a handle confers no ownership.
    type Object: Copy + Eq + fmt::Debug;

    /// Record one additional claim on `object` and hand it back.
    fn acquire_claim(object: Self::Object) -> Self::Object;

    /// Give up one claim on `object`, freeing it if this was the last one.
    fn release_claim(object: Self::Object);
}

/// How a caller passes an argument to a parameter cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnershipMode {
    /// The caller hands over a claim it already owns.
    Owned,
    /// The caller keeps its claim; the callee must acquire its own.
    Borrowed,
}

/// One owned claim on a runtime object.
///
/// Not `Clone`: a second owner needs a second claim, obtained with
/// [`Claim::duplicate`].
pub struct Claim<R: ObjectRuntime> {
    object: R::Object,
    _runtime: PhantomData<fn() -> R>,
}

impl<R: ObjectRuntime> Claim<R> {
    /// Take over a claim the caller already owns.
    pub fn from_owned(object: R::Object) -> Self {
        Self {
            object,
            _runtime: PhantomData,
        }
    }

    /// Acquire a new claim on a borrowed object.
    pub fn acquire(object: R::Object) -> Self {
        Self::from_owned(R::acquire_claim(object))
    }

    /// The object this claim is on.
    pub fn object(&self) -> R::Object {
        self.object
    }

    /// A borrowed view of the object, valid while this claim is alive.
    pub fn borrow(&self) -> Borrowed<'_, R> {
        Borrowed::new(self.object)
    }

    /// Acquire a second, independent claim on the same object.
    pub fn duplicate(&self) -> Self {
        Self::acquire(self.object)
    }

    /// Give up the RAII wrapper without releasing; the caller now owns the
    /// claim and must release it through the object runtime.
    pub fn into_owned(self) -> R::Object {
        let this = ManuallyDrop::new(self);
        this.object
    }
}

impl<R: ObjectRuntime> Drop for Claim<R> {
    fn drop(&mut self) {
        R::release_claim(self.object);
    }
}

impl<R: ObjectRuntime> fmt::Debug for Claim<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Claim").field(&self.object).finish()
    }
}

/// A borrowed reference to a runtime object.
///
/// Produced by cells that can only be rebound through `&mut`, so the claim
/// backing the borrow cannot be released while it is alive. Reading never
/// moves a claim; use [`Borrowed::to_claim`] to keep the object beyond the
/// borrow.
pub struct Borrowed<'a, R: ObjectRuntime> {
    object: R::Object,
    _source: PhantomData<&'a R>,
}

impl<R: ObjectRuntime> Borrowed<'_, R> {
    pub(crate) fn new(object: R::Object) -> Self {
        Self {
            object,
            _source: PhantomData,
        }
    }

    pub fn object(&self) -> R::Object {
        self.object
    }

    /// Acquire an owned claim on the borrowed object.
    pub fn to_claim(&self) -> Claim<R> {
        Claim::acquire(self.object)
    }
}

impl<R: ObjectRuntime> Clone for Borrowed<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: ObjectRuntime> Copy for Borrowed<'_, R> {}

impl<R: ObjectRuntime> PartialEq for Borrowed<'_, R> {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
    }
}

impl<R: ObjectRuntime> Eq for Borrowed<'_, R> {}

impl<R: ObjectRuntime> fmt::Debug for Borrowed<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Borrowed").field(&self.object).finish()
    }
}
