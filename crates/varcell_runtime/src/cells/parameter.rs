use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use varcell_metrics::CellKind;

use super::PlainCell;
use crate::object::{Claim, ObjectRuntime, OwnershipMode};

/// A local seeded from an argument at function entry.
///
/// Whether the argument arrives as an owned claim or a borrowed reference is
/// decided by the calling convention, so construction takes it explicitly.
/// After construction the cell behaves exactly like a [`PlainCell`].
pub struct ParameterCell<R: ObjectRuntime> {
    cell: PlainCell<R>,
}

impl<R: ObjectRuntime> ParameterCell<R> {
    /// Take over the caller's claim on the argument.
    pub fn adopt_owned(name: impl Into<Arc<str>>, value: Claim<R>) -> Self {
        Self {
            cell: PlainCell::with_kind(CellKind::Parameter, name.into(), Some(value)),
        }
    }

    /// Acquire a claim of our own on a borrowed argument; the caller keeps
    /// its claim.
    pub fn adopt_borrowed(name: impl Into<Arc<str>>, object: R::Object) -> Self {
        Self::adopt_owned(name, Claim::acquire(object))
    }

    /// Seed the cell according to the call site's ownership mode.
    pub fn adopt(name: impl Into<Arc<str>>, object: R::Object, mode: OwnershipMode) -> Self {
        match mode {
            OwnershipMode::Owned => Self::adopt_owned(name, Claim::from_owned(object)),
            OwnershipMode::Borrowed => Self::adopt_borrowed(name, object),
        }
    }

    /// A parameter with no argument bound yet, for keyword-only or defaulted
    /// parameters the call machinery fills in later.
    pub fn unbound(name: impl Into<Arc<str>>) -> Self {
        Self {
            cell: PlainCell::with_kind(CellKind::Parameter, name.into(), None),
        }
    }

    pub fn into_inner(self) -> PlainCell<R> {
        self.cell
    }
}

impl<R: ObjectRuntime> Deref for ParameterCell<R> {
    type Target = PlainCell<R>;

    fn deref(&self) -> &PlainCell<R> {
        &self.cell
    }
}

impl<R: ObjectRuntime> DerefMut for ParameterCell<R> {
    fn deref_mut(&mut self) -> &mut PlainCell<R> {
        &mut self.cell
    }
}

impl<R: ObjectRuntime> fmt::Debug for ParameterCell<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ParameterCell").field(&self.cell).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingRuntime;

    type Param = ParameterCell<CountingRuntime>;

    #[test]
    fn test_adopt_owned_takes_callers_claim() {
        let argument = CountingRuntime::allocate();
        let object = argument.object();
        let acquires = CountingRuntime::total_acquires();

        let param = Param::adopt_owned("a", argument);
        assert_eq!(CountingRuntime::total_acquires(), acquires);
        assert_eq!(CountingRuntime::claims(object), 1);

        drop(param);
        assert!(CountingRuntime::is_freed(object));
    }

    #[test]
    fn test_adopt_borrowed_acquires_one_claim() {
        let caller = CountingRuntime::allocate();
        let object = caller.object();

        let param = Param::adopt_borrowed("a", object);
        assert_eq!(CountingRuntime::claims(object), 2);

        drop(param);
        assert_eq!(CountingRuntime::claims(object), 1);
        drop(caller);
        assert!(CountingRuntime::is_freed(object));
    }

    #[test]
    fn test_adopt_dispatches_on_mode() {
        let owned = CountingRuntime::allocate_raw();
        let borrowed = CountingRuntime::allocate_raw();

        let a = Param::adopt("a", owned, OwnershipMode::Owned);
        let b = Param::adopt("b", borrowed, OwnershipMode::Borrowed);
        assert_eq!(CountingRuntime::claims(owned), 1);
        assert_eq!(CountingRuntime::claims(borrowed), 2);

        drop(a);
        drop(b);
        assert!(CountingRuntime::is_freed(owned));
        CountingRuntime::release_claim(borrowed);
        assert!(CountingRuntime::is_freed(borrowed));
    }

    #[test]
    fn test_behaves_like_plain_cell() {
        let mut param = Param::adopt_owned("a", CountingRuntime::allocate());
        let replacement = CountingRuntime::allocate();
        let object = replacement.object();

        param.assign(replacement);
        assert_eq!(param.read().unwrap().object(), object);

        param.clear().unwrap();
        assert!(!param.is_initialized());
        assert!(param.clear().unwrap_err().is_unbound());
        assert!(CountingRuntime::is_freed(object));
    }

    #[test]
    fn test_unbound_parameter() {
        let param = Param::unbound("kw");
        assert!(!param.is_initialized());
        assert_eq!(param.name(), "kw");
    }
}
