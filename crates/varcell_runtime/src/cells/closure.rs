use std::fmt;

use super::{CellState, SharedCell};
use crate::error::{Access, CellResult};
use crate::object::{Claim, ObjectRuntime};

/// Non-owning accessor for a captured variable inside a nested body.
///
/// Only obtainable through [`SharedCell::bind`] on a handle the nested
/// activation retained, and it borrows that handle, so it can never outlive
/// the cell. Unbound errors use the free-variable wording.
pub struct ClosureBinding<'a, R: ObjectRuntime> {
    cell: &'a SharedCell<R>,
}

impl<'a, R: ObjectRuntime> ClosureBinding<'a, R> {
    pub(crate) const fn new(cell: &'a SharedCell<R>) -> Self {
        Self { cell }
    }

    pub fn name(&self) -> &'a str {
        self.cell.name()
    }

    pub fn state(&self) -> CellState {
        self.cell.state()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.is_initialized()
    }

    /// The bound object without a claim; see [`SharedCell::read`].
    pub fn read(&self) -> CellResult<R::Object> {
        self.cell.read_as(Access::Free)
    }

    pub fn read_owned(&self) -> CellResult<Claim<R>> {
        self.cell.read_owned_as(Access::Free)
    }

    pub fn assign(&self, value: Claim<R>) {
        self.cell.assign(value);
    }

    pub fn assign_borrowed(&self, object: R::Object) {
        self.cell.assign_borrowed(object);
    }

    pub fn clear(&self) -> CellResult<()> {
        self.cell.clear_as(Access::Free)
    }

    /// The shared cell this binding reads through
    pub const fn cell(&self) -> &'a SharedCell<R> {
        self.cell
    }
}

impl<R: ObjectRuntime> Clone for ClosureBinding<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: ObjectRuntime> Copy for ClosureBinding<'_, R> {}

impl<R: ObjectRuntime> fmt::Debug for ClosureBinding<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClosureBinding").field(self.cell).finish()
    }
}
