use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use varcell_metrics::CellKind;

use super::{Slot, Unbind};
use crate::error::invariant_violation;
use crate::object::{Borrowed, Claim, ObjectRuntime};

static TEMP_NAME: Lazy<Arc<str>> = Lazy::new(|| Arc::from("<temporary>"));

/// Storage for a compiler-introduced temporary.
///
/// Temporaries are never visible to the compiled program, so reading or
/// taking an unbound one is a code generation bug and aborts instead of
/// returning an error.
pub struct TempCell<R: ObjectRuntime> {
    slot: Slot<R>,
}

impl<R: ObjectRuntime> TempCell<R> {
    pub fn new() -> Self {
        Self {
            slot: Slot::new(CellKind::Temp, Arc::clone(&TEMP_NAME), None),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.is_initialized()
    }

    pub fn read(&self) -> Borrowed<'_, R> {
        match self.slot.get() {
            Some(object) => Borrowed::new(object),
            None => invariant_violation("read of unassigned temporary"),
        }
    }

    pub fn assign(&mut self, value: Claim<R>) {
        drop(self.slot.replace(value));
    }

    pub fn take(&mut self) -> Claim<R> {
        match self.slot.unbind(Unbind::Transfer) {
            Some(claim) => claim,
            None => invariant_violation("take of unassigned temporary"),
        }
    }

    /// Release the value if any. Returns whether something was released.
    pub fn clear(&mut self) -> bool {
        if !self.slot.is_initialized() {
            return false;
        }
        self.slot.unbind(Unbind::Release).is_some()
    }
}

impl<R: ObjectRuntime> Default for TempCell<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ObjectRuntime> fmt::Debug for TempCell<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TempCell").field(&self.slot.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingRuntime;

    type Temp = TempCell<CountingRuntime>;

    #[test]
    fn test_temp_round_trip() {
        let mut temp = Temp::new();
        assert!(!temp.is_initialized());

        let value = CountingRuntime::allocate();
        let object = value.object();
        temp.assign(value);
        assert_eq!(temp.read().object(), object);

        let claim = temp.take();
        assert!(!temp.is_initialized());
        drop(claim);
        assert!(CountingRuntime::is_freed(object));
    }

    #[test]
    fn test_clear_is_silent_when_unbound() {
        let mut temp = Temp::default();
        assert!(!temp.clear());

        temp.assign(CountingRuntime::allocate());
        assert!(temp.clear());
        assert_eq!(CountingRuntime::live_objects(), 0);
    }

    #[test]
    #[should_panic(expected = "read of unassigned temporary")]
    fn test_unbound_read_aborts() {
        let temp = Temp::new();
        let _ = temp.read();
    }
}
