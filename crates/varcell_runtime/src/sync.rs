//! Reference counting used by shared cells.
//!
//! Compiled functions run sequentially by default, so shared cells use plain
//! counters (`Rc` + `RefCell`). Building with the `atomic-refcount` feature
//! switches to atomic counters (`Arc` + `parking_lot::Mutex`) for execution
//! models where compiled code runs on several threads at once.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How shared cell reference counts are maintained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefcountMode {
    /// Non-atomic counters; activations never run in parallel
    Plain,
    /// Atomic counters; activations may race on a captured variable
    Atomic,
}

impl RefcountMode {
    /// The mode this build was compiled with
    pub const fn active() -> Self {
        if cfg!(feature = "atomic-refcount") {
            Self::Atomic
        } else {
            Self::Plain
        }
    }
}

impl FromStr for RefcountMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain" | "rc" | "single-threaded" => Ok(Self::Plain),
            "atomic" | "arc" | "threaded" => Ok(Self::Atomic),
            _ => Err(format!("Unknown refcount mode: {s}")),
        }
    }
}

impl fmt::Display for RefcountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("plain"),
            Self::Atomic => f.write_str("atomic"),
        }
    }
}

#[cfg(not(feature = "atomic-refcount"))]
mod imp {
    use std::cell::RefCell;

    pub type Shared<T> = std::rc::Rc<T>;

    pub struct Lock<T>(RefCell<T>);

    impl<T> Lock<T> {
        pub fn new(value: T) -> Self {
            Self(RefCell::new(value))
        }

        pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
            f(&self.0.borrow())
        }

        pub fn with_mut<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
            f(&mut self.0.borrow_mut())
        }
    }
}

#[cfg(feature = "atomic-refcount")]
mod imp {
    use parking_lot::Mutex;

    pub type Shared<T> = std::sync::Arc<T>;

    pub struct Lock<T>(Mutex<T>);

    impl<T> Lock<T> {
        pub fn new(value: T) -> Self {
            Self(Mutex::new(value))
        }

        pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
            f(&self.0.lock())
        }

        pub fn with_mut<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
            f(&mut self.0.lock())
        }
    }
}

pub(crate) use imp::{Lock, Shared};
