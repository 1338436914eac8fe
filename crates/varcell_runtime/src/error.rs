//! Errors raised by variable cells

use std::sync::Arc;

use thiserror::Error;

pub type CellResult<T> = Result<T, CellError>;

/// Which side of a closure capture an access came from. Only affects the
/// wording of unbound errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The activation that owns the variable
    Local,
    /// A nested activation reaching a captured variable
    Free,
}

#[derive(Debug, Error)]
pub enum CellError {
    /// Read or delete of a local that has no value
    #[error("local variable '{name}' referenced before assignment")]
    UnboundLocal { name: Arc<str> },

    /// Read or delete of a captured variable that has no value
    #[error("free variable '{name}' referenced before assignment in enclosing scope")]
    UnboundFree { name: Arc<str> },

    /// The object runtime failed while producing a value for a cell
    #[error("object runtime failure: {0}")]
    ObjectRuntime(#[from] anyhow::Error),
}

impl CellError {
    pub(crate) fn unbound(name: &Arc<str>, access: Access) -> Self {
        let name = Arc::clone(name);
        match access {
            Access::Local => Self::UnboundLocal { name },
            Access::Free => Self::UnboundFree { name },
        }
    }

    /// Whether this is the error compiled programs are expected to handle
    pub fn is_unbound(&self) -> bool {
        matches!(self, Self::UnboundLocal { .. } | Self::UnboundFree { .. })
    }

    /// The variable named by an unbound error
    pub fn variable_name(&self) -> Option<&str> {
        match self {
            Self::UnboundLocal { name } | Self::UnboundFree { name } => Some(name),
            Self::ObjectRuntime(_) => None,
        }
    }
}

/// Abort on a broken ownership invariant.
///
/// These indicate a code generation bug, never a user program error, so
/// they are not recoverable.
#[track_caller]
pub(crate) fn invariant_violation(message: &str) -> ! {
    tracing::error!(%message, "variable cell invariant violated");
    panic!("variable cell invariant violated: {message}");
}
