//! Error type shared by every collection in the crate.
//!
//! Persistent operations that cannot fail return plain values. Only the
//! checked null-policy API, the builders and the cursors report errors.

use thiserror::Error;

/// Errors reported by collection operations.
///
/// Every error is local to the call that produced it: snapshots that existed
/// before the call are still valid afterwards.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A null key or value was rejected by the instance's [`Config`](crate::Config),
    /// or an argument did not belong to the receiver.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the argument
        message: &'static str,
    },

    /// A cursor observed a structural change it did not perform itself.
    #[error("Collection was structurally modified during iteration")]
    ConcurrentModification,

    /// The receiver is not in a state that allows the operation.
    #[error("Illegal state: {message}")]
    IllegalState {
        /// Which state check failed
        message: &'static str,
    },

    /// The operation is not available through this handle.
    #[error("Unsupported operation: {operation}")]
    Unsupported {
        /// The rejected operation
        operation: &'static str,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn sealed() -> Self {
        Error::IllegalState {
            message: "builder has already been sealed",
        }
    }

    pub(crate) fn null_key() -> Self {
        Error::InvalidArgument {
            message: "null keys are not permitted by this collection",
        }
    }

    pub(crate) fn null_value() -> Self {
        Error::InvalidArgument {
            message: "null values are not permitted by this collection",
        }
    }
}
