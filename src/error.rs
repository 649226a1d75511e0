//! Error taxonomy for the round tracker.
//!
//! Missing ids are not errors: operations on them are no-ops that report
//! `false` or `None`. Location failures travel on the position stream as
//! [`LocationError`](crate::position::LocationError) values and never abort
//! an operation.

use crate::round::Phase;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required field was empty. Nothing was changed.
    #[error("{field} must not be empty")]
    Validation { field: &'static str },

    /// The operation is not allowed in the current phase. Nothing was changed.
    #[error("cannot {operation} while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: Phase,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = Error::Validation { field: "name" };
        assert_eq!(err.to_string(), "name must not be empty");

        let err = Error::InvalidTransition {
            operation: "end a round",
            state: Phase::Idle,
        };
        assert_eq!(err.to_string(), "cannot end a round while no round is active");
    }
}
