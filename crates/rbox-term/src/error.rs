// SPDX-License-Identifier: MIT
//
// Error taxonomy for the engine.
//
// Caller programming errors (`NotInitialized`, `AlreadyInitialized`,
// `InvalidArgument`, `OutOfBounds`) are always returned synchronously and
// never recovered internally. `Io` carries the OS diagnostic and a short
// description of what the engine was doing when it failed.

use std::io;

use thiserror::Error;

/// Every failure an engine operation can report.
#[derive(Debug, Error)]
pub enum Error {
    /// The operation needs an active session.
    #[error("session is not initialized")]
    NotInitialized,

    /// `init` was called on a session that is already active.
    #[error("session is already initialized")]
    AlreadyInitialized,

    /// An input failed a type or range check.
    #[error("invalid {what}: {reason}")]
    InvalidArgument {
        /// Which argument was rejected.
        what: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Terminal or descriptor I/O failed.
    #[error("{context}: {source}")]
    Io {
        /// What the engine was doing.
        context: &'static str,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A buffer coordinate lies outside the current grid.
    #[error("({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        /// Requested column.
        x: u16,
        /// Requested row.
        y: u16,
        /// Grid width at the time of the call.
        width: u16,
        /// Grid height at the time of the call.
        height: u16,
    },
}

impl Error {
    pub(crate) const fn io(context: &'static str, source: io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            what,
            reason: reason.into(),
        }
    }

    /// Whether this is an I/O failure (as opposed to a caller error).
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Engine result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_carries_os_text() {
        let err = Error::io("writing frame", io::Error::other("disk full"));
        assert_eq!(err.to_string(), "writing frame: disk full");
        assert!(err.is_io());
    }

    #[test]
    fn out_of_bounds_message() {
        let err = Error::OutOfBounds {
            x: 90,
            y: 3,
            width: 80,
            height: 24,
        };
        assert_eq!(err.to_string(), "(90, 3) is outside the 80x24 grid");
        assert!(!err.is_io());
    }

    #[test]
    fn invalid_argument_message() {
        let err = Error::invalid("color", "code 300 is above 256");
        assert_eq!(err.to_string(), "invalid color: code 300 is above 256");
    }

    #[test]
    fn state_errors_are_distinct() {
        assert_ne!(
            Error::NotInitialized.to_string(),
            Error::AlreadyInitialized.to_string()
        );
    }
}
