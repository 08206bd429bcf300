//! Status codes and the error taxonomy of the dispatch boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::operation::Operation;

/// Integer status handed back to the host.
///
/// Zero is success. Read and write report a byte count as a positive value.
/// Negative values are errno-style codes; handler codes outside the fixed
/// vocabulary below are forwarded verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(i32);

impl Status {
    /// Success.
    pub const OK: Status = Status(0);
    /// Entity does not exist (`-ENOENT`).
    pub const NOT_FOUND: Status = Status(-libc::ENOENT);
    /// Handler refused access (`-EACCES`).
    pub const PERMISSION_DENIED: Status = Status(-libc::EACCES);
    /// Downstream failure detected by the bridge itself (`-EIO`).
    pub const IO_ERROR: Status = Status(-libc::EIO);
    /// No handler registered for the operation (`-EPERM`).
    pub const NOT_PERMITTED: Status = Status(-libc::EPERM);

    /// Wrap a raw status code.
    pub const fn from_raw(code: i32) -> Self {
        Status(code)
    }

    /// Status for a positive errno value (`EACCES` becomes `-EACCES`).
    pub const fn from_errno(errno: i32) -> Self {
        Status(-errno.abs())
    }

    /// Status carrying a transferred byte count.
    pub fn bytes(count: usize) -> Self {
        Status(i32::try_from(count).unwrap_or(i32::MAX))
    }

    /// The raw code.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Returns true for zero or a positive byte count.
    pub const fn is_ok(self) -> bool {
        self.0 >= 0
    }

    /// Returns true for a negative code.
    pub const fn is_error(self) -> bool {
        self.0 < 0
    }

    /// Positive errno for a failing status.
    pub fn errno(self) -> Option<i32> {
        if self.is_error() {
            Some(self.0.checked_neg().unwrap_or(libc::EIO))
        } else {
            None
        }
    }

    /// Split into the success value or a classified error.
    pub fn into_result(self) -> BridgeResult<u32> {
        if self.is_ok() {
            Ok(self.0.unsigned_abs())
        } else {
            Err(BridgeError::from_status(self))
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::OK
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status(code)
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status.0
    }
}

/// Failure classes a dispatch can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Nothing registered for this operation.
    #[error("no handler registered for {0}")]
    Unregistered(Operation),

    /// Entity does not exist.
    #[error("not found")]
    NotFound,

    /// Handler refused access.
    #[error("permission denied")]
    PermissionDenied,

    /// The host rejected part of the result (a filler refusing an entry).
    #[error("I/O error")]
    Io,

    /// Any other negative handler code, kept as-is.
    #[error("handler status {0}")]
    Passthrough(i32),
}

impl BridgeError {
    /// Classify a failing status.
    ///
    /// `-EPERM` classifies as [`BridgeError::Passthrough`]: a raw status
    /// carries no operation, so it cannot be told apart from a handler that
    /// chose the code itself.
    pub fn from_status(status: Status) -> Self {
        match status {
            Status::NOT_FOUND => BridgeError::NotFound,
            Status::PERMISSION_DENIED => BridgeError::PermissionDenied,
            Status::IO_ERROR => BridgeError::Io,
            other => BridgeError::Passthrough(other.raw()),
        }
    }

    /// The status code the host sees for this error.
    pub fn status(&self) -> Status {
        match self {
            BridgeError::Unregistered(_) => Status::NOT_PERMITTED,
            BridgeError::NotFound => Status::NOT_FOUND,
            BridgeError::PermissionDenied => Status::PERMISSION_DENIED,
            BridgeError::Io => Status::IO_ERROR,
            BridgeError::Passthrough(code) => Status::from_raw(*code),
        }
    }

    /// Positive errno for host replies.
    pub fn errno(&self) -> i32 {
        self.status().errno().unwrap_or(libc::EIO)
    }
}

impl From<BridgeError> for Status {
    fn from(e: BridgeError) -> Self {
        e.status()
    }
}

/// Bridge result type.
pub type BridgeResult<T> = Result<T, BridgeError>;
