//! Crate error taxonomy (spec.md §7).
//!
//! [`AtError`] is the internal vocabulary used by the lexer, classifier,
//! accumulator and pktio worker; it includes pacing codes that are legal
//! control flow internally but must never reach a caller. [`Error`] is the
//! public taxonomy every API function in this crate returns.

use thiserror::Error as ThisError;

/// Internal error/status codes shared by the AT utilities, classifier,
/// accumulator and pktio worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtError {
    /// Generic failure with no more specific code.
    Error,
    /// A request did not complete within its deadline.
    Timeout,
    /// Caller passed invalid input (e.g. unsupported radix, unmatched quote).
    BadParameter,
    /// Allocation failed.
    NoMemory,
    /// The modem produced a response the parser rejected.
    InvalidData,
    /// Preprocessor callback: the line did not match the expected prefix.
    PrefixMismatch,
    /// Preprocessor callback: not enough bytes buffered yet.
    SizeMismatch,
    /// Internal pacing code: more binary data is still expected.
    PendingData,
    /// Internal pacing code: the accumulator forced the data path.
    PendingBuffer,
    /// Outcome not covered by any other variant.
    Unknown,
}

impl core::fmt::Display for AtError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for AtError {}

/// Public, user-visible error taxonomy (spec.md §7 "User-visible").
#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("handle is null or uninitialized")]
    InvalidHandle,
    #[error("caller passed invalid inputs")]
    BadParameter,
    #[error("allocation failed")]
    NoMemory,
    #[error("command did not complete within its deadline")]
    Timeout,
    #[error("modem produced a response the parser rejected")]
    InvalidData,
    #[error("result is semantically unknown (e.g. RAT is Invalid)")]
    Unknown,
    #[error("operation is not allowed in the current state")]
    NotAllowed,
    #[error("a platform resource could not be created")]
    ResourceCreationFail,
}

impl From<AtError> for Error {
    /// Maps an internal code onto the public taxonomy. `PrefixMismatch`,
    /// `SizeMismatch`, `PendingData` and `PendingBuffer` are pacing codes
    /// that must be fully consumed inside the pktio worker; seeing one here
    /// is a bug in the worker, not a legitimate outcome to report to a
    /// caller.
    fn from(e: AtError) -> Self {
        match e {
            AtError::Timeout => Error::Timeout,
            AtError::Error | AtError::InvalidData => Error::InvalidData,
            AtError::BadParameter => Error::BadParameter,
            AtError::NoMemory => Error::NoMemory,
            AtError::Unknown => Error::Unknown,
            AtError::PrefixMismatch
            | AtError::SizeMismatch
            | AtError::PendingData
            | AtError::PendingBuffer => {
                debug_assert!(false, "pacing code {e:?} leaked past the pktio worker");
                Error::InvalidData
            }
        }
    }
}

pub type AtResult<T> = Result<T, AtError>;
pub type Result<T> = core::result::Result<T, Error>;
