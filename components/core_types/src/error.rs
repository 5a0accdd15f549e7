//! Runtime error types.
//!
//! This module provides the error type shared by the context engine and the
//! rest of the runtime. Resource exhaustion inside the type propagator is
//! deliberately *not* a `VmError`; it has its own abort signal so callers
//! can tell "give up optimizing" apart from misuse.

use std::fmt;

/// The kind of runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A value of the wrong type was supplied
    TypeError,
    /// A value was structurally valid but semantically wrong
    ValueError,
    /// A runtime invariant was violated by the caller
    RuntimeError,
    /// A lookup found nothing and no fallback applied
    LookupError,
}

/// A runtime error with a kind and a human-readable message.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, VmError};
///
/// let err = VmError::type_error("an instance of Context was expected");
/// assert_eq!(err.kind, ErrorKind::TypeError);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VmError {
    /// The kind of error
    pub kind: ErrorKind,
    /// Human-readable message identifying the failed invariant
    pub message: String,
}

impl VmError {
    /// Create a `TypeError`
    pub fn type_error(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    /// Create a `ValueError`
    pub fn value_error(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ValueError,
            message: message.into(),
        }
    }

    /// Create a `RuntimeError`
    pub fn runtime_error(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::RuntimeError,
            message: message.into(),
        }
    }

    /// Create a `LookupError`
    pub fn lookup_error(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::LookupError,
            message: message.into(),
        }
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ValueError => "ValueError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::LookupError => "LookupError",
        };
        write!(f, "{}: {}", kind, self.message)
    }
}

impl std::error::Error for VmError {}
