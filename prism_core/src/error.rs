//! Error types and result definitions for Prism.
//!
//! Two very different things can go wrong while driving a generator:
//!
//! - **User exceptions**: a Python exception escaped the generator body (or a
//!   protocol call such as `__next__`/`__exit__`). These carry the full
//!   exception object, including its `__context__`/`__cause__` chain.
//! - **Protocol violations**: the caller misused the generator protocol
//!   (resuming a running or exhausted generator, yielding during `close()`).
//!   These are programming-contract errors and are never matched by an
//!   `except` clause inside a generator body.
//!
//! Both travel through [`PrismError`]; [`PrismError::is_misuse`] tells them
//! apart.

use crate::exception::{ExceptionObject, ExceptionRef, ExceptionTypeId};
use std::sync::Arc;
use thiserror::Error;

/// The unified result type used throughout Prism.
pub type PrismResult<T> = Result<T, PrismError>;

/// Error type covering user exceptions and generator protocol violations.
#[derive(Error, Debug, Clone)]
pub enum PrismError {
    /// A Python exception propagated to the caller.
    #[error("{}", .0.format())]
    Exception(ExceptionRef),

    /// The generator was resumed while its body was executing.
    #[error("ValueError: generator already executing")]
    GeneratorRunning,

    /// The generator already completed or failed and cannot be resumed.
    #[error("generator already exhausted")]
    GeneratorExhausted,

    /// `send()` with a non-`None` value before the first `next()`.
    #[error("TypeError: can't send non-None value to a just-started generator")]
    CantSendNonNone,

    /// The generator yielded while unwinding from `close()`.
    #[error("RuntimeError: generator ignored GeneratorExit")]
    YieldDuringClose,

    /// Internal engine invariant violated (should never occur in a correct build).
    #[error("InternalError: {message}")]
    Internal {
        /// Error description.
        message: Arc<str>,
    },
}

impl PrismError {
    /// Wrap a builtin exception with a message.
    #[must_use]
    pub fn raise(type_id: ExceptionTypeId, message: impl Into<Arc<str>>) -> Self {
        Self::Exception(ExceptionObject::builtin(type_id, message))
    }

    /// Create a `TypeError`.
    #[must_use]
    pub fn type_error(message: impl Into<Arc<str>>) -> Self {
        Self::raise(ExceptionTypeId::TypeError, message)
    }

    /// Create a `ValueError`.
    #[must_use]
    pub fn value_error(message: impl Into<Arc<str>>) -> Self {
        Self::raise(ExceptionTypeId::ValueError, message)
    }

    /// Create a `RuntimeError`.
    #[must_use]
    pub fn runtime_error(message: impl Into<Arc<str>>) -> Self {
        Self::raise(ExceptionTypeId::RuntimeError, message)
    }

    /// Create an `AttributeError` for a missing protocol method.
    #[must_use]
    pub fn attribute(type_name: &str, attr: &str) -> Self {
        Self::raise(
            ExceptionTypeId::AttributeError,
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<Arc<str>>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a protocol violation rather than a user exception.
    #[inline]
    #[must_use]
    pub fn is_misuse(&self) -> bool {
        !matches!(self, Self::Exception(_))
    }

    /// Returns the carried exception, if this is a user exception.
    #[inline]
    #[must_use]
    pub fn exception(&self) -> Option<&ExceptionRef> {
        match self {
            Self::Exception(exc) => Some(exc),
            _ => None,
        }
    }

    /// Returns true if this is a user exception that is an instance of `type_id`.
    #[must_use]
    pub fn is_instance(&self, type_id: ExceptionTypeId) -> bool {
        self.exception().is_some_and(|exc| exc.is_builtin(type_id))
    }
}

impl From<ExceptionRef> for PrismError {
    #[inline]
    fn from(exc: ExceptionRef) -> Self {
        Self::Exception(exc)
    }
}
