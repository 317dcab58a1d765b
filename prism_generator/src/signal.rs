//! Non-local exits inside a generator body.
//!
//! A suspension is not a host-level control-flow primitive, so the body
//! reports it the same way it reports every other non-local exit: as the
//! `Err` side of [`ExecResult`]. Each resumable construct inspects the
//! [`Unwind`] passing through it, records its position when it is a
//! [`Unwind::Suspend`], and forwards it with `?`. Only the driver consumes
//! a suspension.

use prism_core::{ExceptionRef, PrismError, Value};
use std::fmt;

/// Result of executing a statement or evaluating an expression.
pub type ExecResult<T> = Result<T, Unwind>;

/// A non-local exit propagating out of a node.
#[derive(Clone)]
pub enum Unwind {
    /// The body suspended at a yield point, carrying the yielded value.
    Suspend(Value),
    /// A Python exception is propagating.
    Exception(ExceptionRef),
    /// `return` with its value.
    Return(Value),
    /// `break` looking for the nearest loop.
    Break,
    /// `continue` looking for the nearest loop.
    Continue,
    /// A protocol violation. `finally` blocks still run, `except` never matches.
    Fatal(PrismError),
}

impl Unwind {
    /// Returns true for a suspension.
    #[inline]
    pub fn is_suspend(&self) -> bool {
        matches!(self, Self::Suspend(_))
    }

    /// Returns the propagating exception, if any.
    #[inline]
    pub fn exception(&self) -> Option<&ExceptionRef> {
        match self {
            Self::Exception(exc) => Some(exc),
            _ => None,
        }
    }

    /// Short name for log output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Suspend(_) => "suspend",
            Self::Exception(_) => "exception",
            Self::Return(_) => "return",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Fatal(_) => "fatal",
        }
    }
}

impl From<PrismError> for Unwind {
    #[inline]
    fn from(err: PrismError) -> Self {
        match err {
            PrismError::Exception(exc) => Self::Exception(exc),
            misuse => Self::Fatal(misuse),
        }
    }
}

impl From<ExceptionRef> for Unwind {
    #[inline]
    fn from(exc: ExceptionRef) -> Self {
        Self::Exception(exc)
    }
}

impl fmt::Debug for Unwind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspend(v) => f.debug_tuple("Suspend").field(v).finish(),
            Self::Exception(exc) => write!(f, "Exception({})", exc.format()),
            Self::Return(v) => f.debug_tuple("Return").field(v).finish(),
            Self::Break => f.write_str("Break"),
            Self::Continue => f.write_str("Continue"),
            Self::Fatal(err) => write!(f, "Fatal({err})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::ExceptionTypeId;

    #[test]
    fn test_user_exception_converts_to_exception() {
        let unwind = Unwind::from(PrismError::value_error("bad"));
        assert!(unwind.exception().is_some());
        assert_eq!(unwind.kind(), "exception");
    }

    #[test]
    fn test_misuse_converts_to_fatal() {
        let unwind = Unwind::from(PrismError::GeneratorRunning);
        assert!(matches!(unwind, Unwind::Fatal(PrismError::GeneratorRunning)));
        assert!(unwind.exception().is_none());
    }

    #[test]
    fn test_is_suspend() {
        assert!(Unwind::Suspend(Value::int(1)).is_suspend());
        assert!(!Unwind::Return(Value::none()).is_suspend());
        assert!(!Unwind::Break.is_suspend());
    }

    #[test]
    fn test_debug_formats_exception() {
        let unwind = Unwind::from(PrismError::raise(ExceptionTypeId::KeyError, "k"));
        assert_eq!(format!("{unwind:?}"), "Exception(KeyError: k)");
    }
}
