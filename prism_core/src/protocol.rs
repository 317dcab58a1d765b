//! Object protocols consumed by the generator engine.
//!
//! The engine does not know the concrete types it iterates or enters; it
//! talks to them through two capability traits:
//!
//! - [`IterProtocol`]: `__next__` plus the optional `send` / `throw` /
//!   `close` methods that `yield from` forwards to a delegate.
//! - [`ContextManager`]: `__enter__` / `__exit__` for `with` blocks.
//!
//! Exhaustion is reported as [`IterStep::Returned`] carrying the final
//! payload. Foreign implementations that prefer to raise `StopIteration`
//! are accepted too; [`normalize_step`] folds that form into `Returned`.

use crate::error::{PrismError, PrismResult};
use crate::exception::{ExceptionRef, ExceptionType, Traceback};
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

// ============================================================================
// Iteration Step
// ============================================================================

/// Outcome of advancing an iterator or generator by one step.
#[derive(Debug, Clone, PartialEq)]
pub enum IterStep {
    /// The iterator produced a value.
    Yielded(Value),
    /// The iterator is exhausted; carries the completion payload
    /// (`StopIteration.value`, a generator's return value).
    Returned(Value),
}

impl IterStep {
    /// Returns true if a value was produced.
    #[inline]
    pub fn is_yielded(&self) -> bool {
        matches!(self, Self::Yielded(_))
    }

    /// Returns true if the iterator is exhausted.
    #[inline]
    pub fn is_returned(&self) -> bool {
        matches!(self, Self::Returned(_))
    }

    /// Extracts the yielded value, if any.
    #[inline]
    pub fn yielded_value(&self) -> Option<&Value> {
        match self {
            Self::Yielded(v) => Some(v),
            Self::Returned(_) => None,
        }
    }

    /// Extracts the completion payload, if exhausted.
    #[inline]
    pub fn returned_value(&self) -> Option<&Value> {
        match self {
            Self::Returned(v) => Some(v),
            Self::Yielded(_) => None,
        }
    }
}

/// Folds a raised `StopIteration` into [`IterStep::Returned`].
///
/// Any other error passes through unchanged.
pub fn normalize_step(result: PrismResult<IterStep>) -> PrismResult<IterStep> {
    match result {
        Err(PrismError::Exception(exc))
            if exc.is_builtin(crate::exception::ExceptionTypeId::StopIteration) =>
        {
            Ok(IterStep::Returned(exc.stop_value()))
        }
        other => other,
    }
}

// ============================================================================
// Iterator Protocol
// ============================================================================

/// The sub-iterator protocol.
///
/// `next_step` is mandatory. The remaining methods are optional: the default
/// implementations return `None`, meaning "this object has no such method",
/// which lets `yield from` apply Python's fallback rules.
pub trait IterProtocol {
    /// Python type name, used in error messages.
    fn type_name(&self) -> &str;

    /// `__next__`.
    fn next_step(&self) -> PrismResult<IterStep>;

    /// `send(value)`.
    fn send(&self, value: Value) -> Option<PrismResult<IterStep>> {
        let _ = value;
        None
    }

    /// `throw(exc)`.
    fn throw(&self, exc: ExceptionRef) -> Option<PrismResult<IterStep>> {
        let _ = exc;
        None
    }

    /// `close()`.
    fn close(&self) -> Option<PrismResult<()>> {
        None
    }
}

/// `iter(value)`.
///
/// Iterators are their own iterators. Lists, tuples and strings get a fresh
/// positional iterator; a list iterator observes later mutation of the list
/// the way Python's does.
///
/// # Errors
///
/// `TypeError` if the value is not iterable.
pub fn get_iter(value: &Value) -> PrismResult<Rc<dyn IterProtocol>> {
    match value {
        Value::Iterator(iter) => Ok(Rc::clone(iter)),
        Value::List(items) => Ok(Rc::new(SequenceIterator::new(Sequence::List(Rc::clone(
            items,
        ))))),
        Value::Tuple(items) => Ok(Rc::new(SequenceIterator::new(Sequence::Tuple(Rc::clone(
            items,
        ))))),
        Value::Str(s) => {
            let chars: Rc<[Value]> = s.chars().map(|c| Value::str(c.to_string())).collect();
            Ok(Rc::new(SequenceIterator::new(Sequence::Str(chars))))
        }
        other => Err(PrismError::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

enum Sequence {
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    Str(Rc<[Value]>),
}

/// Positional iterator over a list, tuple or string.
pub struct SequenceIterator {
    source: Sequence,
    index: Cell<usize>,
}

impl SequenceIterator {
    fn new(source: Sequence) -> Self {
        Self {
            source,
            index: Cell::new(0),
        }
    }

    fn get(&self, index: usize) -> Option<Value> {
        match &self.source {
            Sequence::List(items) => items.borrow().get(index).cloned(),
            Sequence::Tuple(items) | Sequence::Str(items) => items.get(index).cloned(),
        }
    }
}

impl IterProtocol for SequenceIterator {
    fn type_name(&self) -> &str {
        match self.source {
            Sequence::List(_) => "list_iterator",
            Sequence::Tuple(_) => "tuple_iterator",
            Sequence::Str(_) => "str_iterator",
        }
    }

    fn next_step(&self) -> PrismResult<IterStep> {
        let index = self.index.get();
        match self.get(index) {
            Some(value) => {
                self.index.set(index + 1);
                Ok(IterStep::Yielded(value))
            }
            None => Ok(IterStep::Returned(Value::none())),
        }
    }
}

impl fmt::Debug for SequenceIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceIterator")
            .field("type", &self.type_name())
            .field("index", &self.index.get())
            .finish()
    }
}

// ============================================================================
// Context Manager Protocol
// ============================================================================

/// The `(type, value, traceback)` triple handed to `__exit__`.
#[derive(Debug, Clone, Default)]
pub struct ExcInfo {
    /// Exception class, `None` when the block completed normally.
    pub exc_type: Option<ExceptionType>,
    /// Exception instance.
    pub value: Option<ExceptionRef>,
    /// Snapshot of the exception's traceback.
    pub traceback: Option<Traceback>,
}

impl ExcInfo {
    /// `(None, None, None)`.
    #[inline]
    pub fn none() -> Self {
        Self::default()
    }

    /// The triple describing `exc`.
    pub fn from_exception(exc: &ExceptionRef) -> Self {
        Self {
            exc_type: Some(exc.class().clone()),
            value: Some(Rc::clone(exc)),
            traceback: Some(exc.traceback().clone()),
        }
    }

    /// Returns true for `(None, None, None)`.
    #[inline]
    pub fn is_none(&self) -> bool {
        self.value.is_none()
    }
}

/// The context-manager protocol.
pub trait ContextManager {
    /// Python type name, used in error messages.
    fn type_name(&self) -> &str {
        "context_manager"
    }

    /// `__enter__`; the result is bound to the `as` target.
    fn enter(&self) -> PrismResult<Value>;

    /// `__exit__`; returning `true` suppresses the in-flight exception.
    fn exit(&self, info: &ExcInfo) -> PrismResult<bool>;
}

/// Views `value` as a context manager.
///
/// # Errors
///
/// `TypeError` if the value does not support the protocol.
pub fn as_context_manager(value: &Value) -> PrismResult<Rc<dyn ContextManager>> {
    match value {
        Value::ContextManager(manager) => Ok(Rc::clone(manager)),
        other => Err(PrismError::type_error(format!(
            "'{}' object does not support the context manager protocol",
            other.type_name()
        ))),
    }
}
