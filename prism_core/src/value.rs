//! Python value representation consumed by the generator engine.
//!
//! `Value` is a tagged enum: immediates (`None`, `bool`, `int`, `float`) are
//! stored inline, everything else is reference counted. Objects that take
//! part in the engine's protocols (iterators, context managers, exceptions)
//! are stored as trait objects so foreign implementations can be driven
//! without the engine knowing their concrete type.
//!
//! # Equality
//!
//! `==` follows Python value semantics for immediates, strings and
//! containers (`1 == 1.0`), and identity for protocol objects. Use
//! [`Value::is`] for Python's `is`.

use crate::exception::{ExceptionRef, ExceptionType};
use crate::protocol::{ContextManager, IterProtocol};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// A Python value.
#[derive(Clone, Default)]
pub enum Value {
    /// `None`.
    #[default]
    None,
    /// `True` / `False`.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Immutable string.
    Str(Arc<str>),
    /// Immutable tuple.
    Tuple(Rc<[Value]>),
    /// Mutable list (shared, like every Python list reference).
    List(Rc<RefCell<Vec<Value>>>),
    /// Exception instance.
    Exception(ExceptionRef),
    /// Exception class (for `raise ValueError` and `except` tests).
    ExceptionType(ExceptionType),
    /// Object implementing the iterator protocol.
    Iterator(Rc<dyn IterProtocol>),
    /// Object implementing the context-manager protocol.
    ContextManager(Rc<dyn ContextManager>),
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a None value.
    #[inline]
    #[must_use]
    pub const fn none() -> Self {
        Self::None
    }

    /// Create a boolean value.
    #[inline]
    #[must_use]
    pub const fn bool(b: bool) -> Self {
        Self::Bool(b)
    }

    /// Create an integer value.
    #[inline]
    #[must_use]
    pub const fn int(i: i64) -> Self {
        Self::Int(i)
    }

    /// Create a float value.
    #[inline]
    #[must_use]
    pub const fn float(f: f64) -> Self {
        Self::Float(f)
    }

    /// Create a string value.
    #[inline]
    #[must_use]
    pub fn str(s: impl Into<Arc<str>>) -> Self {
        Self::Str(s.into())
    }

    /// Create a tuple from values.
    #[must_use]
    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Tuple(items.into_iter().collect())
    }

    /// Create a new list from values.
    #[must_use]
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// Wrap an iterator object.
    #[inline]
    #[must_use]
    pub fn iterator(iter: Rc<dyn IterProtocol>) -> Self {
        Self::Iterator(iter)
    }

    /// Wrap a context-manager object.
    #[inline]
    #[must_use]
    pub fn context_manager(manager: Rc<dyn ContextManager>) -> Self {
        Self::ContextManager(manager)
    }

    // =========================================================================
    // Type Checks and Accessors
    // =========================================================================

    /// Check if this is None.
    #[inline]
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Extract as boolean.
    #[inline]
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract as integer.
    #[inline]
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract as float (no coercion).
    #[inline]
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Extract as string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Extract as exception instance.
    #[inline]
    #[must_use]
    pub fn as_exception(&self) -> Option<&ExceptionRef> {
        match self {
            Self::Exception(exc) => Some(exc),
            _ => None,
        }
    }

    /// Copy out the items of a list or tuple.
    #[must_use]
    pub fn to_vec(&self) -> Option<Vec<Value>> {
        match self {
            Self::Tuple(items) => Some(items.to_vec()),
            Self::List(items) => Some(items.borrow().clone()),
            _ => None,
        }
    }

    /// Python truthiness evaluation.
    ///
    /// Returns false for: None, False, 0, 0.0, empty strings and containers.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Tuple(items) => !items.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Exception(_)
            | Self::ExceptionType(_)
            | Self::Iterator(_)
            | Self::ContextManager(_) => true,
        }
    }

    /// Python identity (`is`).
    #[must_use]
    pub fn is(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => Arc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Exception(a), Self::Exception(b)) => Rc::ptr_eq(a, b),
            (Self::ExceptionType(a), Self::ExceptionType(b)) => a.is(b),
            (Self::Iterator(a), Self::Iterator(b)) => Rc::ptr_eq(a, b),
            (Self::ContextManager(a), Self::ContextManager(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    // =========================================================================
    // Type Name
    // =========================================================================

    /// Get the Python type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Tuple(_) => "tuple",
            Self::List(_) => "list",
            Self::Exception(exc) => exc.type_name(),
            Self::ExceptionType(_) => "type",
            Self::Iterator(iter) => iter.type_name(),
            Self::ContextManager(manager) => manager.type_name(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(i), Self::Float(f)) | (Self::Float(f), Self::Int(i)) => (*i as f64) == *f,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Bool(a), Self::Int(b)) | (Self::Int(b), Self::Bool(a)) => i64::from(*a) == *b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            _ => self.is(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "Value({s:?})"),
            Self::Exception(exc) => write!(f, "Value({exc:?})"),
            _ => write!(f, "Value({self})"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(fl) => {
                if fl.fract() == 0.0 && fl.is_finite() {
                    write!(f, "{fl:.1}")
                } else {
                    write!(f, "{fl}")
                }
            }
            Self::Str(s) => write!(f, "'{s}'"),
            Self::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Exception(exc) => write!(f, "{}", exc.format()),
            Self::ExceptionType(ty) => write!(f, "<class '{}'>", ty.name()),
            Self::Iterator(iter) => write!(f, "<{} object>", iter.type_name()),
            Self::ContextManager(manager) => write!(f, "<{} object>", manager.type_name()),
        }
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    #[inline]
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    #[inline]
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(s: &str) -> Self {
        Self::Str(s.into())
    }
}

impl From<ExceptionRef> for Value {
    #[inline]
    fn from(exc: ExceptionRef) -> Self {
        Self::Exception(exc)
    }
}

impl From<ExceptionType> for Value {
    #[inline]
    fn from(ty: ExceptionType) -> Self {
        Self::ExceptionType(ty)
    }
}
