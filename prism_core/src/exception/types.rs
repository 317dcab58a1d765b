//! Exception type identifiers and exception classes.
//!
//! Builtin exception types are identified by a packed `u8` (`ExceptionTypeId`)
//! whose `parent()` table mirrors Python's builtin hierarchy. User-defined
//! exception classes (`ExceptionClass`) may have several bases, so an instance
//! can match more than one unrelated `except` clause; clauses are then tested
//! in source order.

use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Builtin exception type identifier.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExceptionTypeId {
    // ═══════════════════════════════════════════════════════════════════════
    // Hierarchy roots
    // ═══════════════════════════════════════════════════════════════════════
    /// Root of all exceptions.
    BaseException = 0,
    /// Request to exit the interpreter.
    SystemExit = 1,
    /// Raised when the user interrupts execution.
    KeyboardInterrupt = 2,
    /// Request that a generator exit.
    GeneratorExit = 3,
    /// Base class for all non-exiting exceptions.
    Exception = 4,

    // ═══════════════════════════════════════════════════════════════════════
    // Iteration
    // ═══════════════════════════════════════════════════════════════════════
    /// Iterator has no more items.
    StopIteration = 5,

    // ═══════════════════════════════════════════════════════════════════════
    // Common runtime errors
    // ═══════════════════════════════════════════════════════════════════════
    /// Base class for arithmetic errors.
    ArithmeticError = 6,
    /// Numeric overflow.
    OverflowError = 7,
    /// Division by zero.
    ZeroDivisionError = 8,
    /// Assertion failed.
    AssertionError = 9,
    /// Attribute not found.
    AttributeError = 10,
    /// Base class for lookup errors.
    LookupError = 11,
    /// Sequence index out of range.
    IndexError = 12,
    /// Mapping key not found.
    KeyError = 13,
    /// Name not found in local or global scope.
    NameError = 14,
    /// Local variable referenced before assignment.
    UnboundLocalError = 15,
    /// Base class for OS errors.
    OSError = 16,
    /// Unhandled error in the interpreter.
    RuntimeError = 17,
    /// Maximum recursion depth exceeded.
    RecursionError = 18,
    /// Method not implemented.
    NotImplementedError = 19,
    /// Inappropriate argument type.
    TypeError = 20,
    /// Inappropriate argument value.
    ValueError = 21,
}

impl ExceptionTypeId {
    /// Total number of builtin exception types.
    pub const COUNT: usize = 22;

    /// Returns the numeric ID of this exception type.
    #[inline(always)]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns the Python name of this exception type.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BaseException => "BaseException",
            Self::SystemExit => "SystemExit",
            Self::KeyboardInterrupt => "KeyboardInterrupt",
            Self::GeneratorExit => "GeneratorExit",
            Self::Exception => "Exception",
            Self::StopIteration => "StopIteration",
            Self::ArithmeticError => "ArithmeticError",
            Self::OverflowError => "OverflowError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::AssertionError => "AssertionError",
            Self::AttributeError => "AttributeError",
            Self::LookupError => "LookupError",
            Self::IndexError => "IndexError",
            Self::KeyError => "KeyError",
            Self::NameError => "NameError",
            Self::UnboundLocalError => "UnboundLocalError",
            Self::OSError => "OSError",
            Self::RuntimeError => "RuntimeError",
            Self::RecursionError => "RecursionError",
            Self::NotImplementedError => "NotImplementedError",
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
        }
    }

    /// Returns the parent type in the exception hierarchy.
    #[inline]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::BaseException => None,

            Self::SystemExit
            | Self::KeyboardInterrupt
            | Self::GeneratorExit
            | Self::Exception => Some(Self::BaseException),

            Self::OverflowError | Self::ZeroDivisionError => Some(Self::ArithmeticError),
            Self::IndexError | Self::KeyError => Some(Self::LookupError),
            Self::UnboundLocalError => Some(Self::NameError),
            Self::RecursionError | Self::NotImplementedError => Some(Self::RuntimeError),

            Self::StopIteration
            | Self::ArithmeticError
            | Self::AssertionError
            | Self::AttributeError
            | Self::LookupError
            | Self::NameError
            | Self::OSError
            | Self::RuntimeError
            | Self::TypeError
            | Self::ValueError => Some(Self::Exception),
        }
    }

    /// Checks if this exception type is a subclass of another.
    ///
    /// Walks up the hierarchy; the builtin tree is at most three levels deep.
    #[inline]
    pub fn is_subclass_of(self, base: Self) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty == base {
                return true;
            }
            current = ty.parent();
        }
        false
    }

    /// Returns true for the exceptions that terminate a generator rather than report an error.
    #[inline]
    pub const fn is_termination(self) -> bool {
        matches!(self, Self::GeneratorExit)
    }
}

impl fmt::Display for ExceptionTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Exception Classes
// ============================================================================

/// A user-defined exception class.
#[derive(Debug)]
pub struct ExceptionClass {
    name: Arc<str>,
    bases: SmallVec<[ExceptionType; 2]>,
}

impl ExceptionClass {
    /// Returns the class name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the direct bases in declaration order.
    #[inline]
    pub fn bases(&self) -> &[ExceptionType] {
        &self.bases
    }
}

/// An exception type: either a builtin or a user-defined class.
#[derive(Debug, Clone)]
pub enum ExceptionType {
    /// One of the builtin exception types.
    Builtin(ExceptionTypeId),
    /// A user-defined class with one or more bases.
    User(Rc<ExceptionClass>),
}

impl ExceptionType {
    /// Defines a new exception class deriving from `bases`.
    ///
    /// An empty base list derives from `Exception`, as a bare
    /// `class E(Exception)` would.
    pub fn define(name: impl Into<Arc<str>>, bases: impl IntoIterator<Item = ExceptionType>) -> Self {
        let mut bases: SmallVec<[ExceptionType; 2]> = bases.into_iter().collect();
        if bases.is_empty() {
            bases.push(Self::Builtin(ExceptionTypeId::Exception));
        }
        Self::User(Rc::new(ExceptionClass {
            name: name.into(),
            bases,
        }))
    }

    /// Returns the class name.
    #[inline]
    pub fn name(&self) -> &str {
        match self {
            Self::Builtin(id) => id.name(),
            Self::User(class) => class.name(),
        }
    }

    /// Returns the builtin identifier, if this is a builtin type.
    #[inline]
    pub fn builtin_id(&self) -> Option<ExceptionTypeId> {
        match self {
            Self::Builtin(id) => Some(*id),
            Self::User(_) => None,
        }
    }

    /// Identity comparison of exception types.
    #[inline]
    pub fn is(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::User(a), Self::User(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Returns true if this class or any of its ancestors terminates a generator.
    pub fn is_termination(&self) -> bool {
        match self {
            Self::Builtin(id) => {
                let mut current = Some(*id);
                while let Some(ty) = current {
                    if ty.is_termination() {
                        return true;
                    }
                    current = ty.parent();
                }
                false
            }
            Self::User(class) => class.bases.iter().any(Self::is_termination),
        }
    }

    /// Returns true if `self` is `base` or derives from it (through any base).
    pub fn is_subclass_of(&self, base: &Self) -> bool {
        match self {
            Self::Builtin(id) => match base {
                Self::Builtin(base_id) => id.is_subclass_of(*base_id),
                Self::User(_) => false,
            },
            Self::User(class) => {
                self.is(base) || class.bases.iter().any(|parent| parent.is_subclass_of(base))
            }
        }
    }
}

impl From<ExceptionTypeId> for ExceptionType {
    #[inline]
    fn from(id: ExceptionTypeId) -> Self {
        Self::Builtin(id)
    }
}

impl fmt::Display for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
