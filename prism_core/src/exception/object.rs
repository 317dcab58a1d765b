//! Exception object representation.
//!
//! Exceptions are shared (`Rc`) because the same instance is referenced from
//! the raise site, from `__context__`/`__cause__` links of later exceptions
//! and from a suspended generator's control data while its handler is
//! paused. The chaining links are therefore interior-mutable.

use super::traceback::{FrameInfo, Traceback};
use super::types::{ExceptionType, ExceptionTypeId};
use crate::value::Value;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Reference to an exception object.
///
/// This is the handle used for raising and for exception chaining.
pub type ExceptionRef = Rc<ExceptionObject>;

/// Python exception instance.
pub struct ExceptionObject {
    class: ExceptionType,
    message: Arc<str>,
    /// Extra payload, e.g. the return value carried by `StopIteration`.
    payload: Option<Value>,

    // ═══════════════════════════════════════════════════════════════════════
    // Exception Chaining (PEP 3134)
    // ═══════════════════════════════════════════════════════════════════════
    /// Explicit cause (`raise X from Y`).
    cause: RefCell<Option<ExceptionRef>>,
    /// Implicit context (exception that was being handled).
    context: RefCell<Option<ExceptionRef>>,
    suppress_context: Cell<bool>,

    traceback: RefCell<Traceback>,
}

impl ExceptionObject {
    // ════════════════════════════════════════════════════════════════════════
    // Constructors
    // ════════════════════════════════════════════════════════════════════════

    /// Creates a new exception instance of `class`.
    pub fn new(class: impl Into<ExceptionType>, message: impl Into<Arc<str>>) -> ExceptionRef {
        Rc::new(Self {
            class: class.into(),
            message: message.into(),
            payload: None,
            cause: RefCell::new(None),
            context: RefCell::new(None),
            suppress_context: Cell::new(false),
            traceback: RefCell::new(Traceback::empty()),
        })
    }

    /// Creates a builtin exception with a message.
    #[inline]
    pub fn builtin(type_id: ExceptionTypeId, message: impl Into<Arc<str>>) -> ExceptionRef {
        Self::new(type_id, message)
    }

    /// Creates an exception carrying a payload value.
    pub fn with_payload(
        class: impl Into<ExceptionType>,
        message: impl Into<Arc<str>>,
        payload: Value,
    ) -> ExceptionRef {
        Rc::new(Self {
            class: class.into(),
            message: message.into(),
            payload: Some(payload),
            cause: RefCell::new(None),
            context: RefCell::new(None),
            suppress_context: Cell::new(false),
            traceback: RefCell::new(Traceback::empty()),
        })
    }

    /// Creates a `StopIteration` carrying an iterator's final value.
    #[inline]
    pub fn stop_iteration(value: Value) -> ExceptionRef {
        Self::with_payload(ExceptionTypeId::StopIteration, "", value)
    }

    /// Creates the `GeneratorExit` used by `close()`.
    #[inline]
    pub fn generator_exit() -> ExceptionRef {
        Self::builtin(ExceptionTypeId::GeneratorExit, "")
    }

    // ════════════════════════════════════════════════════════════════════════
    // Type Information
    // ════════════════════════════════════════════════════════════════════════

    /// Returns the exception class.
    #[inline]
    pub fn class(&self) -> &ExceptionType {
        &self.class
    }

    /// Returns the exception type name.
    #[inline]
    pub fn type_name(&self) -> &str {
        self.class.name()
    }

    /// Returns the exception message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the payload, if any.
    #[inline]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Returns `StopIteration.value`, `None` when no payload was attached.
    #[inline]
    pub fn stop_value(&self) -> Value {
        self.payload.clone().unwrap_or_default()
    }

    /// Returns true if this exception is an instance of `ty` (or a subclass).
    #[inline]
    pub fn is_instance(&self, ty: &ExceptionType) -> bool {
        self.class.is_subclass_of(ty)
    }

    /// Returns true if this exception is an instance of the builtin `type_id`.
    #[inline]
    pub fn is_builtin(&self, type_id: ExceptionTypeId) -> bool {
        self.is_instance(&ExceptionType::Builtin(type_id))
    }

    /// Returns true if this exception terminates a generator (`GeneratorExit`).
    #[inline]
    pub fn is_termination(&self) -> bool {
        self.class.is_termination()
    }

    /// Returns true if this exception matches any of `types`.
    #[inline]
    pub fn matches_any(&self, types: &[ExceptionType]) -> bool {
        types.iter().any(|ty| self.is_instance(ty))
    }

    // ════════════════════════════════════════════════════════════════════════
    // Exception Chaining (PEP 3134)
    // ════════════════════════════════════════════════════════════════════════

    /// Returns the explicit cause (`__cause__`).
    #[inline]
    pub fn cause(&self) -> Option<ExceptionRef> {
        self.cause.borrow().clone()
    }

    /// Sets the explicit cause (`raise X from Y`); also sets `__suppress_context__`.
    pub fn set_cause(self: &Rc<Self>, cause: Option<ExceptionRef>) {
        let cause = cause.filter(|c| !Rc::ptr_eq(c, self));
        *self.cause.borrow_mut() = cause;
        self.suppress_context.set(true);
    }

    /// Returns the implicit context (`__context__`).
    #[inline]
    pub fn context(&self) -> Option<ExceptionRef> {
        self.context.borrow().clone()
    }

    /// Returns `__suppress_context__`.
    #[inline]
    pub fn suppress_context(&self) -> bool {
        self.suppress_context.get()
    }

    /// Links `self.__context__` to the exception being handled.
    ///
    /// Does nothing when `handled` is `self`. If `self` already appears in
    /// the context chain of `handled`, that link is cut first so the chain
    /// never forms a cycle.
    pub fn chain_context(self: &Rc<Self>, handled: &ExceptionRef) {
        if Rc::ptr_eq(self, handled) {
            return;
        }
        let mut cursor = Rc::clone(handled);
        loop {
            let next = cursor.context();
            match next {
                Some(next) if Rc::ptr_eq(&next, self) => {
                    *cursor.context.borrow_mut() = None;
                    break;
                }
                Some(next) => cursor = next,
                None => break,
            }
        }
        *self.context.borrow_mut() = Some(Rc::clone(handled));
    }

    /// Like [`chain_context`](Self::chain_context) but keeps an existing context.
    pub fn chain_context_if_unset(self: &Rc<Self>, handled: &ExceptionRef) {
        if self.context.borrow().is_none() {
            self.chain_context(handled);
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Traceback
    // ════════════════════════════════════════════════════════════════════════

    /// Returns the traceback.
    #[inline]
    pub fn traceback(&self) -> Ref<'_, Traceback> {
        self.traceback.borrow()
    }

    /// Records the frame the exception is raised from.
    #[inline]
    pub fn push_frame(&self, frame: FrameInfo) {
        self.traceback.borrow_mut().push(frame);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Formatting
    // ════════════════════════════════════════════════════════════════════════

    /// Formats the exception as `Type: message` (or just `Type`).
    pub fn format(&self) -> String {
        if self.message.is_empty() {
            self.type_name().to_string()
        } else {
            format!("{}: {}", self.type_name(), self.message)
        }
    }
}

impl fmt::Debug for ExceptionObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionObject")
            .field("type", &self.type_name())
            .field("message", &self.message)
            .field("has_cause", &self.cause.borrow().is_some())
            .field("has_context", &self.context.borrow().is_some())
            .finish()
    }
}

impl fmt::Display for ExceptionObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}
