//! `raise`, `raise X`, `raise X from Y`.

use super::{ExprNode, Resumable, Statement};
use crate::context::ExecContext;
use crate::control::ControlData;
use crate::signal::{ExecResult, Unwind};
use prism_core::exception::FrameInfo;
use prism_core::{ExceptionObject, ExceptionRef, PrismError, Value};
use std::rc::Rc;
use std::sync::Arc;

/// Raise statement.
///
/// A fresh raise records its frame in the traceback and links
/// `__context__` to the exception being handled, if any. A bare `raise`
/// re-raises the handled exception as-is, keeping its original traceback.
pub struct Raise {
    exc: Option<ExprNode>,
    cause: Option<ExprNode>,
    line: u32,
}

impl Raise {
    /// Creates a raise statement. `exc == None` is a bare `raise`.
    pub fn new(exc: Option<ExprNode>, cause: Option<ExprNode>, line: u32) -> Self {
        Self { exc, cause, line }
    }
}

/// Turns a raised value into an exception instance.
fn instantiate(value: Value, what: &str) -> ExecResult<ExceptionRef> {
    match value {
        Value::Exception(exc) => Ok(exc),
        Value::ExceptionType(ty) => Ok(ExceptionObject::new(ty, "")),
        other => Err(PrismError::type_error(format!(
            "{what} must derive from BaseException, not '{}'",
            other.type_name()
        ))
        .into()),
    }
}

impl Statement for Raise {
    fn execute(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        let Some(exc_expr) = &self.exc else {
            return match ctx.current_handled() {
                Some(exc) => Err(Unwind::Exception(Rc::clone(exc))),
                None => Err(PrismError::runtime_error("No active exception to reraise").into()),
            };
        };

        let exc = instantiate(exc_expr.evaluate(ctx)?, "exceptions")?;
        if let Some(cause_expr) = &self.cause {
            let cause = match cause_expr.evaluate(ctx)? {
                Value::None => None,
                value => Some(instantiate(value, "exception causes")?),
            };
            exc.set_cause(cause);
        }
        if let Some(handled) = ctx.current_handled() {
            exc.chain_context(handled);
        }
        exc.push_frame(FrameInfo::new(Arc::clone(ctx.name()), self.line));
        Err(Unwind::Exception(exc))
    }
}

impl Resumable for Raise {
    fn reset(&self, control: &mut ControlData) {
        if let Some(exc) = &self.exc {
            exc.reset(control);
        }
        if let Some(cause) = &self.cause {
            cause.reset(control);
        }
    }

    fn can_suspend(&self) -> bool {
        self.exc.as_ref().is_some_and(|e| e.can_suspend())
            || self.cause.as_ref().is_some_and(|c| c.can_suspend())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::nodes::Const;
    use prism_core::{ExceptionType, ExceptionTypeId};

    fn context() -> ExecContext {
        ExecContext::new(
            Arc::from("producer"),
            Frame::new(Rc::from(Vec::<Arc<str>>::new())),
            ControlData::new(8),
        )
    }

    fn constant(value: Value) -> Option<ExprNode> {
        Some(Box::new(Const(value)))
    }

    fn raised(result: ExecResult<()>) -> ExceptionRef {
        match result {
            Err(Unwind::Exception(exc)) => exc,
            other => panic!("expected exception, got {other:?}"),
        }
    }

    #[test]
    fn test_raise_class_instantiates_and_records_frame() {
        let mut ctx = context();
        let ty: ExceptionType = ExceptionTypeId::ValueError.into();
        let exc = raised(Raise::new(constant(ty.into()), None, 12).execute(&mut ctx));
        assert!(exc.is_builtin(ExceptionTypeId::ValueError));
        let tb = exc.traceback();
        let frame = tb.innermost().unwrap();
        assert_eq!(&*frame.func_name, "producer");
        assert_eq!(frame.line, 12);
    }

    #[test]
    fn test_raise_from_sets_cause() {
        let mut ctx = context();
        let cause = ExceptionObject::builtin(ExceptionTypeId::OSError, "disk");
        let exc = raised(
            Raise::new(
                constant(Value::ExceptionType(ExceptionTypeId::RuntimeError.into())),
                constant(Value::Exception(cause.clone())),
                1,
            )
            .execute(&mut ctx),
        );
        assert!(Rc::ptr_eq(&exc.cause().unwrap(), &cause));
        assert!(exc.suppress_context());
    }

    #[test]
    fn test_raise_from_none_suppresses_context() {
        let mut ctx = context();
        ctx.push_handled(ExceptionObject::builtin(ExceptionTypeId::KeyError, "k"));
        let exc = raised(
            Raise::new(
                constant(Value::ExceptionType(ExceptionTypeId::ValueError.into())),
                constant(Value::none()),
                1,
            )
            .execute(&mut ctx),
        );
        assert!(exc.cause().is_none());
        assert!(exc.suppress_context());
        assert!(exc.context().is_some());
    }

    #[test]
    fn test_bare_raise_keeps_traceback() {
        let mut ctx = context();
        let handled = ExceptionObject::builtin(ExceptionTypeId::KeyError, "k");
        handled.push_frame(FrameInfo::new("origin", 3));
        ctx.push_handled(handled.clone());
        let exc = raised(Raise::new(None, None, 9).execute(&mut ctx));
        assert!(Rc::ptr_eq(&exc, &handled));
        assert_eq!(exc.traceback().len(), 1);
    }

    #[test]
    fn test_bare_raise_without_active_exception() {
        let mut ctx = context();
        let exc = raised(Raise::new(None, None, 1).execute(&mut ctx));
        assert!(exc.is_builtin(ExceptionTypeId::RuntimeError));
        assert_eq!(exc.message(), "No active exception to reraise");
    }

    #[test]
    fn test_raise_non_exception_is_type_error() {
        let mut ctx = context();
        let exc = raised(Raise::new(constant(Value::int(3)), None, 1).execute(&mut ctx));
        assert_eq!(
            exc.format(),
            "TypeError: exceptions must derive from BaseException, not 'int'"
        );
    }
}
