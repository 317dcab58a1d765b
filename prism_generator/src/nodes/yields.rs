//! Suspend points: `yield` and `yield from`.
//!
//! # Python Semantics
//!
//! ```python
//! def relay():
//!     received = yield 1          # Yield: suspend, then evaluate to the sent value
//!     result = yield from inner() # YieldFrom: forward next/send/throw/close
//!     return result
//! ```
//!
//! A yield point is "armed" while its flag is set: the body suspended there
//! and the next resume must land on it. The armed yield consumes the resume
//! payload the driver delivered.

use super::{ExprNode, Expression, Resumable};
use crate::context::{ExecContext, ResumePayload};
use crate::control::{ControlData, FlagSlot, IteratorSlot};
use crate::signal::{ExecResult, Unwind};
use prism_core::protocol::{IterProtocol, IterStep, get_iter, normalize_step};
use prism_core::{PrismError, PrismResult, Value};
use std::rc::Rc;
use tracing::trace;

// ============================================================================
// Yield
// ============================================================================

/// `yield` / `yield value`.
pub struct Yield {
    value: Option<ExprNode>,
    flag: FlagSlot,
    yield_index: u32,
}

impl Yield {
    /// Creates a yield point. `yield_index` identifies it in diagnostics.
    pub fn new(value: Option<ExprNode>, flag: FlagSlot, yield_index: u32) -> Self {
        Self {
            value,
            flag,
            yield_index,
        }
    }
}

impl Expression for Yield {
    fn evaluate(&self, ctx: &mut ExecContext) -> ExecResult<Value> {
        if ctx.control.is_set(self.flag) {
            ctx.control.clear_flag(self.flag);
            return match ctx.take_payload() {
                None | Some(ResumePayload::Next) => Ok(Value::none()),
                Some(ResumePayload::Send(value)) => Ok(value),
                Some(ResumePayload::Throw(exc)) => Err(Unwind::Exception(exc)),
            };
        }
        let value = match &self.value {
            Some(expr) => expr.evaluate(ctx)?,
            None => Value::none(),
        };
        ctx.control.set_flag(self.flag, true);
        ctx.control.set_last_yield_index(self.yield_index);
        Err(Unwind::Suspend(value))
    }
}

impl Resumable for Yield {
    fn reset(&self, control: &mut ControlData) {
        control.clear_flag(self.flag);
        if let Some(expr) = &self.value {
            expr.reset(control);
        }
    }

    #[inline]
    fn can_suspend(&self) -> bool {
        true
    }
}

// ============================================================================
// Yield From
// ============================================================================

/// `yield from source`.
///
/// The delegate lives in an iterator slot while the body is suspended
/// inside it. The slot is emptied on entry to every resume, so any exit
/// other than another suspension leaves it clear.
pub struct YieldFrom {
    source: ExprNode,
    delegate: IteratorSlot,
    yield_index: u32,
}

impl YieldFrom {
    /// Creates a delegation point.
    pub fn new(source: ExprNode, delegate: IteratorSlot, yield_index: u32) -> Self {
        Self {
            source,
            delegate,
            yield_index,
        }
    }

    /// Forwards the resume payload to a suspended delegate.
    fn forward(
        &self,
        iter: &Rc<dyn IterProtocol>,
        payload: Option<ResumePayload>,
    ) -> ExecResult<PrismResult<IterStep>> {
        Ok(match payload {
            None | Some(ResumePayload::Next) => iter.next_step(),
            Some(ResumePayload::Send(value)) if value.is_none() => iter.next_step(),
            Some(ResumePayload::Send(value)) => iter
                .send(value)
                .unwrap_or_else(|| Err(PrismError::attribute(iter.type_name(), "send"))),
            Some(ResumePayload::Throw(exc)) if exc.is_termination() => {
                trace!(delegate = iter.type_name(), "closing delegate");
                if let Some(Err(err)) = iter.close() {
                    return Err(err.into());
                }
                return Err(Unwind::Exception(exc));
            }
            Some(ResumePayload::Throw(exc)) => match iter.throw(Rc::clone(&exc)) {
                Some(result) => result,
                None => return Err(Unwind::Exception(exc)),
            },
        })
    }
}

impl Expression for YieldFrom {
    fn evaluate(&self, ctx: &mut ExecContext) -> ExecResult<Value> {
        let (iter, step) = match ctx.control.take_sub_iterator(self.delegate) {
            Some(iter) => {
                let payload = ctx.take_payload();
                let step = self.forward(&iter, payload)?;
                (iter, step)
            }
            None => {
                let source = self.source.evaluate(ctx)?;
                let iter = get_iter(&source)?;
                let step = iter.next_step();
                (iter, step)
            }
        };
        match normalize_step(step)? {
            IterStep::Yielded(value) => {
                ctx.control.set_iterator(self.delegate, Value::Iterator(iter));
                ctx.control.set_last_yield_index(self.yield_index);
                Err(Unwind::Suspend(value))
            }
            IterStep::Returned(value) => Ok(value),
        }
    }
}

impl Resumable for YieldFrom {
    fn reset(&self, control: &mut ControlData) {
        control.take_iterator(self.delegate);
        self.source.reset(control);
    }

    #[inline]
    fn can_suspend(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::nodes::Const;
    use prism_core::{ExceptionObject, ExceptionRef, ExceptionType, ExceptionTypeId};
    use std::cell::{Cell, RefCell};
    use std::sync::Arc;

    fn context() -> ExecContext {
        ExecContext::new(
            Arc::from("gen"),
            Frame::new(Rc::from(Vec::<Arc<str>>::new())),
            ControlData::new(16),
        )
    }

    fn suspended_value(result: ExecResult<Value>) -> Value {
        match result {
            Err(Unwind::Suspend(v)) => v,
            other => panic!("expected suspension, got {other:?}"),
        }
    }

    /// Iterator recording every protocol call it receives.
    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
        remaining: Cell<i64>,
        has_close: bool,
    }

    impl IterProtocol for Recorder {
        fn type_name(&self) -> &str {
            "recorder"
        }

        fn next_step(&self) -> PrismResult<IterStep> {
            self.calls.borrow_mut().push("next".into());
            let n = self.remaining.get();
            if n == 0 {
                return Ok(IterStep::Returned(Value::str("done")));
            }
            self.remaining.set(n - 1);
            Ok(IterStep::Yielded(Value::int(n)))
        }

        fn send(&self, value: Value) -> Option<PrismResult<IterStep>> {
            self.calls.borrow_mut().push(format!("send {value}"));
            Some(Ok(IterStep::Yielded(value)))
        }

        fn throw(&self, exc: ExceptionRef) -> Option<PrismResult<IterStep>> {
            self.calls.borrow_mut().push(format!("throw {}", exc.type_name()));
            Some(Err(PrismError::Exception(ExceptionObject::stop_iteration(
                Value::int(99),
            ))))
        }

        fn close(&self) -> Option<PrismResult<()>> {
            self.calls.borrow_mut().push("close".into());
            self.has_close.then_some(Ok(()))
        }
    }

    fn recorder(remaining: i64, has_close: bool) -> Rc<Recorder> {
        Rc::new(Recorder {
            remaining: Cell::new(remaining),
            has_close,
            ..Default::default()
        })
    }

    fn delegation(source: &Rc<Recorder>) -> YieldFrom {
        let iter: Rc<dyn IterProtocol> = source.clone();
        YieldFrom::new(
            Box::new(Const(Value::iterator(iter))),
            IteratorSlot::new(0),
            7,
        )
    }

    // ════════════════════════════════════════════════════════════════════════
    // Yield
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_yield_suspends_then_returns_sent_value() {
        let mut ctx = context();
        let node = Yield::new(Some(Box::new(Const(Value::int(1)))), FlagSlot::new(0), 4);
        assert_eq!(suspended_value(node.evaluate(&mut ctx)), Value::int(1));
        assert_eq!(ctx.control.last_yield_index(), 4);

        ctx.deliver(ResumePayload::Send(Value::str("hi")));
        assert_eq!(node.evaluate(&mut ctx).unwrap(), Value::str("hi"));
        assert!(!ctx.control.is_set(FlagSlot::new(0)));
    }

    #[test]
    fn test_yield_next_evaluates_to_none() {
        let mut ctx = context();
        let node = Yield::new(None, FlagSlot::new(0), 0);
        assert!(suspended_value(node.evaluate(&mut ctx)).is_none());
        ctx.deliver(ResumePayload::Next);
        assert!(node.evaluate(&mut ctx).unwrap().is_none());
    }

    #[test]
    fn test_yield_throw_raises_at_yield_point() {
        let mut ctx = context();
        let node = Yield::new(None, FlagSlot::new(0), 0);
        let _ = node.evaluate(&mut ctx);
        let exc = ExceptionObject::builtin(ExceptionTypeId::KeyError, "k");
        ctx.deliver(ResumePayload::Throw(exc.clone()));
        let err = node.evaluate(&mut ctx).unwrap_err();
        assert!(Rc::ptr_eq(err.exception().unwrap(), &exc));
    }

    // ════════════════════════════════════════════════════════════════════════
    // Yield From
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_yield_from_empty_does_not_suspend() {
        let mut ctx = context();
        let node = YieldFrom::new(Box::new(Const(Value::list([]))), IteratorSlot::new(0), 0);
        assert!(node.evaluate(&mut ctx).unwrap().is_none());
        assert!(ctx.control.iterator(IteratorSlot::new(0)).is_none());
    }

    #[test]
    fn test_yield_from_returns_delegate_payload() {
        let mut ctx = context();
        let source = recorder(2, true);
        let node = delegation(&source);
        assert_eq!(suspended_value(node.evaluate(&mut ctx)), Value::int(2));
        assert_eq!(suspended_value(node.evaluate(&mut ctx)), Value::int(1));
        assert_eq!(node.evaluate(&mut ctx).unwrap(), Value::str("done"));
        assert!(ctx.control.iterator(IteratorSlot::new(0)).is_none());
        assert_eq!(source.calls.borrow().len(), 3);
    }

    #[test]
    fn test_yield_from_forwards_send() {
        let mut ctx = context();
        let source = recorder(1, true);
        let node = delegation(&source);
        let _ = node.evaluate(&mut ctx);
        ctx.deliver(ResumePayload::Send(Value::int(5)));
        assert_eq!(suspended_value(node.evaluate(&mut ctx)), Value::int(5));
        ctx.deliver(ResumePayload::Send(Value::none()));
        let _ = node.evaluate(&mut ctx);
        assert_eq!(*source.calls.borrow(), ["next", "send 5", "next"]);
    }

    #[test]
    fn test_yield_from_throw_ending_delegation() {
        let mut ctx = context();
        let source = recorder(3, true);
        let node = delegation(&source);
        let _ = node.evaluate(&mut ctx);
        ctx.deliver(ResumePayload::Throw(ExceptionObject::builtin(
            ExceptionTypeId::ValueError,
            "v",
        )));
        assert_eq!(node.evaluate(&mut ctx).unwrap(), Value::int(99));
        assert_eq!(source.calls.borrow()[1], "throw ValueError");
    }

    #[test]
    fn test_yield_from_close_ignores_missing_close() {
        let mut ctx = context();
        let source = recorder(3, false);
        let node = delegation(&source);
        let _ = node.evaluate(&mut ctx);
        ctx.deliver(ResumePayload::Throw(ExceptionObject::generator_exit()));
        let err = node.evaluate(&mut ctx).unwrap_err();
        assert!(err.exception().unwrap().is_builtin(ExceptionTypeId::GeneratorExit));
        assert!(ctx.control.iterator(IteratorSlot::new(0)).is_none());
        assert_eq!(source.calls.borrow()[1], "close");
    }

    #[test]
    fn test_yield_from_closes_delegate_for_generator_exit_subclass() {
        let mut ctx = context();
        let source = recorder(3, true);
        let node = delegation(&source);
        let _ = node.evaluate(&mut ctx);
        let shutdown = ExceptionType::define(
            "Shutdown",
            [ExceptionType::from(ExceptionTypeId::GeneratorExit)],
        );
        let exc = ExceptionObject::new(shutdown, "");
        ctx.deliver(ResumePayload::Throw(exc.clone()));
        let err = node.evaluate(&mut ctx).unwrap_err();
        assert!(Rc::ptr_eq(err.exception().unwrap(), &exc));
        assert_eq!(*source.calls.borrow(), ["next", "close"]);
    }

    #[test]
    fn test_yield_from_send_without_send_method() {
        let mut ctx = context();
        let node = YieldFrom::new(
            Box::new(Const(Value::list([Value::int(1), Value::int(2)]))),
            IteratorSlot::new(0),
            0,
        );
        let _ = node.evaluate(&mut ctx);
        ctx.deliver(ResumePayload::Send(Value::int(1)));
        let err = node.evaluate(&mut ctx).unwrap_err();
        assert_eq!(
            err.exception().unwrap().format(),
            "AttributeError: 'list_iterator' object has no attribute 'send'"
        );
        assert!(ctx.control.iterator(IteratorSlot::new(0)).is_none());
    }

    #[test]
    fn test_yield_from_throw_without_throw_method_reraises() {
        let mut ctx = context();
        let node = YieldFrom::new(
            Box::new(Const(Value::list([Value::int(1)]))),
            IteratorSlot::new(0),
            0,
        );
        let _ = node.evaluate(&mut ctx);
        let exc = ExceptionObject::builtin(ExceptionTypeId::TypeError, "t");
        ctx.deliver(ResumePayload::Throw(exc.clone()));
        let err = node.evaluate(&mut ctx).unwrap_err();
        assert!(Rc::ptr_eq(err.exception().unwrap(), &exc));
    }
}
