//! Resumable `try` / `except` / `else`.
//!
//! # Control Data
//!
//! | Slot            | Meaning                                              |
//! |-----------------|------------------------------------------------------|
//! | `handler_flag`  | suspended inside an except clause                    |
//! | `else_flag`     | suspended inside the else clause                     |
//! | `handler_index` | 1-based index of the matched clause (0 = unresolved) |
//! | `exception`     | the exception the matched clause is handling         |
//!
//! Clauses are tested in source order and the first match wins, so an
//! exception that is an instance of several listed classes always runs the
//! earliest clause.

use super::{Resumable, Statement, StmtNode};
use crate::context::ExecContext;
use crate::control::{ControlData, ExceptionSlot, FlagSlot, IndexSlot};
use crate::frame::LocalSlot;
use crate::signal::{ExecResult, Unwind};
use prism_core::{ExceptionRef, ExceptionType, Value};
use smallvec::SmallVec;
use std::rc::Rc;

/// One `except` clause.
pub struct ExceptClause {
    types: SmallVec<[ExceptionType; 2]>,
    name: Option<LocalSlot>,
    body: StmtNode,
}

impl ExceptClause {
    /// `except (types...) [as name]: body`. An empty type list is a bare `except:`.
    pub fn new(
        types: impl IntoIterator<Item = ExceptionType>,
        name: Option<LocalSlot>,
        body: StmtNode,
    ) -> Self {
        Self {
            types: types.into_iter().collect(),
            name,
            body,
        }
    }

    /// Returns true if this clause handles `exc`.
    #[inline]
    pub fn matches(&self, exc: &ExceptionRef) -> bool {
        self.types.is_empty() || exc.matches_any(&self.types)
    }
}

/// `try: body except ...: handler [else: orelse]`.
pub struct GeneratorTryExcept {
    body: StmtNode,
    handlers: Vec<ExceptClause>,
    orelse: Option<StmtNode>,
    handler_flag: FlagSlot,
    else_flag: FlagSlot,
    handler_index: IndexSlot,
    exception: ExceptionSlot,
}

impl GeneratorTryExcept {
    /// Creates a resumable try/except.
    pub fn new(
        body: StmtNode,
        handlers: Vec<ExceptClause>,
        orelse: Option<StmtNode>,
        handler_flag: FlagSlot,
        else_flag: FlagSlot,
        handler_index: IndexSlot,
        exception: ExceptionSlot,
    ) -> Self {
        Self {
            body,
            handlers,
            orelse,
            handler_flag,
            else_flag,
            handler_index,
            exception,
        }
    }

    fn run_else(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        let Some(orelse) = &self.orelse else {
            return Ok(());
        };
        let result = orelse.execute(ctx);
        match &result {
            Err(unwind) if unwind.is_suspend() => ctx.control.set_flag(self.else_flag, true),
            _ => ctx.control.clear_flag(self.else_flag),
        }
        result
    }

    /// Resumes the handler recorded before the last suspension.
    fn resume_handler(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        let index = ctx.control.index(self.handler_index);
        let exc = ctx
            .control
            .active_exception(self.exception)
            .and_then(Unwind::exception)
            .cloned();
        match (index.checked_sub(1), exc) {
            (Some(clause), Some(exc)) if clause < self.handlers.len() => {
                self.run_handler(ctx, clause, exc)
            }
            _ => {
                self.clear_handler_state(&mut ctx.control);
                Err(Unwind::Fatal(prism_core::PrismError::internal(
                    "except handler resumed without an active exception",
                )))
            }
        }
    }

    fn run_handler(&self, ctx: &mut ExecContext, clause: usize, exc: ExceptionRef) -> ExecResult<()> {
        let handler = &self.handlers[clause];
        ctx.push_handled(Rc::clone(&exc));
        let result = handler.body.execute(ctx);
        ctx.pop_handled();

        if let Err(Unwind::Suspend(value)) = result {
            return Err(Unwind::Suspend(value));
        }

        self.clear_handler_state(&mut ctx.control);
        if let Some(name) = handler.name {
            ctx.frame.delete(name);
        }
        if let Err(Unwind::Exception(raised)) = &result {
            raised.chain_context_if_unset(&exc);
        }
        result
    }

    fn clear_handler_state(&self, control: &mut ControlData) {
        control.clear_flag(self.handler_flag);
        if control.index(self.handler_index) != 0 {
            control.set_index(self.handler_index, 0);
        }
        control.take_active_exception(self.exception);
    }
}

impl Statement for GeneratorTryExcept {
    fn execute(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        if ctx.control.is_set(self.handler_flag) {
            return self.resume_handler(ctx);
        }
        if ctx.control.is_set(self.else_flag) {
            return self.run_else(ctx);
        }

        let exc = match self.body.execute(ctx) {
            Ok(()) => return self.run_else(ctx),
            Err(Unwind::Exception(exc)) => exc,
            Err(other) => return Err(other),
        };

        let Some(clause) = self.handlers.iter().position(|h| h.matches(&exc)) else {
            return Err(Unwind::Exception(exc));
        };
        ctx.control.set_index(self.handler_index, clause + 1);
        ctx.control
            .set_active_exception(self.exception, Some(Unwind::Exception(Rc::clone(&exc))));
        ctx.control.set_flag(self.handler_flag, true);
        if let Some(name) = self.handlers[clause].name {
            ctx.frame.store(name, Value::Exception(Rc::clone(&exc)));
        }
        self.run_handler(ctx, clause, exc)
    }
}

impl Resumable for GeneratorTryExcept {
    fn reset(&self, control: &mut ControlData) {
        self.clear_handler_state(control);
        control.clear_flag(self.else_flag);
        self.body.reset(control);
        for handler in &self.handlers {
            handler.body.reset(control);
        }
        if let Some(orelse) = &self.orelse {
            orelse.reset(control);
        }
    }

    fn can_suspend(&self) -> bool {
        self.body.can_suspend()
            || self.handlers.iter().any(|h| h.body.can_suspend())
            || self.orelse.as_ref().is_some_and(|s| s.can_suspend())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::nodes::{Assign, Const, ExprStmt, GeneratorBlock, Native, Raise, Target, Yield};
    use prism_core::{ExceptionObject, ExceptionTypeId, PrismError, PrismResult};
    use std::sync::Arc;

    const HIT: LocalSlot = LocalSlot::new(0);
    const ERR: LocalSlot = LocalSlot::new(1);

    fn context() -> ExecContext {
        let names: Rc<[Arc<str>]> = vec![Arc::from("hit"), Arc::from("e")].into();
        ExecContext::new(Arc::from("gen"), Frame::new(names), ControlData::new(32))
    }

    fn fail(exc: ExceptionRef) -> StmtNode {
        Box::new(ExprStmt(Box::new(Native(Box::new(
            move |_frame: &mut Frame| -> PrismResult<Value> {
                Err(PrismError::Exception(Rc::clone(&exc)))
            },
        )))))
    }

    fn mark(tag: i64) -> StmtNode {
        Box::new(Assign::new(Target::Local(HIT), Box::new(Const(Value::int(tag)))))
    }

    fn slots() -> (FlagSlot, FlagSlot, IndexSlot, ExceptionSlot) {
        (FlagSlot::new(0), FlagSlot::new(1), IndexSlot::new(0), ExceptionSlot::new(0))
    }

    fn try_except(
        body: StmtNode,
        handlers: Vec<ExceptClause>,
        orelse: Option<StmtNode>,
    ) -> GeneratorTryExcept {
        let (hf, ef, hi, ex) = slots();
        GeneratorTryExcept::new(body, handlers, orelse, hf, ef, hi, ex)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Matching
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_first_matching_clause_wins() {
        let a = ExceptionType::define("A", []);
        let b = ExceptionType::define("B", []);
        let both = ExceptionType::define("AB", [a.clone(), b.clone()]);
        let mut ctx = context();
        let stmt = try_except(
            fail(ExceptionObject::new(both, "x")),
            vec![
                ExceptClause::new([b], None, mark(2)),
                ExceptClause::new([a], None, mark(1)),
            ],
            None,
        );
        stmt.execute(&mut ctx).unwrap();
        assert_eq!(ctx.frame.get(HIT), Some(&Value::int(2)));
    }

    #[test]
    fn test_unmatched_exception_propagates_unchanged() {
        let exc = ExceptionObject::builtin(ExceptionTypeId::KeyError, "k");
        let mut ctx = context();
        let stmt = try_except(
            fail(exc.clone()),
            vec![ExceptClause::new(
                [ExceptionTypeId::ValueError.into()],
                None,
                mark(1),
            )],
            None,
        );
        let err = stmt.execute(&mut ctx).unwrap_err();
        assert!(Rc::ptr_eq(err.exception().unwrap(), &exc));
        assert!(exc.context().is_none());
    }

    #[test]
    fn test_bare_except_and_as_name() {
        let mut ctx = context();
        let capture = Native(Box::new(|frame: &mut Frame| -> PrismResult<Value> {
            Ok(frame.get(ERR).cloned().unwrap_or_default())
        }));
        let stmt = try_except(
            fail(ExceptionObject::generator_exit()),
            vec![ExceptClause::new(
                [],
                Some(ERR),
                Box::new(Assign::new(Target::Local(HIT), Box::new(capture))),
            )],
            None,
        );
        stmt.execute(&mut ctx).unwrap();
        let hit = ctx.frame.get(HIT).and_then(Value::as_exception).cloned();
        assert!(hit.unwrap().is_builtin(ExceptionTypeId::GeneratorExit));
        // The `as` name is unbound when the handler ends.
        assert!(ctx.frame.get(ERR).is_none());
    }

    #[test]
    fn test_else_runs_only_without_exception() {
        let mut ctx = context();
        let stmt = try_except(
            mark(1),
            vec![ExceptClause::new([], None, mark(2))],
            Some(mark(3)),
        );
        stmt.execute(&mut ctx).unwrap();
        assert_eq!(ctx.frame.get(HIT), Some(&Value::int(3)));
    }

    // ════════════════════════════════════════════════════════════════════════
    // Suspension
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_handler_resumes_without_rematching() {
        let mut ctx = context();
        let handler = GeneratorBlock::new(
            vec![
                Box::new(ExprStmt(Box::new(Yield::new(None, FlagSlot::new(5), 0)))),
                mark(7),
            ],
            IndexSlot::new(1),
        );
        let stmt = try_except(
            fail(ExceptionObject::builtin(ExceptionTypeId::ValueError, "v")),
            vec![ExceptClause::new([ExceptionTypeId::ValueError.into()], None, Box::new(handler))],
            None,
        );
        assert!(matches!(stmt.execute(&mut ctx), Err(Unwind::Suspend(_))));
        assert_eq!(ctx.control.index(IndexSlot::new(0)), 1);
        assert!(ctx.control.active_exception(ExceptionSlot::new(0)).is_some());
        assert_eq!(ctx.handled_depth(), 0);

        stmt.execute(&mut ctx).unwrap();
        assert_eq!(ctx.frame.get(HIT), Some(&Value::int(7)));
        assert!(!ctx.control.is_set(FlagSlot::new(0)));
        assert_eq!(ctx.control.index(IndexSlot::new(0)), 0);
        assert!(ctx.control.active_exception(ExceptionSlot::new(0)).is_none());
    }

    #[test]
    fn test_chaining_survives_suspension_in_handler() {
        let mut ctx = context();
        let original = ExceptionObject::builtin(ExceptionTypeId::KeyError, "original");
        let handler = GeneratorBlock::new(
            vec![
                Box::new(ExprStmt(Box::new(Yield::new(None, FlagSlot::new(5), 0)))),
                Box::new(Raise::new(
                    Some(Box::new(Const(Value::ExceptionType(
                        ExceptionTypeId::ValueError.into(),
                    )))),
                    None,
                    3,
                )),
            ],
            IndexSlot::new(1),
        );
        let stmt = try_except(
            fail(original.clone()),
            vec![ExceptClause::new([], None, Box::new(handler))],
            None,
        );
        assert!(stmt.execute(&mut ctx).is_err());
        let err = stmt.execute(&mut ctx).unwrap_err();
        let raised = err.exception().unwrap();
        assert!(raised.is_builtin(ExceptionTypeId::ValueError));
        assert!(Rc::ptr_eq(&raised.context().unwrap(), &original));
    }

    #[test]
    fn test_fatal_is_never_caught() {
        let mut ctx = context();
        let fatal = ExprStmt(Box::new(Native(Box::new(
            |_frame: &mut Frame| -> PrismResult<Value> { Err(PrismError::GeneratorRunning) },
        ))));
        let stmt = try_except(
            Box::new(fatal),
            vec![ExceptClause::new([], None, mark(1))],
            None,
        );
        assert!(matches!(
            stmt.execute(&mut ctx),
            Err(Unwind::Fatal(PrismError::GeneratorRunning))
        ));
        assert!(ctx.frame.get(HIT).is_none());
    }
}
