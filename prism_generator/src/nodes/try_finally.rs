//! Resumable `try` / `finally`.

use super::{Resumable, Statement, StmtNode};
use crate::context::ExecContext;
use crate::control::{ControlData, ExceptionSlot, FlagSlot};
use crate::signal::{ExecResult, Unwind};
use std::rc::Rc;

/// `try: body finally: finalbody`.
///
/// Whatever interrupted the body (an exception, `return`, `break`,
/// `continue`, a fatal error) is parked in the exception slot while the
/// finally-body runs, then re-raised. `finally_flag` marks "the body is
/// done, we are in the finally-body", so a suspension inside the
/// finally-body resumes there without touching the body again.
pub struct GeneratorTryFinally {
    body: StmtNode,
    finalbody: StmtNode,
    finally_flag: FlagSlot,
    pending: ExceptionSlot,
}

impl GeneratorTryFinally {
    /// Creates a resumable try/finally.
    pub fn new(
        body: StmtNode,
        finalbody: StmtNode,
        finally_flag: FlagSlot,
        pending: ExceptionSlot,
    ) -> Self {
        Self {
            body,
            finalbody,
            finally_flag,
            pending,
        }
    }
}

impl Statement for GeneratorTryFinally {
    fn execute(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        if !ctx.control.is_set(self.finally_flag) {
            let pending = match self.body.execute(ctx) {
                Ok(()) => None,
                Err(Unwind::Suspend(value)) => return Err(Unwind::Suspend(value)),
                Err(other) => Some(other),
            };
            ctx.control.set_flag(self.finally_flag, true);
            ctx.control.set_active_exception(self.pending, pending);
        }

        let original = ctx
            .control
            .active_exception(self.pending)
            .and_then(Unwind::exception)
            .cloned();
        if let Some(exc) = &original {
            ctx.push_handled(Rc::clone(exc));
        }
        let result = self.finalbody.execute(ctx);
        if original.is_some() {
            ctx.pop_handled();
        }

        if let Err(Unwind::Suspend(value)) = result {
            return Err(Unwind::Suspend(value));
        }

        ctx.control.clear_flag(self.finally_flag);
        let pending = ctx.control.take_active_exception(self.pending);
        match result {
            Ok(()) => pending.map_or(Ok(()), Err),
            Err(unwind) => {
                // The new exit supersedes the parked one.
                if let (Unwind::Exception(raised), Some(exc)) = (&unwind, &original) {
                    raised.chain_context_if_unset(exc);
                }
                Err(unwind)
            }
        }
    }
}

impl Resumable for GeneratorTryFinally {
    fn reset(&self, control: &mut ControlData) {
        control.clear_flag(self.finally_flag);
        control.take_active_exception(self.pending);
        self.body.reset(control);
        self.finalbody.reset(control);
    }

    fn can_suspend(&self) -> bool {
        self.body.can_suspend() || self.finalbody.can_suspend()
    }
}
