//! Expressions whose operands are computed by statements.
//!
//! `f(a(), (yield x))` must not call `a()` again when the generator resumes
//! at the yield. The builder hoists such operands into temporaries assigned
//! by a resumable prelude; the result expression then only reads them.

use super::{ExprNode, Expression, Resumable, StmtNode};
use crate::context::ExecContext;
use crate::control::{ControlData, FlagSlot};
use crate::signal::{ExecResult, Unwind};
use prism_core::Value;

/// Runs `prelude` once, then evaluates `result`.
pub struct ExpressionWithSideEffects {
    prelude: StmtNode,
    result: ExprNode,
    done: FlagSlot,
}

impl ExpressionWithSideEffects {
    /// Creates the expression. `done` records that the prelude finished.
    pub fn new(prelude: StmtNode, result: ExprNode, done: FlagSlot) -> Self {
        Self {
            prelude,
            result,
            done,
        }
    }
}

impl Expression for ExpressionWithSideEffects {
    fn evaluate(&self, ctx: &mut ExecContext) -> ExecResult<Value> {
        if !ctx.control.is_set(self.done) {
            if let Err(unwind) = self.prelude.execute(ctx) {
                if !unwind.is_suspend() {
                    self.prelude.reset(&mut ctx.control);
                }
                return Err(unwind);
            }
            ctx.control.set_flag(self.done, true);
        }

        match self.result.evaluate(ctx) {
            Err(Unwind::Suspend(value)) => Err(Unwind::Suspend(value)),
            result => {
                ctx.control.clear_flag(self.done);
                self.result.reset(&mut ctx.control);
                result
            }
        }
    }
}

impl Resumable for ExpressionWithSideEffects {
    fn reset(&self, control: &mut ControlData) {
        control.clear_flag(self.done);
        self.prelude.reset(control);
        self.result.reset(control);
    }

    fn can_suspend(&self) -> bool {
        self.prelude.can_suspend() || self.result.can_suspend()
    }
}
