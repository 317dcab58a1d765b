//! Resumable `if`.

use super::{ExprNode, Resumable, Statement, StmtNode};
use crate::context::ExecContext;
use crate::control::{ControlData, FlagSlot};
use crate::signal::ExecResult;

/// An `if` whose branches contain suspend points.
///
/// Each branch has a flag marking "suspended inside this branch". When a
/// flag is set on entry the condition is not evaluated again; the recorded
/// branch is re-entered directly.
pub struct GeneratorIf {
    cond: ExprNode,
    then: StmtNode,
    orelse: Option<StmtNode>,
    then_flag: FlagSlot,
    else_flag: FlagSlot,
}

impl GeneratorIf {
    /// Creates a resumable if statement.
    pub fn new(
        cond: ExprNode,
        then: StmtNode,
        orelse: Option<StmtNode>,
        then_flag: FlagSlot,
        else_flag: FlagSlot,
    ) -> Self {
        Self {
            cond,
            then,
            orelse,
            then_flag,
            else_flag,
        }
    }

    fn run_branch(&self, ctx: &mut ExecContext, take_then: bool) -> ExecResult<()> {
        let (branch, flag) = match (take_then, &self.orelse) {
            (true, _) => (&self.then, self.then_flag),
            (false, Some(orelse)) => (orelse, self.else_flag),
            (false, None) => return Ok(()),
        };
        let result = branch.execute(ctx);
        match &result {
            Err(unwind) if unwind.is_suspend() => ctx.control.set_flag(flag, true),
            _ => ctx.control.clear_flag(flag),
        }
        result
    }
}

impl Statement for GeneratorIf {
    fn execute(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        let take_then = if ctx.control.is_set(self.then_flag) {
            true
        } else if ctx.control.is_set(self.else_flag) {
            false
        } else {
            self.cond.evaluate(ctx)?.is_truthy()
        };
        self.run_branch(ctx, take_then)
    }
}

impl Resumable for GeneratorIf {
    fn reset(&self, control: &mut ControlData) {
        control.clear_flag(self.then_flag);
        control.clear_flag(self.else_flag);
        self.cond.reset(control);
        self.then.reset(control);
        if let Some(orelse) = &self.orelse {
            orelse.reset(control);
        }
    }

    fn can_suspend(&self) -> bool {
        self.cond.can_suspend()
            || self.then.can_suspend()
            || self.orelse.as_ref().is_some_and(|s| s.can_suspend())
    }
}
