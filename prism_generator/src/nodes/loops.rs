//! Resumable `for` and `while` loops.
//!
//! # State Machine
//!
//! ```text
//! not-started ──iter()──▶ iterating ──suspend in body──▶ suspended-mid-body
//!      │                    │    ▲                               │
//!      │ empty              │    └────────── resume ─────────────┘
//!      ▼                    ▼ exhausted / break
//!   finished ◀──────────────┘
//! ```
//!
//! A `for` loop stores its live iterator (not a position) while suspended,
//! because it iterates arbitrary iterator objects. A `while` loop stores a
//! flag meaning "suspended inside the body", which sends the resume straight
//! back into the body instead of re-testing the condition.
//!
//! `break` and `continue` arrive as [`Unwind::Break`] / [`Unwind::Continue`];
//! the loop resets the body's nested state before acting on them. The
//! `else` clause runs only when the loop ends without `break` and has its
//! own flag so it can suspend too.

use super::{ExprNode, Resumable, Statement, StmtNode, Target};
use crate::context::ExecContext;
use crate::control::{ControlData, FlagSlot, IteratorSlot};
use crate::signal::{ExecResult, Unwind};
use prism_core::Value;
use prism_core::protocol::{IterStep, get_iter, normalize_step};

/// How a loop body pass ended.
enum Flow {
    /// Run the next iteration.
    Next,
    /// Leave the loop without running `else`.
    Exit,
}

/// Maps the result of one body pass to what the loop does next.
fn after_body(
    body: &StmtNode,
    ctx: &mut ExecContext,
    result: ExecResult<()>,
) -> ExecResult<Flow> {
    match result {
        Ok(()) => Ok(Flow::Next),
        Err(Unwind::Continue) => {
            body.reset(&mut ctx.control);
            Ok(Flow::Next)
        }
        Err(Unwind::Break) => {
            body.reset(&mut ctx.control);
            Ok(Flow::Exit)
        }
        Err(other) => Err(other),
    }
}

/// Runs an `else` clause, recording a suspension inside it.
fn run_else(orelse: Option<&StmtNode>, flag: FlagSlot, ctx: &mut ExecContext) -> ExecResult<()> {
    let Some(orelse) = orelse else {
        return Ok(());
    };
    let result = orelse.execute(ctx);
    match &result {
        Err(unwind) if unwind.is_suspend() => ctx.control.set_flag(flag, true),
        _ => ctx.control.clear_flag(flag),
    }
    result
}

// ============================================================================
// For Loop
// ============================================================================

/// `for target in iterable: body [else: orelse]`.
pub struct GeneratorFor {
    target: Target,
    iterable: ExprNode,
    body: StmtNode,
    orelse: Option<StmtNode>,
    iterator: IteratorSlot,
    else_flag: FlagSlot,
}

impl GeneratorFor {
    /// Creates a resumable for loop.
    pub fn new(
        target: Target,
        iterable: ExprNode,
        body: StmtNode,
        orelse: Option<StmtNode>,
        iterator: IteratorSlot,
        else_flag: FlagSlot,
    ) -> Self {
        Self {
            target,
            iterable,
            body,
            orelse,
            iterator,
            else_flag,
        }
    }
}

impl Statement for GeneratorFor {
    fn execute(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        if ctx.control.is_set(self.else_flag) {
            return run_else(self.orelse.as_ref(), self.else_flag, ctx);
        }

        // A stored iterator means the body suspended: resume it before
        // fetching the next element, and never evaluate the iterable again.
        let (iter, mut in_body) = match ctx.control.take_sub_iterator(self.iterator) {
            Some(iter) => (iter, true),
            None => {
                let iterable = self.iterable.evaluate(ctx)?;
                (get_iter(&iterable)?, false)
            }
        };

        loop {
            if !in_body {
                match normalize_step(iter.next_step())? {
                    IterStep::Yielded(item) => self.target.bind(ctx, item)?,
                    IterStep::Returned(_) => break,
                }
            }
            in_body = false;

            let result = self.body.execute(ctx);
            if let Err(Unwind::Suspend(value)) = result {
                ctx.control.set_iterator(self.iterator, Value::Iterator(iter));
                return Err(Unwind::Suspend(value));
            }
            match after_body(&self.body, ctx, result)? {
                Flow::Next => {}
                Flow::Exit => return Ok(()),
            }
        }

        run_else(self.orelse.as_ref(), self.else_flag, ctx)
    }
}

impl Resumable for GeneratorFor {
    fn reset(&self, control: &mut ControlData) {
        control.take_iterator(self.iterator);
        control.clear_flag(self.else_flag);
        self.iterable.reset(control);
        self.body.reset(control);
        if let Some(orelse) = &self.orelse {
            orelse.reset(control);
        }
    }

    fn can_suspend(&self) -> bool {
        self.iterable.can_suspend()
            || self.body.can_suspend()
            || self.orelse.as_ref().is_some_and(|s| s.can_suspend())
    }
}

// ============================================================================
// While Loop
// ============================================================================

/// `while cond: body [else: orelse]`.
pub struct GeneratorWhile {
    cond: ExprNode,
    body: StmtNode,
    orelse: Option<StmtNode>,
    body_flag: FlagSlot,
    else_flag: FlagSlot,
}

impl GeneratorWhile {
    /// Creates a resumable while loop.
    pub fn new(
        cond: ExprNode,
        body: StmtNode,
        orelse: Option<StmtNode>,
        body_flag: FlagSlot,
        else_flag: FlagSlot,
    ) -> Self {
        Self {
            cond,
            body,
            orelse,
            body_flag,
            else_flag,
        }
    }
}

impl Statement for GeneratorWhile {
    fn execute(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        if ctx.control.is_set(self.else_flag) {
            return run_else(self.orelse.as_ref(), self.else_flag, ctx);
        }

        loop {
            if !ctx.control.is_set(self.body_flag) && !self.cond.evaluate(ctx)?.is_truthy() {
                break;
            }

            let result = self.body.execute(ctx);
            if let Err(Unwind::Suspend(value)) = result {
                ctx.control.set_flag(self.body_flag, true);
                return Err(Unwind::Suspend(value));
            }
            ctx.control.clear_flag(self.body_flag);
            match after_body(&self.body, ctx, result)? {
                Flow::Next => {}
                Flow::Exit => return Ok(()),
            }
        }

        run_else(self.orelse.as_ref(), self.else_flag, ctx)
    }
}

impl Resumable for GeneratorWhile {
    fn reset(&self, control: &mut ControlData) {
        control.clear_flag(self.body_flag);
        control.clear_flag(self.else_flag);
        self.cond.reset(control);
        self.body.reset(control);
        if let Some(orelse) = &self.orelse {
            orelse.reset(control);
        }
    }

    fn can_suspend(&self) -> bool {
        self.cond.can_suspend()
            || self.body.can_suspend()
            || self.orelse.as_ref().is_some_and(|s| s.can_suspend())
    }
}
