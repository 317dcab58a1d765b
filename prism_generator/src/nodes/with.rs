//! Resumable `with` block.
//!
//! # Python Semantics
//!
//! ```python
//! with manager as target:
//!     yield item     # the resource stays acquired across the suspension
//! ```
//!
//! The manager is evaluated and entered once; it is parked in an iterator
//! slot while the body is suspended. `__exit__` runs exactly once per
//! successful `__enter__`: the slots are cleared before exit is called, so
//! no later unwind can trigger a second exit.

use super::{ExprNode, Resumable, Statement, StmtNode, Target};
use crate::context::ExecContext;
use crate::control::{ControlData, FlagSlot, IteratorSlot};
use crate::signal::{ExecResult, Unwind};
use prism_core::protocol::{ContextManager, ExcInfo, as_context_manager};
use prism_core::{PrismError, Value};
use std::rc::Rc;
use tracing::trace;

/// `with context [as target]: body`.
pub struct GeneratorWith {
    context: ExprNode,
    target: Option<Target>,
    body: StmtNode,
    entered: FlagSlot,
    manager: IteratorSlot,
}

impl GeneratorWith {
    /// Creates a resumable with block.
    pub fn new(
        context: ExprNode,
        target: Option<Target>,
        body: StmtNode,
        entered: FlagSlot,
        manager: IteratorSlot,
    ) -> Self {
        Self {
            context,
            target,
            body,
            entered,
            manager,
        }
    }

    /// Evaluates the context expression and calls `__enter__`.
    fn enter(&self, ctx: &mut ExecContext) -> ExecResult<(Rc<dyn ContextManager>, Value)> {
        let value = self.context.evaluate(ctx)?;
        let manager = as_context_manager(&value)?;
        let bound = manager.enter()?;
        ctx.control
            .set_iterator(self.manager, Value::ContextManager(Rc::clone(&manager)));
        ctx.control.set_flag(self.entered, true);
        trace!(manager = manager.type_name(), "entered context manager");
        Ok((manager, bound))
    }

    /// Clears the slots, then calls `__exit__` with the body's outcome.
    fn leave(
        &self,
        ctx: &mut ExecContext,
        manager: &Rc<dyn ContextManager>,
        result: ExecResult<()>,
    ) -> ExecResult<()> {
        ctx.control.clear_flag(self.entered);
        ctx.control.take_iterator(self.manager);

        match result {
            Err(Unwind::Exception(exc)) => match manager.exit(&ExcInfo::from_exception(&exc)) {
                Ok(true) => {
                    trace!(exception = %exc, "exception suppressed by __exit__");
                    Ok(())
                }
                Ok(false) => Err(Unwind::Exception(exc)),
                Err(err) => {
                    let unwind = Unwind::from(err);
                    if let Unwind::Exception(raised) = &unwind {
                        raised.chain_context_if_unset(&exc);
                    }
                    Err(unwind)
                }
            },
            other => {
                manager.exit(&ExcInfo::none())?;
                other
            }
        }
    }
}

impl Statement for GeneratorWith {
    fn execute(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        let manager = if ctx.control.is_set(self.entered) {
            ctx.control.context_manager(self.manager).ok_or_else(|| {
                Unwind::Fatal(PrismError::internal(
                    "with block resumed without a context manager",
                ))
            })?
        } else {
            let (manager, bound) = self.enter(ctx)?;
            if let Some(target) = &self.target {
                if let Err(unwind) = target.bind(ctx, bound) {
                    return self.leave(ctx, &manager, Err(unwind));
                }
            }
            manager
        };

        match self.body.execute(ctx) {
            Err(Unwind::Suspend(value)) => Err(Unwind::Suspend(value)),
            result => self.leave(ctx, &manager, result),
        }
    }
}

impl Resumable for GeneratorWith {
    fn reset(&self, control: &mut ControlData) {
        control.clear_flag(self.entered);
        control.take_iterator(self.manager);
        self.context.reset(control);
        self.body.reset(control);
    }

    fn can_suspend(&self) -> bool {
        self.context.can_suspend() || self.body.can_suspend()
    }
}
