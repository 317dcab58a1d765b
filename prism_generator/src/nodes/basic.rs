//! Plain nodes: constants, locals, calls, and the non-resumable block and if.
//!
//! [`Block`] and [`If`] are the forms the builder uses when no suspend point
//! occurs inside them. Everything here forwards an [`Unwind`] untouched.

use super::{ExprNode, Expression, Resumable, Statement, StmtNode, Target, stateless};
use crate::context::ExecContext;
use crate::control::ControlData;
use crate::frame::{Frame, LocalSlot};
use crate::signal::{ExecResult, Unwind};
use prism_core::{PrismResult, Value};
use std::fmt;
use std::rc::Rc;

/// Host function operating on the activation's locals.
pub type NativeFn = Box<dyn Fn(&mut Frame) -> PrismResult<Value>>;

/// Host function applied to evaluated arguments.
pub type CallFn = Rc<dyn Fn(&[Value]) -> PrismResult<Value>>;

// ============================================================================
// Expressions
// ============================================================================

/// A literal value.
#[derive(Debug)]
pub struct Const(pub Value);

impl Expression for Const {
    #[inline]
    fn evaluate(&self, _ctx: &mut ExecContext) -> ExecResult<Value> {
        Ok(self.0.clone())
    }
}

/// Reads a local variable.
#[derive(Debug)]
pub struct LoadLocal(pub LocalSlot);

impl Expression for LoadLocal {
    #[inline]
    fn evaluate(&self, ctx: &mut ExecContext) -> ExecResult<Value> {
        ctx.frame.load(self.0)
    }
}

/// Runs a host closure against the frame.
pub struct Native(pub NativeFn);

impl Expression for Native {
    fn evaluate(&self, ctx: &mut ExecContext) -> ExecResult<Value> {
        Ok((self.0)(&mut ctx.frame)?)
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Native(..)")
    }
}

/// Evaluates arguments left to right, then applies a host function.
pub struct Call {
    func: CallFn,
    args: Vec<ExprNode>,
}

impl Call {
    /// Creates a call node.
    pub fn new(func: CallFn, args: Vec<ExprNode>) -> Self {
        Self { func, args }
    }
}

impl Expression for Call {
    fn evaluate(&self, ctx: &mut ExecContext) -> ExecResult<Value> {
        let mut values = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            values.push(arg.evaluate(ctx)?);
        }
        Ok((self.func)(&values)?)
    }
}

impl Resumable for Call {
    fn reset(&self, control: &mut ControlData) {
        super::reset_all(&self.args, control);
    }

    fn can_suspend(&self) -> bool {
        super::any_can_suspend(&self.args)
    }
}

stateless!(Const, LoadLocal, Native);

// ============================================================================
// Simple Statements
// ============================================================================

/// Binds the value of an expression to a target.
pub struct Assign {
    target: Target,
    value: ExprNode,
}

impl Assign {
    /// Creates an assignment.
    pub fn new(target: Target, value: ExprNode) -> Self {
        Self { target, value }
    }
}

impl Statement for Assign {
    fn execute(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        let value = self.value.evaluate(ctx)?;
        self.target.bind(ctx, value)
    }
}

impl Resumable for Assign {
    fn reset(&self, control: &mut ControlData) {
        self.value.reset(control);
    }

    fn can_suspend(&self) -> bool {
        self.value.can_suspend()
    }
}

/// Evaluates an expression for its side effects.
pub struct ExprStmt(pub ExprNode);

impl Statement for ExprStmt {
    #[inline]
    fn execute(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        self.0.evaluate(ctx).map(drop)
    }
}

impl Resumable for ExprStmt {
    fn reset(&self, control: &mut ControlData) {
        self.0.reset(control);
    }

    fn can_suspend(&self) -> bool {
        self.0.can_suspend()
    }
}

/// `return` / `return expr`.
pub struct Return(pub Option<ExprNode>);

impl Statement for Return {
    fn execute(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        let value = match &self.0 {
            Some(expr) => expr.evaluate(ctx)?,
            None => Value::none(),
        };
        Err(Unwind::Return(value))
    }
}

impl Resumable for Return {
    fn reset(&self, control: &mut ControlData) {
        if let Some(expr) = &self.0 {
            expr.reset(control);
        }
    }

    fn can_suspend(&self) -> bool {
        self.0.as_ref().is_some_and(|expr| expr.can_suspend())
    }
}

/// `break`.
#[derive(Debug)]
pub struct Break;

impl Statement for Break {
    #[inline]
    fn execute(&self, _ctx: &mut ExecContext) -> ExecResult<()> {
        Err(Unwind::Break)
    }
}

/// `continue`.
#[derive(Debug)]
pub struct Continue;

impl Statement for Continue {
    #[inline]
    fn execute(&self, _ctx: &mut ExecContext) -> ExecResult<()> {
        Err(Unwind::Continue)
    }
}

/// `pass`.
#[derive(Debug)]
pub struct Pass;

impl Statement for Pass {
    #[inline]
    fn execute(&self, _ctx: &mut ExecContext) -> ExecResult<()> {
        Ok(())
    }
}

stateless!(Break, Continue, Pass);

// ============================================================================
// Non-resumable Compound Statements
// ============================================================================

/// Statement sequence without suspend points.
pub struct Block(pub Vec<StmtNode>);

impl Statement for Block {
    fn execute(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        for stmt in &self.0 {
            stmt.execute(ctx)?;
        }
        Ok(())
    }
}

impl Resumable for Block {
    fn reset(&self, control: &mut ControlData) {
        super::reset_all(&self.0, control);
    }

    fn can_suspend(&self) -> bool {
        super::any_can_suspend(&self.0)
    }
}

/// `if` without suspend points in its branches.
pub struct If {
    cond: ExprNode,
    then: StmtNode,
    orelse: Option<StmtNode>,
}

impl If {
    /// Creates an if statement.
    pub fn new(cond: ExprNode, then: StmtNode, orelse: Option<StmtNode>) -> Self {
        Self { cond, then, orelse }
    }
}

impl Statement for If {
    fn execute(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        if self.cond.evaluate(ctx)?.is_truthy() {
            self.then.execute(ctx)
        } else if let Some(orelse) = &self.orelse {
            orelse.execute(ctx)
        } else {
            Ok(())
        }
    }
}

impl Resumable for If {
    fn reset(&self, control: &mut ControlData) {
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
