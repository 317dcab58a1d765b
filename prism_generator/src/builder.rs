//! Generator body builder.
//!
//! The builder plays the compiler's part: it owns the name → local-slot
//! table and hands out control-data slots as constructs are created, so
//! every slot of a body is assigned exactly once. It also picks between the
//! plain and the resumable form of blocks and `if` statements depending on
//! whether a yield can occur inside.
//!
//! # Example
//!
//! ```ignore
//! // def count():
//! //     yield 1
//! //     yield 2
//! //     return 3
//! let mut b = BodyBuilder::new("count");
//! let first = b.yield_value(Some(b.constant(Value::int(1))));
//! let second = b.yield_value(Some(b.constant(Value::int(2))));
//! let root = b.block(vec![
//!     b.expr(first),
//!     b.expr(second),
//!     b.return_value(Some(b.constant(Value::int(3)))),
//! ]);
//! let code = b.finish(root);
//! ```

use crate::control::{ExceptionSlot, FlagSlot, IndexSlot, IteratorSlot, SlotKind, SlotLayout};
use crate::frame::{Frame, LocalSlot};
use crate::nodes::{
    Assign, Block, Break, Call, Const, Continue, ExceptClause, ExprNode, ExprStmt,
    ExpressionWithSideEffects, GeneratorBlock, GeneratorFor, GeneratorIf, GeneratorTryExcept,
    GeneratorTryFinally, GeneratorWhile, GeneratorWith, If, LoadLocal, Native, Pass, Raise, Return,
    StmtNode, Target, Yield, YieldFrom, any_can_suspend,
};
use prism_core::{ExceptionType, PrismResult, Value};
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

/// A body uses more slots than a configuration allows.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LayoutError {
    /// One of the control-data arrays is too large.
    #[error("body needs {count} {kind} slots, configuration allows {max}")]
    TooManySlots {
        /// The array that overflows.
        kind: SlotKind,
        /// Slots the body needs.
        count: u32,
        /// Configured limit.
        max: usize,
    },
}

/// A compiled generator body: the node tree plus everything needed to
/// create activations of it.
pub struct CodeBody {
    name: Arc<str>,
    root: StmtNode,
    layout: SlotLayout,
    local_names: Rc<[Arc<str>]>,
    param_count: usize,
}

impl CodeBody {
    /// Function name.
    #[inline]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Root statement.
    #[inline]
    pub fn root(&self) -> &StmtNode {
        &self.root
    }

    /// Slots used by the body.
    #[inline]
    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    /// Names of all locals, parameters first.
    #[inline]
    pub fn local_names(&self) -> &Rc<[Arc<str>]> {
        &self.local_names
    }

    /// Number of positional parameters.
    #[inline]
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// Checks that every array fits in `max_slots`.
    pub fn check_layout(&self, max_slots: usize) -> Result<(), LayoutError> {
        let (kind, count) = self.layout.largest();
        if count as usize > max_slots {
            return Err(LayoutError::TooManySlots {
                kind,
                count,
                max: max_slots,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for CodeBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeBody")
            .field("name", &self.name)
            .field("layout", &self.layout)
            .field("locals", &self.local_names.len())
            .field("params", &self.param_count)
            .finish_non_exhaustive()
    }
}

/// Builds a [`CodeBody`].
pub struct BodyBuilder {
    /// Function name.
    name: Arc<str>,
    /// Local variable names, parameters first.
    locals: Vec<Arc<str>>,
    /// Local name to slot map.
    local_map: FxHashMap<Arc<str>, LocalSlot>,
    /// Number of parameters.
    param_count: usize,
    /// Slots handed out so far.
    layout: SlotLayout,
    /// Next suspend-point identifier.
    next_yield: u32,
    /// Line recorded in tracebacks of subsequent `raise` statements.
    current_line: u32,
    /// Hidden locals handed out for hoisted operands.
    next_temp: u32,
}

impl BodyBuilder {
    /// Creates a builder for the function `name`.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            locals: Vec::new(),
            local_map: FxHashMap::default(),
            param_count: 0,
            layout: SlotLayout::default(),
            next_yield: 0,
            current_line: 0,
            next_temp: 0,
        }
    }

    /// Sets the line number for subsequently built `raise` statements.
    #[inline]
    pub fn set_line(&mut self, line: u32) {
        self.current_line = line;
    }

    // =========================================================================
    // Local Variables
    // =========================================================================

    /// Declares the next positional parameter.
    ///
    /// # Panics
    ///
    /// Panics if a non-parameter local was declared before.
    pub fn param(&mut self, name: impl Into<Arc<str>>) -> LocalSlot {
        assert_eq!(
            self.locals.len(),
            self.param_count,
            "parameters must be declared before other locals"
        );
        let slot = self.local(name);
        self.param_count = self.locals.len();
        slot
    }

    /// Defines a local variable and returns its slot.
    pub fn local(&mut self, name: impl Into<Arc<str>>) -> LocalSlot {
        let name = name.into();
        if let Some(&slot) = self.local_map.get(&name) {
            return slot;
        }
        let slot = LocalSlot::new(self.locals.len() as u32);
        self.local_map.insert(Arc::clone(&name), slot);
        self.locals.push(name);
        slot
    }

    /// A hidden local holding an operand evaluated ahead of a suspension.
    fn temporary(&mut self) -> LocalSlot {
        let name = format!("$tmp{}", self.next_temp);
        self.next_temp += 1;
        self.local(name)
    }

    /// Looks up a local variable by name.
    pub fn lookup_local(&self, name: &str) -> Option<LocalSlot> {
        self.local_map.get(name).copied()
    }

    // =========================================================================
    // Slot Allocation
    // =========================================================================

    /// Allocates a flag slot.
    pub fn alloc_flag(&mut self) -> FlagSlot {
        let slot = FlagSlot::new(self.layout.flags);
        self.layout.flags += 1;
        slot
    }

    /// Allocates a block-index slot.
    pub fn alloc_index(&mut self) -> IndexSlot {
        let slot = IndexSlot::new(self.layout.indices);
        self.layout.indices += 1;
        slot
    }

    /// Allocates an iterator slot.
    pub fn alloc_iterator(&mut self) -> IteratorSlot {
        let slot = IteratorSlot::new(self.layout.iterators);
        self.layout.iterators += 1;
        slot
    }

    /// Allocates an active-exception slot.
    pub fn alloc_exception(&mut self) -> ExceptionSlot {
        let slot = ExceptionSlot::new(self.layout.exceptions);
        self.layout.exceptions += 1;
        slot
    }

    fn next_yield_index(&mut self) -> u32 {
        let index = self.next_yield;
        self.next_yield += 1;
        index
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// A constant.
    pub fn constant(&self, value: impl Into<Value>) -> ExprNode {
        Box::new(Const(value.into()))
    }

    /// Reads a local.
    pub fn load(&self, slot: LocalSlot) -> ExprNode {
        Box::new(LoadLocal(slot))
    }

    /// A host computation over the frame.
    pub fn native(&self, f: impl Fn(&mut Frame) -> PrismResult<Value> + 'static) -> ExprNode {
        Box::new(Native(Box::new(f)))
    }

    /// Calls a host function with evaluated arguments.
    ///
    /// When an argument after the first can suspend, it and every argument
    /// before it are computed into temporaries first, so a resume neither
    /// re-evaluates them nor re-enters an already finished yield.
    pub fn call(
        &mut self,
        f: impl Fn(&[Value]) -> PrismResult<Value> + 'static,
        args: Vec<ExprNode>,
    ) -> ExprNode {
        let (prelude, args) = self.hoist_operands(args);
        let call: ExprNode = Box::new(Call::new(Rc::new(f), args));
        if prelude.is_empty() {
            call
        } else {
            self.with_side_effects(prelude, call)
        }
    }

    /// Moves `operands` up to the last one that can suspend into
    /// temporaries. Returns the assignments and the rewritten operands.
    fn hoist_operands(&mut self, operands: Vec<ExprNode>) -> (Vec<StmtNode>, Vec<ExprNode>) {
        let last = match operands.iter().rposition(|op| op.can_suspend()) {
            Some(last) if last > 0 => last,
            _ => return (Vec::new(), operands),
        };
        let mut prelude = Vec::with_capacity(last + 1);
        let mut rewritten = Vec::with_capacity(operands.len());
        for (i, operand) in operands.into_iter().enumerate() {
            if i > last {
                rewritten.push(operand);
                continue;
            }
            let temp = self.temporary();
            prelude.push(self.assign(Target::Local(temp), operand));
            rewritten.push(self.load(temp));
        }
        (prelude, rewritten)
    }

    /// `yield value` (`yield` when `value` is `None`).
    pub fn yield_value(&mut self, value: Option<ExprNode>) -> ExprNode {
        let flag = self.alloc_flag();
        let index = self.next_yield_index();
        Box::new(Yield::new(value, flag, index))
    }

    /// `yield from source`.
    pub fn yield_from(&mut self, source: ExprNode) -> ExprNode {
        let delegate = self.alloc_iterator();
        let index = self.next_yield_index();
        Box::new(YieldFrom::new(source, delegate, index))
    }

    /// Runs `prelude` once per evaluation, then evaluates `result`.
    pub fn with_side_effects(&mut self, prelude: Vec<StmtNode>, result: ExprNode) -> ExprNode {
        let prelude = self.block(prelude);
        let done = self.alloc_flag();
        Box::new(ExpressionWithSideEffects::new(prelude, result, done))
    }

    // =========================================================================
    // Simple Statements
    // =========================================================================

    /// `target = value`.
    pub fn assign(&self, target: Target, value: ExprNode) -> StmtNode {
        Box::new(Assign::new(target, value))
    }

    /// An expression statement.
    pub fn expr(&self, expr: ExprNode) -> StmtNode {
        Box::new(ExprStmt(expr))
    }

    /// `pass`.
    pub fn pass(&self) -> StmtNode {
        Box::new(Pass)
    }

    /// `return [value]`.
    pub fn return_value(&self, value: Option<ExprNode>) -> StmtNode {
        Box::new(Return(value))
    }

    /// `break`.
    pub fn break_loop(&self) -> StmtNode {
        Box::new(Break)
    }

    /// `continue`.
    pub fn continue_loop(&self) -> StmtNode {
        Box::new(Continue)
    }

    /// `raise exc [from cause]` at the current line.
    ///
    /// A cause that can suspend is computed, with the exception, into
    /// temporaries by a resumable block ahead of the raise.
    pub fn raise(&mut self, exc: ExprNode, cause: Option<ExprNode>) -> StmtNode {
        let line = self.current_line;
        match cause {
            Some(cause) if cause.can_suspend() => {
                let exc_temp = self.temporary();
                let cause_temp = self.temporary();
                let raise = Box::new(Raise::new(
                    Some(self.load(exc_temp)),
                    Some(self.load(cause_temp)),
                    line,
                ));
                let statements = vec![
                    self.assign(Target::Local(exc_temp), exc),
                    self.assign(Target::Local(cause_temp), cause),
                    raise as StmtNode,
                ];
                self.block(statements)
            }
            cause => Box::new(Raise::new(Some(exc), cause, line)),
        }
    }

    /// Bare `raise`.
    pub fn reraise(&self) -> StmtNode {
        Box::new(Raise::new(None, None, self.current_line))
    }

    // =========================================================================
    // Compound Statements
    // =========================================================================

    /// A statement sequence; resumable only if something inside can suspend.
    pub fn block(&mut self, statements: Vec<StmtNode>) -> StmtNode {
        if any_can_suspend(&statements) {
            let index = self.alloc_index();
            Box::new(GeneratorBlock::new(statements, index))
        } else {
            Box::new(Block(statements))
        }
    }

    /// `if cond: then [else: orelse]`.
    pub fn if_else(
        &mut self,
        cond: ExprNode,
        then: StmtNode,
        orelse: Option<StmtNode>,
    ) -> StmtNode {
        let suspends = then.can_suspend() || orelse.as_ref().is_some_and(|s| s.can_suspend());
        if suspends {
            let then_flag = self.alloc_flag();
            let else_flag = self.alloc_flag();
            Box::new(GeneratorIf::new(cond, then, orelse, then_flag, else_flag))
        } else {
            Box::new(If::new(cond, then, orelse))
        }
    }

    /// `for target in iterable: body [else: orelse]`.
    pub fn for_loop(
        &mut self,
        target: Target,
        iterable: ExprNode,
        body: StmtNode,
        orelse: Option<StmtNode>,
    ) -> StmtNode {
        let iterator = self.alloc_iterator();
        let else_flag = self.alloc_flag();
        Box::new(GeneratorFor::new(target, iterable, body, orelse, iterator, else_flag))
    }

    /// `while cond: body [else: orelse]`.
    pub fn while_loop(
        &mut self,
        cond: ExprNode,
        body: StmtNode,
        orelse: Option<StmtNode>,
    ) -> StmtNode {
        let body_flag = self.alloc_flag();
        let else_flag = self.alloc_flag();
        Box::new(GeneratorWhile::new(cond, body, orelse, body_flag, else_flag))
    }

    /// `except (types...) [as name]: body`.
    pub fn except(
        &self,
        types: impl IntoIterator<Item = ExceptionType>,
        name: Option<LocalSlot>,
        body: StmtNode,
    ) -> ExceptClause {
        ExceptClause::new(types, name, body)
    }

    /// `try: body except ...: ... [else: orelse]`.
    pub fn try_except(
        &mut self,
        body: StmtNode,
        handlers: Vec<ExceptClause>,
        orelse: Option<StmtNode>,
    ) -> StmtNode {
        let handler_flag = self.alloc_flag();
        let else_flag = self.alloc_flag();
        let handler_index = self.alloc_index();
        let exception = self.alloc_exception();
        Box::new(GeneratorTryExcept::new(
            body,
            handlers,
            orelse,
            handler_flag,
            else_flag,
            handler_index,
            exception,
        ))
    }

    /// `try: body finally: finalbody`.
    pub fn try_finally(&mut self, body: StmtNode, finalbody: StmtNode) -> StmtNode {
        let finally_flag = self.alloc_flag();
        let pending = self.alloc_exception();
        Box::new(GeneratorTryFinally::new(body, finalbody, finally_flag, pending))
    }

    /// `with context [as target]: body`.
    pub fn with_block(
        &mut self,
        context: ExprNode,
        target: Option<Target>,
        body: StmtNode,
    ) -> StmtNode {
        let entered = self.alloc_flag();
        let manager = self.alloc_iterator();
        Box::new(GeneratorWith::new(context, target, body, entered, manager))
    }

    // =========================================================================
    // Finalization
    // =========================================================================

    /// Slots handed out so far.
    #[inline]
    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    /// Finishes the body with `root` as its top-level statement.
    pub fn finish(self, root: StmtNode) -> CodeBody {
        CodeBody {
            name: self.name,
            root,
            layout: self.layout,
            local_names: self.locals.into(),
            param_count: self.param_count,
        }
    }
}
