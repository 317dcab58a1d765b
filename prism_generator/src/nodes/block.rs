//! Resumable statement sequence.

use super::{Resumable, Statement, StmtNode};
use crate::context::ExecContext;
use crate::control::{ControlData, IndexSlot};
use crate::signal::ExecResult;

/// A block that remembers which statement it suspended in.
///
/// On re-entry execution restarts at the recorded statement, which is
/// itself responsible for skipping whatever part of it already ran.
/// Statements before it are never executed twice.
pub struct GeneratorBlock {
    statements: Vec<StmtNode>,
    index: IndexSlot,
}

impl GeneratorBlock {
    /// Creates a resumable block recording its position in `index`.
    pub fn new(statements: Vec<StmtNode>, index: IndexSlot) -> Self {
        Self { statements, index }
    }

    /// Number of statements.
    #[inline]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Returns true for an empty block.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl Statement for GeneratorBlock {
    fn execute(&self, ctx: &mut ExecContext) -> ExecResult<()> {
        let start = ctx.control.index(self.index);
        // A start index at or past the end resumes as a no-op.
        for (i, stmt) in self.statements.iter().enumerate().skip(start) {
            if let Err(unwind) = stmt.execute(ctx) {
                if unwind.is_suspend() {
                    ctx.control.set_index(self.index, i);
                } else if start != 0 {
                    ctx.control.set_index(self.index, 0);
                }
                return Err(unwind);
            }
        }
        if start != 0 {
            ctx.control.set_index(self.index, 0);
        }
        Ok(())
    }
}

impl Resumable for GeneratorBlock {
    fn reset(&self, control: &mut ControlData) {
        if control.index(self.index) != 0 {
            control.set_index(self.index, 0);
        }
        super::reset_all(&self.statements, control);
    }

    fn can_suspend(&self) -> bool {
        super::any_can_suspend(&self.statements)
    }
}
