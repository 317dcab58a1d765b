//! Control-flow nodes of a generator body.
//!
//! A body is a tree of [`Statement`]s and [`Expression`]s built once and
//! shared by every activation. Nodes never hold per-activation state; the
//! resumable ones keep theirs in [`ControlData`](crate::control::ControlData)
//! under slots assigned at build time.
//!
//! # Resumption Protocol
//!
//! Every resumable construct follows the same rules:
//!
//! - On [`Unwind::Suspend`](crate::signal::Unwind::Suspend) it records where
//!   it is and forwards the suspension unchanged.
//! - On re-entry with recorded state it skips straight to that position
//!   without re-evaluating anything that already ran.
//! - On every other exit (normal completion, exception, `return`, `break`,
//!   `continue`) it resets its slots so the next entry starts fresh.
//!
//! [`Resumable`] is the capability the containers use to treat children
//! uniformly: `reset` clears a subtree's slots, `can_suspend` tells the
//! builder whether a subtree needs the resumable forms at all.

mod basic;
mod block;
mod branch;
mod loops;
mod raise;
mod side_effects;
mod target;
mod try_except;
mod try_finally;
mod with;
mod yields;

pub use basic::{
    Assign, Block, Break, Call, CallFn, Const, Continue, ExprStmt, If, LoadLocal, Native, NativeFn,
    Pass, Return,
};
pub use block::GeneratorBlock;
pub use branch::GeneratorIf;
pub use loops::{GeneratorFor, GeneratorWhile};
pub use raise::Raise;
pub use side_effects::ExpressionWithSideEffects;
pub use target::Target;
pub use try_except::{ExceptClause, GeneratorTryExcept};
pub use try_finally::GeneratorTryFinally;
pub use with::GeneratorWith;
pub use yields::{Yield, YieldFrom};

use crate::context::ExecContext;
use crate::control::ControlData;
use crate::signal::ExecResult;
use prism_core::Value;

/// Suspend/resume capability shared by every node.
pub trait Resumable {
    /// Clears the resumption state of this node and its children.
    fn reset(&self, control: &mut ControlData);

    /// Returns true if executing this node can suspend.
    fn can_suspend(&self) -> bool;
}

/// A statement node.
pub trait Statement: Resumable {
    /// Executes the statement.
    fn execute(&self, ctx: &mut ExecContext) -> ExecResult<()>;
}

/// An expression node.
pub trait Expression: Resumable {
    /// Evaluates the expression.
    fn evaluate(&self, ctx: &mut ExecContext) -> ExecResult<Value>;
}

/// Boxed statement.
pub type StmtNode = Box<dyn Statement>;

/// Boxed expression.
pub type ExprNode = Box<dyn Expression>;

/// Implements [`Resumable`] for nodes that hold no slots and contain no
/// suspend points.
macro_rules! stateless {
    ($($node:ty),+ $(,)?) => {
        $(
            impl $crate::nodes::Resumable for $node {
                #[inline]
                fn reset(&self, _control: &mut $crate::control::ControlData) {}

                #[inline]
                fn can_suspend(&self) -> bool {
                    false
                }
            }
        )+
    };
}
pub(crate) use stateless;

pub(crate) fn reset_all<'a, I, N>(nodes: I, control: &mut ControlData)
where
    I: IntoIterator<Item = &'a Box<N>>,
    N: Resumable + ?Sized + 'a,
{
    for node in nodes {
        node.reset(control);
    }
}

pub(crate) fn any_can_suspend<'a, I, N>(nodes: I) -> bool
where
    I: IntoIterator<Item = &'a Box<N>>,
    N: Resumable + ?Sized + 'a,
{
    nodes.into_iter().any(|node| node.can_suspend())
}
