//! Resumable control-flow engine implementing Python generators for Prism.
//!
//! A generator body is a tree of statement and expression nodes built once
//! per function and shared by every activation. Suspension is an unwind:
//! a `yield` returns [`Unwind::Suspend`] up through every enclosing
//! construct, each recording where it was in the activation's
//! [`ControlData`] before passing the signal on. Resuming runs the body
//! again from the root, and each construct skips straight to its recorded
//! position.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │ GeneratorFunction ── Rc<CodeBody> (shared tree)  │
//! ├──────────────────────────────────────────────────┤
//! │  Generator (one per call)                         │
//! │  ┌──────────────┐  ┌───────────────────────────┐  │
//! │  │ Header       │  │ ExecContext               │  │
//! │  │ state+index  │  │  Frame        (locals)    │  │
//! │  └──────────────┘  │  ControlData  (slots)     │  │
//! │                    │  payload, handled excs    │  │
//! │                    └───────────────────────────┘  │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use prism_generator::{BodyBuilder, GeneratorFunction};
//!
//! let mut b = BodyBuilder::new("count");
//! let one = b.yield_value(Some(b.constant(1)));
//! let root = b.block(vec![b.expr(one), b.return_value(Some(b.constant(2)))]);
//! let function = GeneratorFunction::new(b.finish(root))?;
//!
//! let generator = function.call(&[])?;
//! assert_eq!(generator.next_step()?, IterStep::Yielded(Value::int(1)));
//! assert_eq!(generator.next_step()?, IterStep::Returned(Value::int(2)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

pub mod builder;
pub mod config;
pub mod context;
pub mod control;
pub mod frame;
pub mod generator;
pub mod nodes;
pub mod signal;

pub use builder::{BodyBuilder, CodeBody, LayoutError};
pub use config::GeneratorConfig;
pub use context::{ExecContext, ResumePayload};
pub use control::{
    ControlData, ExceptionSlot, FlagSlot, IndexSlot, IteratorSlot, SlotKind, SlotLayout, TriState,
};
pub use frame::{Frame, LocalSlot};
pub use generator::{Generator, GeneratorFunction, GeneratorHeader, GeneratorIter, GeneratorState};
pub use nodes::{ExprNode, Expression, Resumable, Statement, StmtNode, Target};
pub use signal::{ExecResult, Unwind};
