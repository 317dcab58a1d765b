//! # Prism Core
//!
//! Core types and protocols shared by the Prism generator engine.
//!
//! This crate provides the collaborator contracts the engine consumes:
//!
//! - **Value System**: Tagged enum representation of Python values
//! - **Exceptions**: Type hierarchy, exception objects and chaining, tracebacks
//! - **Protocols**: Sub-iterator (`next`/`send`/`throw`/`close`) and context manager (`enter`/`exit`)
//! - **Error Handling**: Result types and error definitions

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod exception;
pub mod protocol;
pub mod value;

pub use error::{PrismError, PrismResult};
pub use exception::{ExceptionObject, ExceptionRef, ExceptionType, ExceptionTypeId};
pub use protocol::{ContextManager, ExcInfo, IterProtocol, IterStep};
pub use value::Value;

/// Prism runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Python language version this runtime targets.
pub const PYTHON_VERSION: (u8, u8, u8) = (3, 12, 0);
