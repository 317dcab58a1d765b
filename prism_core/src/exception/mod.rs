//! Python exception representation.
//!
//! - [`types`]: builtin type identifiers and user-defined exception classes
//! - [`object`]: exception instances with `__context__` / `__cause__` links
//! - [`traceback`]: raise-site frame information

pub mod object;
pub mod traceback;
pub mod types;

pub use object::{ExceptionObject, ExceptionRef};
pub use traceback::{FrameInfo, Traceback};
pub use types::{ExceptionClass, ExceptionType, ExceptionTypeId};
