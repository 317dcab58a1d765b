//! Iterator protocol implementation for generators.
//!
//! # Python Semantics
//!
//! ```python
//! def inner():
//!     yield 1
//!     return "done"
//!
//! def outer():
//!     result = yield from inner()   # generators delegate to generators
//!     yield result
//! ```
//!
//! A [`Generator`] is itself a sub-iterator, so `for` loops and
//! `yield from` drive it through [`IterProtocol`]. [`GeneratorIter`] adapts
//! it to a Rust [`Iterator`] for host code.

use super::object::Generator;
use prism_core::protocol::{IterProtocol, IterStep};
use prism_core::{ExceptionRef, PrismError, PrismResult, Value};
use std::rc::Rc;

impl IterProtocol for Generator {
    fn type_name(&self) -> &str {
        "generator"
    }

    /// A finished generator reports exhaustion instead of failing, as
    /// `next()` on a closed generator raises a bare `StopIteration`.
    fn next_step(&self) -> PrismResult<IterStep> {
        match Generator::next_step(self) {
            Err(PrismError::GeneratorExhausted) => Ok(IterStep::Returned(Value::None)),
            other => other,
        }
    }

    fn send(&self, value: Value) -> Option<PrismResult<IterStep>> {
        Some(Generator::send(self, value))
    }

    fn throw(&self, exc: ExceptionRef) -> Option<PrismResult<IterStep>> {
        Some(Generator::throw(self, exc))
    }

    fn close(&self) -> Option<PrismResult<()>> {
        match Generator::close(self) {
            Err(PrismError::GeneratorExhausted) => Some(Ok(())),
            other => Some(other),
        }
    }
}

/// Rust iterator over the values a generator yields.
///
/// Iteration stops after the body returns (the return value is kept, see
/// [`return_value`](Self::return_value)) or after the first error.
#[derive(Debug)]
pub struct GeneratorIter {
    generator: Rc<Generator>,
    returned: Option<Value>,
    done: bool,
}

impl GeneratorIter {
    /// Wraps `generator`.
    pub fn new(generator: Rc<Generator>) -> Self {
        Self {
            generator,
            returned: None,
            done: false,
        }
    }

    /// The body's return value, once it returned.
    #[inline]
    pub fn return_value(&self) -> Option<&Value> {
        self.returned.as_ref()
    }

    /// The underlying generator.
    #[inline]
    pub fn generator(&self) -> &Rc<Generator> {
        &self.generator
    }
}

impl Iterator for GeneratorIter {
    type Item = PrismResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.generator.next_step() {
            Ok(IterStep::Yielded(value)) => Some(Ok(value)),
            Ok(IterStep::Returned(value)) => {
                self.done = true;
                self.returned = Some(value);
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl Generator {
    /// Returns a Rust iterator over this generator.
    pub fn iter(self: &Rc<Self>) -> GeneratorIter {
        GeneratorIter::new(Rc::clone(self))
    }
}
