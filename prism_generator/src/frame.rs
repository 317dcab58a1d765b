//! Local-variable storage for a generator activation.
//!
//! Locals survive suspension simply because the frame is owned by the
//! generator object rather than a host stack. Small bodies keep their
//! locals inline.

use crate::signal::ExecResult;
use prism_core::{ExceptionObject, ExceptionTypeId, Value};
use smallvec::SmallVec;
use std::rc::Rc;
use std::sync::Arc;

/// Locals stored inline before spilling to the heap.
pub const INLINE_LOCALS: usize = 8;

/// Index of a local variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalSlot(u32);

impl LocalSlot {
    /// Creates a slot from its raw index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Local variables of one activation.
#[derive(Debug)]
pub struct Frame {
    locals: SmallVec<[Option<Value>; INLINE_LOCALS]>,
    names: Rc<[Arc<str>]>,
}

impl Frame {
    /// Creates a frame with every local unbound.
    pub fn new(names: Rc<[Arc<str>]>) -> Self {
        let mut locals = SmallVec::with_capacity(names.len());
        locals.resize(names.len(), None);
        Self { locals, names }
    }

    /// Number of locals.
    #[inline]
    pub fn len(&self) -> usize {
        self.locals.len()
    }

    /// Returns true if the body has no locals.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }

    /// Name of a local.
    #[inline]
    pub fn name(&self, slot: LocalSlot) -> &str {
        self.names.get(slot.index()).map_or("<unknown>", |n| n)
    }

    /// Reads a local, raising `UnboundLocalError` if it was never assigned.
    pub fn load(&self, slot: LocalSlot) -> ExecResult<Value> {
        match self.locals.get(slot.index()) {
            Some(Some(value)) => Ok(value.clone()),
            _ => Err(ExceptionObject::builtin(
                ExceptionTypeId::UnboundLocalError,
                format!(
                    "local variable '{}' referenced before assignment",
                    self.name(slot)
                ),
            )
            .into()),
        }
    }

    /// Reads a local without raising.
    #[inline]
    pub fn get(&self, slot: LocalSlot) -> Option<&Value> {
        self.locals.get(slot.index()).and_then(Option::as_ref)
    }

    /// Binds a local.
    #[inline]
    pub fn store(&mut self, slot: LocalSlot, value: Value) {
        let index = slot.index();
        if index >= self.locals.len() {
            self.locals.resize(index + 1, None);
        }
        self.locals[index] = Some(value);
    }

    /// Unbinds a local (`del x`, end of an `except ... as x` handler).
    #[inline]
    pub fn delete(&mut self, slot: LocalSlot) {
        if let Some(local) = self.locals.get_mut(slot.index()) {
            *local = None;
        }
    }

    /// Drops every local.
    pub fn clear(&mut self) {
        self.locals.iter_mut().for_each(|local| *local = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(names: &[&str]) -> Frame {
        Frame::new(names.iter().map(|n| Arc::from(*n)).collect())
    }

    #[test]
    fn test_store_and_load() {
        let mut f = frame(&["x", "y"]);
        f.store(LocalSlot::new(1), Value::int(7));
        assert_eq!(f.load(LocalSlot::new(1)).unwrap(), Value::int(7));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_unbound_local() {
        let f = frame(&["total"]);
        let err = f.load(LocalSlot::new(0)).unwrap_err();
        let exc = err.exception().unwrap();
        assert!(exc.is_builtin(ExceptionTypeId::NameError));
        assert_eq!(
            exc.message(),
            "local variable 'total' referenced before assignment"
        );
    }

    #[test]
    fn test_delete() {
        let mut f = frame(&["e"]);
        f.store(LocalSlot::new(0), Value::none());
        f.delete(LocalSlot::new(0));
        assert!(f.get(LocalSlot::new(0)).is_none());
    }

    #[test]
    fn test_store_past_declared_locals_grows() {
        let mut f = frame(&[]);
        assert!(f.is_empty());
        f.store(LocalSlot::new(9), Value::bool(true));
        assert_eq!(f.len(), 10);
        assert_eq!(f.name(LocalSlot::new(9)), "<unknown>");
    }
}
