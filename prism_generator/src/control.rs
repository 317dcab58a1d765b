//! Per-activation control data.
//!
//! The node tree of a generator body is immutable and shared by every
//! activation. Everything a construct must remember across a suspension
//! lives here instead, in four arrays indexed by slots the builder assigned
//! when the tree was built:
//!
//! ```text
//! flags       [TriState]       "was I entered before the last suspend?"
//! indices     [usize]          statement index a block resumes at
//! iterators   [Value]          live sub-iterators and context managers
//! exceptions  [Option<Unwind>] exception (or exit) a handler is processing
//! ```
//!
//! Arrays grow lazily on the first write past their end and never shrink.
//! Reads past the end return the initial value without growing.
//!
//! # Panics
//!
//! Accessing a slot at or beyond the configured `max_slots` panics. Slots
//! are assigned when the body is built, so an out-of-range slot is a broken
//! body, not a recoverable runtime condition.

use crate::signal::Unwind;
use prism_core::{ContextManager, IterProtocol, Value};
use std::fmt;
use std::rc::Rc;

// ============================================================================
// Slots
// ============================================================================

macro_rules! define_slot {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
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
    };
}

define_slot!(
    /// Slot in the flag array.
    FlagSlot
);
define_slot!(
    /// Slot in the block-index array.
    IndexSlot
);
define_slot!(
    /// Slot in the iterator array.
    IteratorSlot
);
define_slot!(
    /// Slot in the active-exception array.
    ExceptionSlot
);

/// The four control-data arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Active flags.
    Flag,
    /// Block indices.
    Index,
    /// Sub-iterators and context managers.
    Iterator,
    /// Active exceptions.
    Exception,
}

impl SlotKind {
    /// Returns the lowercase name of the array.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Index => "index",
            Self::Iterator => "iterator",
            Self::Exception => "exception",
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of slots of each kind a compiled body uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotLayout {
    /// Flag slots.
    pub flags: u32,
    /// Index slots.
    pub indices: u32,
    /// Iterator slots.
    pub iterators: u32,
    /// Exception slots.
    pub exceptions: u32,
}

impl SlotLayout {
    /// Returns the count for `kind`.
    #[inline]
    pub const fn count(&self, kind: SlotKind) -> u32 {
        match kind {
            SlotKind::Flag => self.flags,
            SlotKind::Index => self.indices,
            SlotKind::Iterator => self.iterators,
            SlotKind::Exception => self.exceptions,
        }
    }

    /// Returns the largest array and its size.
    pub fn largest(&self) -> (SlotKind, u32) {
        [
            SlotKind::Flag,
            SlotKind::Index,
            SlotKind::Iterator,
            SlotKind::Exception,
        ]
        .into_iter()
        .map(|kind| (kind, self.count(kind)))
        .fold((SlotKind::Flag, 0), |best, next| if next.1 > best.1 { next } else { best })
    }
}

// ============================================================================
// Tri-state Flag
// ============================================================================

/// Value of a flag slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriState {
    /// Never written.
    #[default]
    Unset,
    /// Written false.
    False,
    /// Written true.
    True,
}

impl TriState {
    /// Returns true only for [`TriState::True`].
    #[inline(always)]
    pub const fn is_true(self) -> bool {
        matches!(self, Self::True)
    }
}

impl From<bool> for TriState {
    #[inline]
    fn from(b: bool) -> Self {
        if b { Self::True } else { Self::False }
    }
}

// ============================================================================
// Control Data
// ============================================================================

/// Mutable resumption state of one generator activation.
pub struct ControlData {
    flags: Vec<TriState>,
    indices: Vec<usize>,
    iterators: Vec<Value>,
    exceptions: Vec<Option<Unwind>>,
    last_yield_index: u32,
    max_slots: usize,
}

impl ControlData {
    /// Creates empty control data allowing up to `max_slots` entries per array.
    pub fn new(max_slots: usize) -> Self {
        Self {
            flags: Vec::new(),
            indices: Vec::new(),
            iterators: Vec::new(),
            exceptions: Vec::new(),
            last_yield_index: 0,
            max_slots,
        }
    }

    /// Creates control data with capacity reserved for `layout`.
    pub fn with_layout(layout: SlotLayout, max_slots: usize) -> Self {
        Self {
            flags: Vec::with_capacity(layout.flags as usize),
            indices: Vec::with_capacity(layout.indices as usize),
            iterators: Vec::with_capacity(layout.iterators as usize),
            exceptions: Vec::with_capacity(layout.exceptions as usize),
            last_yield_index: 0,
            max_slots,
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Flags
    // ════════════════════════════════════════════════════════════════════════

    /// Reads a flag.
    #[inline]
    pub fn flag(&self, slot: FlagSlot) -> TriState {
        self.check(SlotKind::Flag, slot.index());
        self.flags.get(slot.index()).copied().unwrap_or_default()
    }

    /// Returns true if the flag was set to true.
    #[inline]
    pub fn is_set(&self, slot: FlagSlot) -> bool {
        self.flag(slot).is_true()
    }

    /// Writes a flag.
    #[inline]
    pub fn set_flag(&mut self, slot: FlagSlot, value: bool) {
        *grow(&mut self.flags, SlotKind::Flag, slot.index(), self.max_slots) = value.into();
    }

    /// Writes `false` if the flag is currently true.
    #[inline]
    pub fn clear_flag(&mut self, slot: FlagSlot) {
        if self.is_set(slot) {
            self.flags[slot.index()] = TriState::False;
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Block Indices
    // ════════════════════════════════════════════════════════════════════════

    /// Reads a block index (0 when never written).
    #[inline]
    pub fn index(&self, slot: IndexSlot) -> usize {
        self.check(SlotKind::Index, slot.index());
        self.indices.get(slot.index()).copied().unwrap_or(0)
    }

    /// Writes a block index.
    #[inline]
    pub fn set_index(&mut self, slot: IndexSlot, value: usize) {
        *grow(&mut self.indices, SlotKind::Index, slot.index(), self.max_slots) = value;
    }

    // ════════════════════════════════════════════════════════════════════════
    // Iterators
    // ════════════════════════════════════════════════════════════════════════

    /// Reads an iterator slot (`None` when empty).
    #[inline]
    pub fn iterator(&self, slot: IteratorSlot) -> &Value {
        const EMPTY: &Value = &Value::None;
        self.check(SlotKind::Iterator, slot.index());
        self.iterators.get(slot.index()).unwrap_or(EMPTY)
    }

    /// Stores an object in an iterator slot.
    #[inline]
    pub fn set_iterator(&mut self, slot: IteratorSlot, value: Value) {
        *grow(
            &mut self.iterators,
            SlotKind::Iterator,
            slot.index(),
            self.max_slots,
        ) = value;
    }

    /// Removes and returns the object in an iterator slot.
    #[inline]
    pub fn take_iterator(&mut self, slot: IteratorSlot) -> Value {
        self.check(SlotKind::Iterator, slot.index());
        self.iterators
            .get_mut(slot.index())
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Removes the sub-iterator stored in `slot`, if any.
    pub fn take_sub_iterator(&mut self, slot: IteratorSlot) -> Option<Rc<dyn IterProtocol>> {
        match self.take_iterator(slot) {
            Value::Iterator(iter) => Some(iter),
            _ => None,
        }
    }

    /// Returns the context manager stored in `slot`, if any.
    pub fn context_manager(&self, slot: IteratorSlot) -> Option<Rc<dyn ContextManager>> {
        match self.iterator(slot) {
            Value::ContextManager(manager) => Some(Rc::clone(manager)),
            _ => None,
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Active Exceptions
    // ════════════════════════════════════════════════════════════════════════

    /// Reads an active-exception slot.
    #[inline]
    pub fn active_exception(&self, slot: ExceptionSlot) -> Option<&Unwind> {
        self.check(SlotKind::Exception, slot.index());
        self.exceptions.get(slot.index()).and_then(Option::as_ref)
    }

    /// Writes an active-exception slot.
    #[inline]
    pub fn set_active_exception(&mut self, slot: ExceptionSlot, value: Option<Unwind>) {
        if value.is_none() && slot.index() >= self.exceptions.len() {
            self.check(SlotKind::Exception, slot.index());
            return;
        }
        *grow(
            &mut self.exceptions,
            SlotKind::Exception,
            slot.index(),
            self.max_slots,
        ) = value;
    }

    /// Removes and returns the contents of an active-exception slot.
    #[inline]
    pub fn take_active_exception(&mut self, slot: ExceptionSlot) -> Option<Unwind> {
        self.check(SlotKind::Exception, slot.index());
        self.exceptions.get_mut(slot.index()).and_then(Option::take)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Bookkeeping
    // ════════════════════════════════════════════════════════════════════════

    /// Identifier of the most recent suspend point.
    #[inline]
    pub fn last_yield_index(&self) -> u32 {
        self.last_yield_index
    }

    /// Records the suspend point about to be left.
    #[inline]
    pub fn set_last_yield_index(&mut self, index: u32) {
        self.last_yield_index = index;
    }

    /// Current length of each array.
    pub fn footprint(&self) -> SlotLayout {
        SlotLayout {
            flags: self.flags.len() as u32,
            indices: self.indices.len() as u32,
            iterators: self.iterators.len() as u32,
            exceptions: self.exceptions.len() as u32,
        }
    }

    /// Drops every stored object. Called once the activation is finished.
    pub fn release(&mut self) {
        self.flags.clear();
        self.indices.clear();
        self.iterators.clear();
        self.exceptions.clear();
    }

    #[inline]
    fn check(&self, kind: SlotKind, slot: usize) {
        assert!(
            slot < self.max_slots,
            "{kind} slot {slot} out of range (limit {})",
            self.max_slots
        );
    }
}

fn grow<T: Default>(array: &mut Vec<T>, kind: SlotKind, slot: usize, max_slots: usize) -> &mut T {
    assert!(
        slot < max_slots,
        "{kind} slot {slot} out of range (limit {max_slots})"
    );
    if slot >= array.len() {
        array.resize_with(slot + 1, T::default);
    }
    &mut array[slot]
}

impl fmt::Debug for ControlData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlData")
            .field("flags", &self.flags)
            .field("indices", &self.indices)
            .field("iterators", &self.iterators.len())
            .field("exceptions", &self.exceptions.len())
            .field("last_yield_index", &self.last_yield_index)
            .finish()
    }
}
