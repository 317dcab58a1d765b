//! Generator state management.
//!
//! `GeneratorHeader` packs the driver state and the identifier of the last
//! suspend point into a single `u32`, so one load answers both "may I
//! resume?" and "where did it stop?".
//!
//! # Encoding
//!
//! ```text
//! Bits 0-2:  State (Created=0, Running=1, Suspended=2, Completed=3, Errored=4)
//! Bits 3-31: Resume index (suspend point ID, max 2^29 - 1)
//! ```

use std::cell::Cell;
use std::fmt;

// ============================================================================
// Generator State
// ============================================================================

/// Generator execution state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GeneratorState {
    /// Created but never started.
    #[default]
    Created = 0,
    /// Body is executing (re-entry guard).
    Running = 1,
    /// Stopped at a suspend point.
    Suspended = 2,
    /// Body returned, or the generator was closed.
    Completed = 3,
    /// An exception or protocol violation escaped the body.
    Errored = 4,
}

impl GeneratorState {
    /// Number of bits used to encode state.
    pub const BITS: u32 = 3;

    /// Mask for extracting state from header.
    pub const MASK: u32 = (1 << Self::BITS) - 1;

    /// Creates state from raw bits. Unused encodings read as `Errored`.
    #[inline(always)]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & Self::MASK {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Suspended,
            3 => Self::Completed,
            _ => Self::Errored,
        }
    }

    /// Returns true if the generator can be resumed.
    #[inline(always)]
    pub const fn is_resumable(self) -> bool {
        matches!(self, Self::Created | Self::Suspended)
    }

    /// Returns true if the generator is finished.
    #[inline(always)]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Errored)
    }

    /// Returns the Python name for this state.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Created => "GEN_CREATED",
            Self::Running => "GEN_RUNNING",
            Self::Suspended => "GEN_SUSPENDED",
            Self::Completed | Self::Errored => "GEN_CLOSED",
        }
    }
}

impl fmt::Display for GeneratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Generator Header
// ============================================================================

/// Tagged header combining state and resume index.
///
/// ```text
/// +-------------------+-------+
/// | Resume Index (29) | State |
/// |                   | (3)   |
/// +-------------------+-------+
/// MSB                       LSB
/// ```
///
/// Generators are confined to one thread, so the header is a plain
/// [`Cell`].
#[repr(transparent)]
pub struct GeneratorHeader {
    bits: Cell<u32>,
}

impl GeneratorHeader {
    /// Maximum resume index (2^29 - 1).
    pub const MAX_RESUME_INDEX: u32 = (1 << 29) - 1;

    const RESUME_SHIFT: u32 = GeneratorState::BITS;

    /// Creates a header in the `Created` state with resume index 0.
    #[inline]
    pub fn new() -> Self {
        Self {
            bits: Cell::new(GeneratorState::Created as u32),
        }
    }

    /// Gets the current state.
    #[inline(always)]
    pub fn state(&self) -> GeneratorState {
        GeneratorState::from_bits(self.bits.get())
    }

    /// Gets the index of the last suspend point.
    #[inline(always)]
    pub fn resume_index(&self) -> u32 {
        self.bits.get() >> Self::RESUME_SHIFT
    }

    /// Gets both in one read.
    #[inline(always)]
    pub fn state_and_index(&self) -> (GeneratorState, u32) {
        let bits = self.bits.get();
        (GeneratorState::from_bits(bits), bits >> Self::RESUME_SHIFT)
    }

    #[inline]
    fn set_state(&self, state: GeneratorState) {
        let old = self.bits.get();
        self.bits.set((old & !GeneratorState::MASK) | state as u32);
    }

    /// Transitions to `Running` if currently resumable.
    /// Returns the previous state on success, `None` if not resumable.
    #[inline]
    pub fn try_start(&self) -> Option<GeneratorState> {
        let old_state = self.state();
        if !old_state.is_resumable() {
            return None;
        }
        self.set_state(GeneratorState::Running);
        Some(old_state)
    }

    /// Transitions to `Suspended` at `resume_index`. Only valid when running.
    #[inline]
    pub fn suspend(&self, resume_index: u32) {
        debug_assert_eq!(self.state(), GeneratorState::Running);
        let index = resume_index.min(Self::MAX_RESUME_INDEX);
        self.bits
            .set((index << Self::RESUME_SHIFT) | GeneratorState::Suspended as u32);
    }

    /// Transitions to `Completed`, keeping the resume index for debugging.
    #[inline]
    pub fn complete(&self) {
        self.set_state(GeneratorState::Completed);
    }

    /// Transitions to `Errored`, keeping the resume index for debugging.
    #[inline]
    pub fn fail(&self) {
        self.set_state(GeneratorState::Errored);
    }

    /// Returns true if the body is executing.
    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.state() == GeneratorState::Running
    }

    /// Returns true if the generator is finished.
    #[inline(always)]
    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }
}

impl Default for GeneratorHeader {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GeneratorHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (state, index) = self.state_and_index();
        f.debug_struct("GeneratorHeader")
            .field("state", &state)
            .field("resume_index", &index)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ════════════════════════════════════════════════════════════════════════
    // GeneratorState Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_state_size() {
        assert_eq!(std::mem::size_of::<GeneratorState>(), 1);
    }

    #[test]
    fn test_state_from_bits() {
        assert_eq!(GeneratorState::from_bits(0), GeneratorState::Created);
        assert_eq!(GeneratorState::from_bits(1), GeneratorState::Running);
        assert_eq!(GeneratorState::from_bits(2), GeneratorState::Suspended);
        assert_eq!(GeneratorState::from_bits(3), GeneratorState::Completed);
        assert_eq!(GeneratorState::from_bits(4), GeneratorState::Errored);
    }

    #[test]
    fn test_state_from_bits_masks() {
        assert_eq!(GeneratorState::from_bits(0b1000), GeneratorState::Created);
        assert_eq!(GeneratorState::from_bits(0xFFFF_FFF2), GeneratorState::Suspended);
    }

    #[test]
    fn test_state_predicates() {
        assert!(GeneratorState::Created.is_resumable());
        assert!(GeneratorState::Suspended.is_resumable());
        assert!(!GeneratorState::Running.is_resumable());
        assert!(!GeneratorState::Completed.is_resumable());
        assert!(GeneratorState::Completed.is_finished());
        assert!(GeneratorState::Errored.is_finished());
        assert!(!GeneratorState::Suspended.is_finished());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(GeneratorState::Created.to_string(), "GEN_CREATED");
        assert_eq!(GeneratorState::Running.to_string(), "GEN_RUNNING");
        assert_eq!(GeneratorState::Suspended.to_string(), "GEN_SUSPENDED");
        assert_eq!(GeneratorState::Completed.to_string(), "GEN_CLOSED");
        assert_eq!(GeneratorState::Errored.to_string(), "GEN_CLOSED");
    }

    // ════════════════════════════════════════════════════════════════════════
    // GeneratorHeader Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_header_size() {
        assert_eq!(std::mem::size_of::<GeneratorHeader>(), 4);
    }

    #[test]
    fn test_header_lifecycle() {
        let header = GeneratorHeader::new();
        assert_eq!(header.try_start(), Some(GeneratorState::Created));
        assert!(header.is_running());
        assert_eq!(header.try_start(), None);

        header.suspend(7);
        assert_eq!(header.state_and_index(), (GeneratorState::Suspended, 7));
        assert_eq!(header.try_start(), Some(GeneratorState::Suspended));
        assert_eq!(header.resume_index(), 7);

        header.complete();
        assert!(header.is_finished());
        assert_eq!(header.resume_index(), 7);
        assert_eq!(header.try_start(), None);
    }

    #[test]
    fn test_header_fail() {
        let header = GeneratorHeader::new();
        header.try_start();
        header.fail();
        assert_eq!(header.state(), GeneratorState::Errored);
        assert_eq!(header.try_start(), None);
    }

    #[test]
    fn test_header_clamps_resume_index() {
        let header = GeneratorHeader::new();
        header.try_start();
        header.suspend(u32::MAX);
        assert_eq!(header.resume_index(), GeneratorHeader::MAX_RESUME_INDEX);
        assert_eq!(header.state(), GeneratorState::Suspended);
    }

    #[test]
    fn test_header_debug() {
        let header = GeneratorHeader::new();
        let text = format!("{header:?}");
        assert!(text.contains("Created"));
        assert!(text.contains("resume_index: 0"));
    }
}
