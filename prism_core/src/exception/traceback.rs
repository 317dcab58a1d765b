//! Traceback frame information.
//!
//! A traceback records where an exception was raised. Entries are appended
//! when an exception is raised fresh; a bare `raise` re-raises without
//! touching them, so the original throw site survives reraises and
//! generator suspensions.

use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Number of frames stored inline.
const INLINE_FRAMES: usize = 4;

/// A single entry in a traceback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    /// Name of the function (generator) that raised.
    pub func_name: Arc<str>,
    /// Line number, 0 when unknown.
    pub line: u32,
}

impl FrameInfo {
    /// Creates a new frame info.
    #[inline]
    pub fn new(func_name: impl Into<Arc<str>>, line: u32) -> Self {
        Self {
            func_name: func_name.into(),
            line,
        }
    }
}

/// Python traceback, most recent frame last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Traceback {
    frames: SmallVec<[FrameInfo; INLINE_FRAMES]>,
}

impl Traceback {
    /// Creates an empty traceback.
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if the traceback has no frames.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Returns the number of frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Appends a frame.
    #[inline]
    pub fn push(&mut self, frame: FrameInfo) {
        self.frames.push(frame);
    }

    /// Returns the frames, oldest first.
    #[inline]
    pub fn frames(&self) -> &[FrameInfo] {
        &self.frames
    }

    /// Returns the most recent frame.
    #[inline]
    pub fn innermost(&self) -> Option<&FrameInfo> {
        self.frames.last()
    }
}

impl fmt::Display for Traceback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Traceback (most recent call last):")?;
        for frame in &self.frames {
            if frame.line == 0 {
                writeln!(f, "  in {}", frame.func_name)?;
            } else {
                writeln!(f, "  line {}, in {}", frame.line, frame.func_name)?;
            }
        }
        Ok(())
    }
}
