//! Execution context threaded through every node.
//!
//! Nodes are shared between activations, so each call receives the
//! activation's mutable state explicitly: its [`Frame`], its
//! [`ControlData`], the payload the driver delivered with the current
//! resume, and the stack of exceptions currently being handled (used for
//! implicit chaining and bare `raise`).

use crate::control::ControlData;
use crate::frame::Frame;
use prism_core::{ExceptionRef, Value};
use smallvec::SmallVec;
use std::sync::Arc;

/// What the caller delivered with a resume.
#[derive(Debug, Clone)]
pub enum ResumePayload {
    /// `next()`: the yield expression evaluates to `None`.
    Next,
    /// `send(value)`: the yield expression evaluates to `value`.
    Send(Value),
    /// `throw(exc)`: the yield expression raises `exc`.
    Throw(ExceptionRef),
}

/// Mutable state of one activation, handed to every node.
#[derive(Debug)]
pub struct ExecContext {
    /// Local variables.
    pub frame: Frame,
    /// Resumption state of the resumable constructs.
    pub control: ControlData,
    payload: Option<ResumePayload>,
    handled: SmallVec<[ExceptionRef; 4]>,
    name: Arc<str>,
}

impl ExecContext {
    /// Creates the context of a fresh activation.
    pub fn new(name: Arc<str>, frame: Frame, control: ControlData) -> Self {
        Self {
            frame,
            control,
            payload: None,
            handled: SmallVec::new(),
            name,
        }
    }

    /// Name of the generator function, used for tracebacks.
    #[inline]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    // ════════════════════════════════════════════════════════════════════════
    // Resume Payload
    // ════════════════════════════════════════════════════════════════════════

    /// Installs the payload for the suspended yield point to consume.
    #[inline]
    pub fn deliver(&mut self, payload: ResumePayload) {
        self.payload = Some(payload);
    }

    /// Consumes the payload. `None` means the resume carried nothing.
    #[inline]
    pub fn take_payload(&mut self) -> Option<ResumePayload> {
        self.payload.take()
    }

    // ════════════════════════════════════════════════════════════════════════
    // Handled Exceptions
    // ════════════════════════════════════════════════════════════════════════

    /// Marks `exc` as being handled by the handler about to run.
    #[inline]
    pub fn push_handled(&mut self, exc: ExceptionRef) {
        self.handled.push(exc);
    }

    /// Ends the innermost handler.
    #[inline]
    pub fn pop_handled(&mut self) {
        self.handled.pop();
    }

    /// The exception the innermost running handler is processing.
    #[inline]
    pub fn current_handled(&self) -> Option<&ExceptionRef> {
        self.handled.last()
    }

    /// Depth of the handled-exception stack.
    #[inline]
    pub fn handled_depth(&self) -> usize {
        self.handled.len()
    }

    /// Drops all per-resume state. Called by the driver after each run.
    pub fn end_run(&mut self) {
        self.payload = None;
        self.handled.clear();
    }
}
