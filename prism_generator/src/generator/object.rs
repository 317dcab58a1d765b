//! Generator object.
//!
//! A `Generator` is one activation of a [`CodeBody`]. It owns everything the
//! activation needs across suspensions:
//!
//! - the tagged [`GeneratorHeader`] (driver state + last suspend point)
//! - the [`ExecContext`]: the frame holding locals and the control data
//!   the resumable constructs record their positions in
//!
//! The body itself is shared with every other activation of the function.

use super::state::{GeneratorHeader, GeneratorState};
use crate::builder::CodeBody;
use crate::config::GeneratorConfig;
use crate::context::ExecContext;
use crate::control::{ControlData, SlotLayout};
use crate::frame::{Frame, LocalSlot};
use prism_core::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};

/// A Python generator object.
pub struct Generator {
    pub(super) header: GeneratorHeader,
    pub(super) code: Rc<CodeBody>,
    pub(super) config: GeneratorConfig,
    pub(super) context: RefCell<ExecContext>,
}

impl Generator {
    pub(super) fn new(code: Rc<CodeBody>, config: GeneratorConfig, args: &[Value]) -> Self {
        let mut frame = Frame::new(Rc::clone(code.local_names()));
        for (index, arg) in args.iter().enumerate() {
            frame.store(LocalSlot::new(index as u32), arg.clone());
        }
        let control = ControlData::with_layout(code.layout(), config.max_slots);
        let context = ExecContext::new(Arc::clone(code.name()), frame, control);
        Self {
            header: GeneratorHeader::new(),
            code,
            config,
            context: RefCell::new(context),
        }
    }

    /// Function name.
    #[inline]
    pub fn name(&self) -> &Arc<str> {
        self.code.name()
    }

    /// Current driver state.
    #[inline]
    pub fn state(&self) -> GeneratorState {
        self.header.state()
    }

    /// Returns true while the body is executing.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.header.is_running()
    }

    /// Returns true once the generator completed or failed.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.header.is_finished()
    }

    /// Identifier of the suspend point the generator last stopped at.
    #[inline]
    pub fn resume_index(&self) -> u32 {
        self.header.resume_index()
    }

    /// Configuration inherited from the generator function.
    #[inline]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Current size of the control-data arrays; all zero once finished.
    ///
    /// Returns `None` while the body is executing.
    pub fn control_footprint(&self) -> Option<SlotLayout> {
        self.context
            .try_borrow()
            .ok()
            .map(|ctx| ctx.control.footprint())
    }

    /// Reads a local variable; `None` while running or when unbound.
    pub fn local(&self, name: &str) -> Option<Value> {
        let ctx = self.context.try_borrow().ok()?;
        let index = self.code.local_names().iter().position(|n| &**n == name)?;
        ctx.frame.get(LocalSlot::new(index as u32)).cloned()
    }

    /// Drops the activation's state once the generator is finished.
    pub(super) fn release(&self, ctx: &mut ExecContext) {
        ctx.control.release();
        ctx.frame.clear();
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("name", self.name())
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        if !self.config.finalize_on_drop || self.header.state() != GeneratorState::Suspended {
            return;
        }
        debug!(generator = %self.name(), "finalizing abandoned generator");
        if let Err(err) = self.close() {
            warn!(generator = %self.name(), error = %err, "generator finalization failed");
        }
    }
}
