//! Generator method implementations (`__next__`, `send`, `throw`, `close`).
//!
//! # Python Semantics
//!
//! ```python
//! def coroutine():
//!     received = yield 1
//!     if received:
//!         yield received * 2
//!
//! gen = coroutine()
//! next(gen)       # Start: yields 1
//! gen.send(10)    # Sends 10, yields 20
//! gen.close()     # Throws GeneratorExit, generator stops
//! ```
//!
//! Every method follows the same three steps: validate the state and move
//! to `Running` (`prepare_*`), run the body once with a resume payload, and
//! map the outcome back to a driver state.

use super::object::Generator;
use super::state::GeneratorState;
use crate::context::ResumePayload;
use crate::signal::Unwind;
use prism_core::protocol::IterStep;
use prism_core::{ExceptionObject, ExceptionRef, ExceptionTypeId, PrismError, PrismResult, Value};
use tracing::{debug, trace};

/// How one run of the body ended.
enum Outcome {
    Yielded(Value),
    Returned(Value),
    Raised(ExceptionRef),
    Failed(PrismError),
}

/// Applies PEP 479: a `StopIteration` escaping a generator body becomes a
/// `RuntimeError` caused by it.
fn stop_iteration_to_runtime_error(exc: ExceptionRef) -> ExceptionRef {
    if !exc.is_builtin(ExceptionTypeId::StopIteration) {
        return exc;
    }
    let error = ExceptionObject::builtin(
        ExceptionTypeId::RuntimeError,
        "generator raised StopIteration",
    );
    error.chain_context(&exc);
    error.set_cause(Some(exc));
    error
}

impl Generator {
    // ════════════════════════════════════════════════════════════════════════
    // Validation
    // ════════════════════════════════════════════════════════════════════════

    /// Moves a resumable generator to `Running`.
    fn prepare_resume(&self) -> PrismResult<GeneratorState> {
        match self.header.state() {
            GeneratorState::Running => Err(PrismError::GeneratorRunning),
            GeneratorState::Completed | GeneratorState::Errored => {
                Err(PrismError::GeneratorExhausted)
            }
            GeneratorState::Created | GeneratorState::Suspended => self
                .header
                .try_start()
                .ok_or(PrismError::GeneratorExhausted),
        }
    }

    /// Like [`prepare_resume`](Self::prepare_resume), but only `None` may be
    /// sent to a generator that has not started.
    fn prepare_send(&self, value: &Value) -> PrismResult<GeneratorState> {
        if self.header.state() == GeneratorState::Created && !value.is_none() {
            return Err(PrismError::CantSendNonNone);
        }
        self.prepare_resume()
    }

    // ════════════════════════════════════════════════════════════════════════
    // Running the Body
    // ════════════════════════════════════════════════════════════════════════

    /// Runs the body once. The header must already be `Running`.
    fn run(&self, payload: ResumePayload) -> Outcome {
        let Ok(mut ctx) = self.context.try_borrow_mut() else {
            return Outcome::Failed(PrismError::GeneratorRunning);
        };
        if self.config.trace_resumes {
            trace!(
                generator = %self.name(),
                resume_index = self.header.resume_index(),
                ?payload,
                "resuming generator"
            );
        }
        ctx.deliver(payload);
        let result = self.code.root().execute(&mut ctx);
        ctx.end_run();

        let outcome = match result {
            Ok(()) => Outcome::Returned(Value::None),
            Err(Unwind::Return(value)) => Outcome::Returned(value),
            Err(Unwind::Suspend(value)) => Outcome::Yielded(value),
            Err(Unwind::Exception(exc)) => Outcome::Raised(exc),
            Err(Unwind::Break | Unwind::Continue) => Outcome::Failed(PrismError::internal(
                "'break' or 'continue' escaped the generator body",
            )),
            Err(Unwind::Fatal(err)) => Outcome::Failed(err),
        };
        if let Outcome::Yielded(_) = &outcome {
            let index = ctx.control.last_yield_index();
            if self.config.trace_resumes {
                trace!(generator = %self.name(), resume_index = index, "generator suspended");
            }
            self.header.suspend(index);
        } else {
            self.release(&mut ctx);
        }
        outcome
    }

    /// Maps an outcome of `__next__`, `send` or `throw` to the caller's result.
    fn finish(&self, outcome: Outcome) -> PrismResult<IterStep> {
        match outcome {
            Outcome::Yielded(value) => Ok(IterStep::Yielded(value)),
            Outcome::Returned(value) => {
                self.header.complete();
                debug!(generator = %self.name(), "generator completed");
                Ok(IterStep::Returned(value))
            }
            Outcome::Raised(exc) => {
                self.header.fail();
                let exc = stop_iteration_to_runtime_error(exc);
                debug!(generator = %self.name(), exception = %exc, "generator raised");
                Err(PrismError::Exception(exc))
            }
            Outcome::Failed(err) => {
                self.header.fail();
                debug!(generator = %self.name(), error = %err, "generator failed");
                Err(err)
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Protocol Methods
    // ════════════════════════════════════════════════════════════════════════

    /// `next(gen)`: runs to the next suspend point.
    ///
    /// Returns [`IterStep::Returned`] carrying the return value when the
    /// body finishes.
    pub fn next_step(&self) -> PrismResult<IterStep> {
        self.prepare_resume()?;
        let outcome = self.run(ResumePayload::Next);
        self.finish(outcome)
    }

    /// `gen.send(value)`: the suspended yield evaluates to `value`.
    pub fn send(&self, value: Value) -> PrismResult<IterStep> {
        self.prepare_send(&value)?;
        let payload = if value.is_none() {
            ResumePayload::Next
        } else {
            ResumePayload::Send(value)
        };
        let outcome = self.run(payload);
        self.finish(outcome)
    }

    /// `gen.throw(exc)`: the suspended yield raises `exc`.
    ///
    /// A generator that never started is marked completed and `exc` is
    /// raised without running the body.
    pub fn throw(&self, exc: ExceptionRef) -> PrismResult<IterStep> {
        if self.prepare_resume()? == GeneratorState::Created {
            self.header.complete();
            if let Ok(mut ctx) = self.context.try_borrow_mut() {
                self.release(&mut ctx);
            }
            debug!(generator = %self.name(), exception = %exc, "throw into unstarted generator");
            return Err(PrismError::Exception(exc));
        }
        let outcome = self.run(ResumePayload::Throw(exc));
        self.finish(outcome)
    }

    /// `next(gen)` with Python's calling convention: a finished body raises
    /// `StopIteration` carrying the return value.
    pub fn resume(&self) -> PrismResult<Value> {
        match self.next_step()? {
            IterStep::Yielded(value) => Ok(value),
            IterStep::Returned(value) => {
                Err(PrismError::Exception(ExceptionObject::stop_iteration(value)))
            }
        }
    }

    /// `gen.close()`: raises `GeneratorExit` at the suspend point and lets
    /// the body unwind through its `finally` and `with` blocks.
    ///
    /// The body ending by return, `GeneratorExit` or `StopIteration` is a
    /// successful close. Yielding during the unwind is a protocol violation.
    pub fn close(&self) -> PrismResult<()> {
        if self.prepare_resume()? == GeneratorState::Created {
            self.header.complete();
            if let Ok(mut ctx) = self.context.try_borrow_mut() {
                self.release(&mut ctx);
            }
            debug!(generator = %self.name(), "closed unstarted generator");
            return Ok(());
        }

        let outcome = self.run(ResumePayload::Throw(ExceptionObject::generator_exit()));
        match outcome {
            Outcome::Yielded(value) => {
                self.header.fail();
                if let Ok(mut ctx) = self.context.try_borrow_mut() {
                    self.release(&mut ctx);
                }
                debug!(generator = %self.name(), %value, "generator yielded during close");
                Err(PrismError::YieldDuringClose)
            }
            Outcome::Returned(_) => {
                self.header.complete();
                debug!(generator = %self.name(), "generator closed");
                Ok(())
            }
            Outcome::Raised(exc)
                if exc.is_termination() || exc.is_builtin(ExceptionTypeId::StopIteration) =>
            {
                self.header.complete();
                debug!(generator = %self.name(), "generator closed");
                Ok(())
            }
            other => self.finish(other).map(|_| ()),
        }
    }
}
