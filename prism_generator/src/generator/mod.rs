//! Generator driver.
//!
//! A [`GeneratorFunction`] wraps a compiled body; calling it creates a
//! [`Generator`], one activation with its own frame and control data. The
//! driver methods (`next_step`, `send`, `throw`, `close`) run the body from
//! its last suspend point to the next one.
//!
//! # States
//!
//! ```text
//! Created ──next/send(None)──▶ Running ──yield──▶ Suspended
//!    │                           │  ▲                 │
//!    │ throw/close               │  └─────resume──────┘
//!    ▼                           ├──return──▶ Completed
//! Completed                      └──raise───▶ Errored
//! ```

mod function;
mod iterator;
mod methods;
mod object;
mod state;

pub use function::GeneratorFunction;
pub use iterator::GeneratorIter;
pub use object::Generator;
pub use state::{GeneratorHeader, GeneratorState};
