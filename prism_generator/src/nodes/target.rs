//! Assignment targets (`for x in`, `with ... as (a, b)`, `except E as e`).

use crate::context::ExecContext;
use crate::frame::LocalSlot;
use crate::signal::ExecResult;
use prism_core::protocol::{IterStep, get_iter, normalize_step};
use prism_core::{PrismError, Value};

/// Where a value is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A local variable.
    Local(LocalSlot),
    /// Iterable unpacking into nested targets.
    Unpack(Vec<Target>),
    /// `_`-style target that drops the value.
    Discard,
}

impl Target {
    /// Binds `value` to this target.
    pub fn bind(&self, ctx: &mut ExecContext, value: Value) -> ExecResult<()> {
        match self {
            Self::Local(slot) => {
                ctx.frame.store(*slot, value);
                Ok(())
            }
            Self::Discard => Ok(()),
            Self::Unpack(targets) => {
                let items = unpack(&value, targets.len())?;
                for (target, item) in targets.iter().zip(items) {
                    target.bind(ctx, item)?;
                }
                Ok(())
            }
        }
    }
}

fn unpack(value: &Value, expected: usize) -> ExecResult<Vec<Value>> {
    let items = match value.to_vec() {
        Some(items) => items,
        None => {
            let iter = get_iter(value)?;
            let mut items = Vec::with_capacity(expected);
            // Pull one past `expected` so an over-long iterator is detected.
            while items.len() <= expected {
                match normalize_step(iter.next_step())? {
                    IterStep::Yielded(item) => items.push(item),
                    IterStep::Returned(_) => break,
                }
            }
            items
        }
    };
    if items.len() < expected {
        return Err(PrismError::value_error(format!(
            "not enough values to unpack (expected {expected}, got {})",
            items.len()
        ))
        .into());
    }
    if items.len() > expected {
        return Err(
            PrismError::value_error(format!("too many values to unpack (expected {expected})"))
                .into(),
        );
    }
    Ok(items)
}
