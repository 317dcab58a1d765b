//! Generator functions.

use super::object::Generator;
use crate::builder::{CodeBody, LayoutError};
use crate::config::GeneratorConfig;
use prism_core::{PrismError, PrismResult, Value};
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

/// A compiled generator function. Calling it creates a [`Generator`].
#[derive(Debug, Clone)]
pub struct GeneratorFunction {
    code: Rc<CodeBody>,
    config: GeneratorConfig,
}

impl GeneratorFunction {
    /// Wraps `code` with the default configuration.
    pub fn new(code: CodeBody) -> Result<Self, LayoutError> {
        Self::with_config(code, GeneratorConfig::default())
    }

    /// Wraps `code`, checking its slot layout against `config`.
    pub fn with_config(code: CodeBody, config: GeneratorConfig) -> Result<Self, LayoutError> {
        code.check_layout(config.max_slots)?;
        Ok(Self {
            code: Rc::new(code),
            config,
        })
    }

    /// Function name.
    #[inline]
    pub fn name(&self) -> &Arc<str> {
        self.code.name()
    }

    /// The compiled body.
    #[inline]
    pub fn code(&self) -> &Rc<CodeBody> {
        &self.code
    }

    /// Configuration inherited by every generator this function creates.
    #[inline]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Calls the function: binds `args` to the parameters and returns a
    /// generator in the `Created` state. The body does not run yet.
    pub fn call(&self, args: &[Value]) -> PrismResult<Rc<Generator>> {
        let expected = self.code.param_count();
        if args.len() > expected {
            return Err(PrismError::type_error(format!(
                "{}() takes {expected} positional argument{} but {} {} given",
                self.name(),
                if expected == 1 { "" } else { "s" },
                args.len(),
                if args.len() == 1 { "was" } else { "were" },
            )));
        }
        if args.len() < expected {
            let missing = &self.code.local_names()[args.len()..expected];
            let names = missing
                .iter()
                .map(|name| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(PrismError::type_error(format!(
                "{}() missing {} required positional argument{}: {names}",
                self.name(),
                missing.len(),
                if missing.len() == 1 { "" } else { "s" },
            )));
        }

        debug!(generator = %self.name(), args = args.len(), "creating generator");
        Ok(Rc::new(Generator::new(
            Rc::clone(&self.code),
            self.config.clone(),
            args,
        )))
    }
}
