//! Generator engine configuration.

/// Configuration shared by every generator created from one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Run `close()` on suspended generators when they are dropped.
    pub finalize_on_drop: bool,
    /// Upper bound on each control-data array (flags, indices, iterators, exceptions).
    pub max_slots: usize,
    /// Emit a `trace` event on every suspend and resume.
    pub trace_resumes: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            finalize_on_drop: true,
            max_slots: 4096,
            trace_resumes: true,
        }
    }
}

impl GeneratorConfig {
    /// Create a configuration for testing (small slot budget, tracing on).
    pub fn for_testing() -> Self {
        Self {
            finalize_on_drop: true,
            max_slots: 256,
            trace_resumes: true,
        }
    }

    /// Create a configuration that leaves abandoned generators suspended.
    #[inline]
    pub fn without_finalizer() -> Self {
        Self {
            finalize_on_drop: false,
            ..Default::default()
        }
    }
}
