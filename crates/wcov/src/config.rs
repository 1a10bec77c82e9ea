//! Instrumentation configuration.

/// Default interpreter step budget.
pub const DEFAULT_MAX_STEPS: u64 = 1 << 26;

/// Instrumentation and execution configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrumentConfig {
    /// Overwrite a line's probes with `NOP` once the line has been recorded.
    pub disarm_on_hit: bool,
    /// Maximum instructions the interpreter executes per run.
    pub max_steps: u64,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            disarm_on_hit: true,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl InstrumentConfig {
    /// Set whether probes are disarmed once their line is recorded.
    #[must_use]
    pub const fn with_disarm_on_hit(mut self, disarm: bool) -> Self {
        self.disarm_on_hit = disarm;
        self
    }

    #[must_use]
    pub const fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }
}
