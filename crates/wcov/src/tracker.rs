//! Probe trigger: record the line, then disarm.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::{CoverageStore, InstrumentConfig, Instrumented, LiveUnit};

/// Handles probe hits for any number of units, writing into one store.
#[derive(Debug, Clone)]
pub struct Tracker {
    store: Arc<CoverageStore>,
    config: InstrumentConfig,
}

impl Tracker {
    #[must_use]
    pub const fn new(store: Arc<CoverageStore>, config: InstrumentConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<CoverageStore> {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    /// The probe at `offset` of `unit` executed.
    ///
    /// Records the probe's line and, when configured, disarms every probe of
    /// that line. Returns the line, or `None` if no probe sits at `offset`.
    pub fn hit(&self, unit: &LiveUnit, offset: usize) -> Option<u32> {
        if !self.config.disarm_on_hit {
            return self.record(&unit.snapshot(), offset);
        }
        unit.update(|current| {
            let line = self.record(current, offset)?;
            current.disarm_line(line);
            Some(line)
        })
    }

    fn record(&self, unit: &Instrumented, offset: usize) -> Option<u32> {
        let Some(probe) = unit.probe_at(offset) else {
            warn!(unit = %unit.code.id, offset, "hit at offset with no probe");
            return None;
        };
        if self.store.record(&unit.code.id, probe.line) {
            trace!(unit = %unit.code.id, line = probe.line, "line covered");
        }
        Some(probe.line)
    }
}
