//! Probe sites of an instrumented unit.

use rustc_hash::FxHashMap;
use tracing::trace;
use wcov_isa::{Opcode, UNIT_SIZE};

use crate::Code;

/// Lifecycle of a probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeState {
    /// `PROBE 0` is in the stream and reports when executed.
    Armed,
    /// Overwritten with `NOP 0`.
    Fired,
}

/// One inserted probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeSite {
    /// Offset of the `PROBE` instruction in the instrumented stream.
    pub offset: usize,
    pub line: u32,
    pub state: ProbeState,
}

/// An instrumented unit and its probes.
#[derive(Clone, Debug)]
pub struct Instrumented {
    pub code: Code,
    /// Ordered by offset.
    probes: Vec<ProbeSite>,
    /// Line -> indices into `probes`.
    by_line: FxHashMap<u32, Vec<usize>>,
}

impl Instrumented {
    pub(crate) fn new(code: Code, probes: Vec<ProbeSite>) -> Self {
        debug_assert!(probes.windows(2).all(|w| w[0].offset < w[1].offset));
        let mut by_line: FxHashMap<u32, Vec<usize>> = FxHashMap::default();
        for (i, probe) in probes.iter().enumerate() {
            by_line.entry(probe.line).or_default().push(i);
        }
        Self {
            code,
            probes,
            by_line,
        }
    }

    #[must_use]
    pub fn probes(&self) -> &[ProbeSite] {
        &self.probes
    }

    /// Probe whose `PROBE` instruction sits at `offset`.
    #[must_use]
    pub fn probe_at(&self, offset: usize) -> Option<&ProbeSite> {
        self.probes
            .binary_search_by_key(&offset, |p| p.offset)
            .ok()
            .map(|i| &self.probes[i])
    }

    /// Number of probes still armed.
    #[must_use]
    pub fn armed(&self) -> usize {
        self.probes
            .iter()
            .filter(|p| p.state == ProbeState::Armed)
            .count()
    }

    /// Overwrite every armed probe of `line` with `NOP 0`.
    ///
    /// Returns the number of probes disarmed; unknown lines and probes that
    /// already fired are left alone.
    pub fn disarm_line(&mut self, line: u32) -> usize {
        let Some(indices) = self.by_line.get(&line) else {
            return 0;
        };
        let mut disarmed = 0;
        for &i in indices {
            let probe = &mut self.probes[i];
            if probe.state == ProbeState::Fired {
                continue;
            }
            let at = probe.offset;
            self.code.bytecode[at..at + UNIT_SIZE].copy_from_slice(&[Opcode::Nop.into(), 0]);
            probe.state = ProbeState::Fired;
            disarmed += 1;
        }
        if disarmed > 0 {
            trace!(line, disarmed, "disarmed probes");
        }
        disarmed
    }
}

/// A unit with no probes.
impl From<Code> for Instrumented {
    fn from(code: Code) -> Self {
        Self::new(code, Vec::new())
    }
}
