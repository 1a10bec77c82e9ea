//! Probe insertion and removal.

use std::collections::BTreeSet;

use tracing::{debug, trace_span};
use wcov_isa::{Opcode, encode_argument};
use wcov_lines::{LineEntry, line_starts};
use wcov_reloc::{Relocator, map_position};

use crate::{Code, Instrumented, ProbeSite, ProbeState, Result};

/// Insert a `PROBE 0` at the start of every line of `code`.
///
/// Jumps are relocated and widened as needed so they keep reaching the same
/// instructions; a jump to the first instruction of a line lands on that
/// line's probe. The line table is rewritten in the unit's own format.
///
/// # Errors
///
/// Returns an error if the line table or instruction stream is malformed, or
/// if relocation fails.
pub fn instrument(code: &Code) -> Result<Instrumented> {
    let _span = trace_span!("instrument", unit = %code.id).entered();
    let entries = code.lines()?;
    let probe = encode_argument(Opcode::Probe, 0, 0)?;

    let mut relocator = Relocator::new(&code.bytecode)?;
    for (start, _) in line_starts(&entries) {
        relocator.insert_before(start, probe.clone())?;
    }
    let relocated = relocator.finish()?;

    let map = |p: usize| {
        relocated
            .map(p)
            .unwrap_or_else(|| map_position(&relocated.history, p))
    };
    let moved: Vec<LineEntry> = entries
        .iter()
        .map(|e| LineEntry {
            start: map(e.start),
            end: map(e.end),
            line: e.line,
        })
        .collect();
    let line_table = code.format.encode(code.first_line, &moved)?;

    let probes: Vec<ProbeSite> = line_starts(&moved)
        .map(|(offset, line)| ProbeSite {
            offset,
            line,
            state: ProbeState::Armed,
        })
        .collect();

    debug!(
        unit = %code.id,
        probes = probes.len(),
        jumps = relocated.jumps.len(),
        from = code.bytecode.len(),
        to = relocated.code.len(),
        "instrumented"
    );

    let instrumented = Code {
        id: code.id.clone(),
        first_line: code.first_line,
        format: code.format,
        bytecode: relocated.code,
        line_table,
        consts: code.consts.clone(),
        names: code.names,
    };
    Ok(Instrumented::new(instrumented, probes))
}

/// Disarm every probe whose line is in `lines`.
///
/// Probes are overwritten with `NOP 0` in place; nothing moves. Returns the
/// number of probes disarmed.
pub fn deinstrument(unit: &mut Instrumented, lines: &BTreeSet<u32>) -> usize {
    let disarmed = lines.iter().map(|&line| unit.disarm_line(line)).sum::<usize>();
    debug!(unit = %unit.code.id, lines = lines.len(), disarmed, "deinstrumented");
    disarmed
}
