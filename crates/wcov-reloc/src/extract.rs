//! Jump extraction.

use wcov_isa::Instructions;

use crate::{Jump, Result};

/// Extract every jump in `code`, ordered by offset.
///
/// Extension prefixes are folded into the operand; each jump's offset is the
/// position of its first prefix.
///
/// # Errors
///
/// Returns an error if `code` is not a well-formed instruction stream.
pub fn extract_jumps(code: &[u8]) -> Result<Vec<Jump>> {
    let mut jumps = Vec::new();
    for instr in Instructions::new(code) {
        let instr = instr?;
        if instr.opcode.is_jump() {
            jumps.push(Jump::new(instr.offset, instr.length, instr.opcode, instr.arg)?);
        }
    }
    Ok(jumps)
}
