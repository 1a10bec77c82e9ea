//! Operand encoding with extension-prefix chains.

use crate::{IsaError, Opcode, Result, UNIT_SIZE};

/// Maximum number of extension prefixes a 32-bit operand needs.
pub const MAX_EXT_PREFIXES: usize = 3;

/// Number of 8-bit groups needed to carry `operand` (at least one).
#[must_use]
pub fn operand_groups(operand: u32) -> usize {
    let bytes = operand.to_be_bytes();
    bytes
        .iter()
        .position(|&b| b != 0)
        .map_or(1, |first| bytes.len() - first)
}

/// Encoded size in bytes of `opcode operand` with at least `min_ext` prefixes.
///
/// # Errors
///
/// Returns [`IsaError::OperandTooWide`] if `operand` exceeds 32 bits.
pub fn encoded_len(operand: u64, min_ext: usize) -> Result<usize> {
    let operand = u32::try_from(operand).map_err(|_| IsaError::OperandTooWide(operand))?;
    Ok(UNIT_SIZE * operand_groups(operand).max(min_ext + 1))
}

/// Encode `opcode` with `operand`, padding with zero-valued prefixes up to
/// `min_ext` so a previously observed instruction length can be kept.
///
/// Groups are emitted most significant first; the real opcode carries the
/// least significant byte.
///
/// # Errors
///
/// Returns [`IsaError::OperandTooWide`] if `operand` exceeds 32 bits.
pub fn encode_argument(opcode: Opcode, operand: u64, min_ext: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_argument_into(&mut out, opcode, operand, min_ext)?;
    Ok(out)
}

/// Append the encoding of `opcode operand` to `out`.
///
/// # Errors
///
/// Returns [`IsaError::OperandTooWide`] if `operand` exceeds 32 bits.
pub fn encode_argument_into(
    out: &mut Vec<u8>,
    opcode: Opcode,
    operand: u64,
    min_ext: usize,
) -> Result<()> {
    let operand = u32::try_from(operand).map_err(|_| IsaError::OperandTooWide(operand))?;
    let bytes = operand.to_be_bytes();
    let natural = operand_groups(operand);
    let padding = (min_ext + 1).saturating_sub(natural);

    out.reserve(UNIT_SIZE * (natural + padding));
    for _ in 0..padding {
        out.extend([Opcode::ExtendedArg.into(), 0]);
    }
    let (high, low) = bytes[bytes.len() - natural..].split_at(natural - 1);
    for &group in high {
        out.extend([Opcode::ExtendedArg.into(), group]);
    }
    out.extend([opcode.into(), low[0]]);
    Ok(())
}
