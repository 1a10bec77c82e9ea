//! Instruction stream decoding.

use std::fmt::Write;

use crate::{IsaError, Opcode, Result, UNIT_SIZE};

/// A decoded instruction with its extension prefixes folded in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the first byte, including prefixes.
    pub offset: usize,
    /// Total length in bytes, including prefixes.
    pub length: usize,
    pub opcode: Opcode,
    /// Full operand reconstructed from the prefix chain.
    pub arg: u32,
}

impl Instruction {
    /// Number of extension prefixes in front of the real opcode.
    #[must_use]
    pub const fn ext_prefixes(&self) -> usize {
        self.length / UNIT_SIZE - 1
    }

    /// Offset of the real opcode byte.
    #[must_use]
    pub const fn opcode_offset(&self) -> usize {
        self.offset + self.length - UNIT_SIZE
    }

    /// Offset just past this instruction.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Iterator over the instructions of a wordcode stream.
///
/// Yields an error and stops on unknown opcodes, operands wider than 32 bits,
/// odd-length streams, and trailing prefixes with no instruction.
pub struct Instructions<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> Instructions<'a> {
    #[must_use]
    pub const fn new(code: &'a [u8]) -> Self {
        Self { code, pos: 0 }
    }

    fn fail(&mut self, err: IsaError) -> Option<Result<Instruction>> {
        self.pos = self.code.len();
        Some(Err(err))
    }
}

impl Iterator for Instructions<'_> {
    type Item = Result<Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.pos;
        let mut arg: u32 = 0;

        loop {
            let pos = self.pos;
            if pos >= self.code.len() {
                return if pos == start {
                    None
                } else {
                    self.fail(IsaError::Truncated(start))
                };
            }
            let Some(&[byte, operand]) = self.code.get(pos..pos + UNIT_SIZE) else {
                return self.fail(IsaError::Truncated(pos));
            };
            let Ok(opcode) = Opcode::try_from(byte) else {
                return self.fail(IsaError::UnknownOpcode { offset: pos, byte });
            };
            if arg > 0x00FF_FFFF {
                let wide = (u64::from(arg) << 8) | u64::from(operand);
                return self.fail(IsaError::OperandTooWide(wide));
            }
            arg = (arg << 8) | u32::from(operand);
            self.pos = pos + UNIT_SIZE;

            if opcode != Opcode::ExtendedArg {
                return Some(Ok(Instruction {
                    offset: start,
                    length: self.pos - start,
                    opcode,
                    arg,
                }));
            }
        }
    }
}

/// Render a listing of `code`, one instruction per line.
///
/// Decoding stops at the first malformed instruction, which is reported
/// in place.
#[must_use]
pub fn disassemble(code: &[u8]) -> String {
    let mut out = String::new();
    for instr in Instructions::new(code) {
        match instr {
            Ok(instr) => {
                let _ = writeln!(
                    out,
                    "{:>6} {:<18} {}",
                    instr.offset, instr.opcode, instr.arg
                );
            }
            Err(err) => {
                let _ = writeln!(out, "  <{err}>");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXT: u8 = Opcode::ExtendedArg as u8;
    const NOP: u8 = Opcode::Nop as u8;
    const JUMP: u8 = Opcode::JumpAbsolute as u8;

    #[test]
    fn test_decode_folds_prefixes() {
        let code = [NOP, 0, EXT, 0x01, EXT, 0x02, JUMP, 0x03, NOP, 0];
        let instrs: Vec<_> = Instructions::new(&code).collect::<Result<_>>().unwrap();

        assert_eq!(instrs.len(), 3);
        assert_eq!(
            instrs[1],
            Instruction {
                offset: 2,
                length: 6,
                opcode: Opcode::JumpAbsolute,
                arg: 0x01_0203,
            }
        );
        assert_eq!(instrs[1].ext_prefixes(), 2);
        assert_eq!(instrs[1].opcode_offset(), 6);
        assert_eq!(instrs[2].offset, instrs[1].end());
    }

    #[test]
    fn test_decode_errors() {
        let odd = [NOP, 0, NOP];
        let out: Vec<_> = Instructions::new(&odd).collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], Err(IsaError::Truncated(2)));

        let dangling = [NOP, 0, EXT, 1];
        let out: Vec<_> = Instructions::new(&dangling).collect();
        assert_eq!(out[1], Err(IsaError::Truncated(2)));

        let unknown = [0x7E, 0];
        let out: Vec<_> = Instructions::new(&unknown).collect();
        assert_eq!(
            out,
            [Err(IsaError::UnknownOpcode {
                offset: 0,
                byte: 0x7E
            })]
        );

        let wide = [EXT, 1, EXT, 0, EXT, 0, EXT, 0, JUMP, 0];
        let out: Vec<_> = Instructions::new(&wide).collect();
        assert!(matches!(out[0], Err(IsaError::OperandTooWide(_))));
    }

    #[test]
    fn test_zero_padding_beyond_four_groups() {
        let code = [EXT, 0, EXT, 0, EXT, 0, EXT, 0, JUMP, 0x42];
        let instrs: Vec<_> = Instructions::new(&code).collect::<Result<_>>().unwrap();
        assert_eq!(instrs[0].arg, 0x42);
        assert_eq!(instrs[0].length, 10);
    }

    #[test]
    fn test_disassemble() {
        let code = [NOP, 0, EXT, 1, JUMP, 0];
        let listing = disassemble(&code);
        assert!(listing.contains("NOP"));
        assert!(listing.contains("JUMP_ABSOLUTE"));
        assert!(listing.contains("256"));
    }
}
