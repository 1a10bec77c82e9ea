//! Relocation-aware model of one jump instruction.

use wcov_isa::{JUMP_UNIT, Opcode, UNIT_SIZE, encode_argument_into, encoded_len};

use crate::{RelocError, Result};

/// One jump instruction, its position, and its resolved target.
///
/// `offset` is the first byte of the instruction including its extension
/// prefixes; the real opcode sits at `offset + length - 2`. `length` never
/// shrinks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Jump {
    pub offset: usize,
    pub length: usize,
    pub opcode: Opcode,
    pub is_relative: bool,
    arg: u64,
    target: usize,
}

impl Jump {
    /// Model the jump `opcode arg` encoded in `length` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`RelocError::NotAJump`] if `opcode` does not jump.
    pub fn new(offset: usize, length: usize, opcode: Opcode, arg: u32) -> Result<Self> {
        if !opcode.is_jump() {
            return Err(RelocError::NotAJump(opcode));
        }
        debug_assert!(length >= UNIT_SIZE && length % UNIT_SIZE == 0);

        let is_relative = opcode.is_relative_jump();
        let delta = arg as usize * JUMP_UNIT;
        let target = if is_relative {
            offset + length + delta
        } else {
            delta
        };
        Ok(Self {
            offset,
            length,
            opcode,
            is_relative,
            arg: u64::from(arg),
            target,
        })
    }

    /// Resolved absolute byte target.
    #[must_use]
    pub const fn target(&self) -> usize {
        self.target
    }

    /// Encoded operand, in jump units.
    #[must_use]
    pub const fn arg(&self) -> u64 {
        self.arg
    }

    /// Extension prefixes currently in front of the opcode.
    #[must_use]
    pub const fn ext_prefixes(&self) -> usize {
        self.length / UNIT_SIZE - 1
    }

    /// Account for `len` bytes inserted at `at`.
    ///
    /// An insertion at or before the instruction pushes it forward. An
    /// insertion exactly at the target lands in front of the destination and
    /// does not move it; only a strictly earlier one does.
    pub fn adjust(&mut self, at: usize, len: usize) {
        if at <= self.offset {
            self.offset += len;
        }
        if at < self.target {
            self.target += len;
        }
        self.arg = self.derive_arg();
    }

    /// Grow the encoding to fit the current operand and return the growth.
    ///
    /// The previous prefix count is kept as a minimum, so the length never
    /// shrinks. Growth counts as bytes inserted at this jump's own offset: the
    /// jump stays put and a forward target moves with it. The caller must
    /// apply the same insertion to every other jump.
    ///
    /// # Errors
    ///
    /// Returns an error if the operand no longer fits 32 bits.
    pub fn adjust_length(&mut self) -> Result<usize> {
        let needed = encoded_len(self.arg, self.ext_prefixes())?;
        let growth = needed.saturating_sub(self.length);
        if growth > 0 {
            self.length = needed;
            if self.target > self.offset {
                self.target += growth;
            }
            self.arg = self.derive_arg();
        }
        Ok(growth)
    }

    /// Append the encoding of this jump, exactly `length` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the operand exceeds 32 bits.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        encode_argument_into(out, self.opcode, self.arg, self.ext_prefixes())?;
        Ok(())
    }

    fn derive_arg(&self) -> u64 {
        let base = if self.is_relative {
            self.offset + self.length
        } else {
            0
        };
        debug_assert!(self.target >= base, "relative jump behind its origin");
        (self.target.saturating_sub(base) / JUMP_UNIT) as u64
    }
}
