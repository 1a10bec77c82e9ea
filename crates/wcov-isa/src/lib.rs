//! Wordcode instruction set definitions.
//!
//! Every instruction is a 2-byte `(opcode, operand)` unit. Operands wider than
//! a byte are carried by a chain of [`Opcode::ExtendedArg`] units immediately
//! preceding the real instruction, most significant byte first.

mod decode;
mod encode;
mod opcode;

pub use decode::*;
pub use encode::*;
pub use opcode::*;

use thiserror::Error;

/// Size of one instruction unit in bytes.
pub const UNIT_SIZE: usize = 2;

/// Jump operands count instruction units, not bytes.
///
/// A resolved byte target is `operand * JUMP_UNIT` (absolute) or
/// `next_instruction + operand * JUMP_UNIT` (relative).
pub const JUMP_UNIT: usize = 2;

/// Instruction set errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IsaError {
    #[error("operand {0:#x} does not fit a 32-bit extension chain")]
    OperandTooWide(u64),
    #[error("unknown opcode {byte:#04x} at offset {offset}")]
    UnknownOpcode { offset: usize, byte: u8 },
    #[error("instruction stream truncated at offset {0}")]
    Truncated(usize),
}

pub type Result<T> = std::result::Result<T, IsaError>;
