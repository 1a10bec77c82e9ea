//! Opcode table and jump classification.

use std::fmt;

/// Wordcode opcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x00,
    PopTop = 0x01,
    LoadConst = 0x02,
    LoadName = 0x03,
    StoreName = 0x04,

    BinaryAdd = 0x10,
    BinarySubtract = 0x11,
    InplaceAdd = 0x12,
    CompareOp = 0x13,

    /// Pops `n`, pushes an iterator over `0..n`.
    MakeRange = 0x20,
    /// Relative: on exhaustion pops the iterator and jumps past the loop.
    ForIter = 0x21,

    JumpForward = 0x30,
    JumpAbsolute = 0x31,
    PopJumpIfFalse = 0x32,
    PopJumpIfTrue = 0x33,
    ReturnValue = 0x3F,

    /// Coverage probe; behaves as a no-op when nothing listens.
    Probe = 0xFE,
    ExtendedArg = 0xFF,
}

impl Opcode {
    const ALL: [Self; 18] = [
        Self::Nop,
        Self::PopTop,
        Self::LoadConst,
        Self::LoadName,
        Self::StoreName,
        Self::BinaryAdd,
        Self::BinarySubtract,
        Self::InplaceAdd,
        Self::CompareOp,
        Self::MakeRange,
        Self::ForIter,
        Self::JumpForward,
        Self::JumpAbsolute,
        Self::PopJumpIfFalse,
        Self::PopJumpIfTrue,
        Self::ReturnValue,
        Self::Probe,
        Self::ExtendedArg,
    ];

    /// Jumps whose operand is a delta from the next instruction.
    #[must_use]
    pub const fn is_relative_jump(self) -> bool {
        matches!(self, Self::JumpForward | Self::ForIter)
    }

    /// Jumps whose operand is an absolute position.
    #[must_use]
    pub const fn is_absolute_jump(self) -> bool {
        matches!(
            self,
            Self::JumpAbsolute | Self::PopJumpIfFalse | Self::PopJumpIfTrue
        )
    }

    #[must_use]
    pub const fn is_jump(self) -> bool {
        self.is_relative_jump() || self.is_absolute_jump()
    }

    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::PopTop => "POP_TOP",
            Self::LoadConst => "LOAD_CONST",
            Self::LoadName => "LOAD_NAME",
            Self::StoreName => "STORE_NAME",
            Self::BinaryAdd => "BINARY_ADD",
            Self::BinarySubtract => "BINARY_SUBTRACT",
            Self::InplaceAdd => "INPLACE_ADD",
            Self::CompareOp => "COMPARE_OP",
            Self::MakeRange => "MAKE_RANGE",
            Self::ForIter => "FOR_ITER",
            Self::JumpForward => "JUMP_FORWARD",
            Self::JumpAbsolute => "JUMP_ABSOLUTE",
            Self::PopJumpIfFalse => "POP_JUMP_IF_FALSE",
            Self::PopJumpIfTrue => "POP_JUMP_IF_TRUE",
            Self::ReturnValue => "RETURN_VALUE",
            Self::Probe => "PROBE",
            Self::ExtendedArg => "EXTENDED_ARG",
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> Self {
        op as Self
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| *op as u8 == byte)
            .ok_or(byte)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Operand of [`Opcode::CompareOp`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Lt = 0,
    Le = 1,
    Eq = 2,
    Ne = 3,
    Gt = 4,
    Ge = 5,
}

impl CompareOp {
    #[must_use]
    pub const fn apply(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
        }
    }
}

impl From<CompareOp> for u32 {
    fn from(op: CompareOp) -> Self {
        op as Self
    }
}

impl TryFrom<u32> for CompareOp {
    type Error = u32;

    fn try_from(arg: u32) -> Result<Self, Self::Error> {
        match arg {
            0 => Ok(Self::Lt),
            1 => Ok(Self::Le),
            2 => Ok(Self::Eq),
            3 => Ok(Self::Ne),
            4 => Ok(Self::Gt),
            5 => Ok(Self::Ge),
            other => Err(other),
        }
    }
}
