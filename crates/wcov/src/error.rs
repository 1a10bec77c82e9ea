use thiserror::Error;

use crate::VmError;

/// Coverage engine errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("instruction error: {0}")]
    Isa(#[from] wcov_isa::IsaError),
    #[error("line table error: {0}")]
    LineTable(#[from] wcov_lines::LineTableError),
    #[error("relocation error: {0}")]
    Reloc(#[from] wcov_reloc::RelocError),
    #[error("execution error: {0}")]
    Vm(#[from] VmError),
    #[error("label {0} is used but never bound")]
    UnboundLabel(usize),
    #[error("label {0} is bound twice")]
    LabelRebound(usize),
    #[error("constant index {0} does not fit an operand")]
    TooManyConstants(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
