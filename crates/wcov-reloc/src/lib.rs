//! Jump extraction and relocation.
//!
//! Growing a wordcode stream moves every instruction behind the insertion
//! point, which invalidates the operands of jumps that cross it. Re-encoding a
//! jump may in turn need more extension prefixes, which is itself an insertion.
//! [`Relocator`] resolves this to a fixed point and materializes the grown
//! stream.

mod extract;
mod jump;
mod relocator;

pub use extract::*;
pub use jump::*;
pub use relocator::*;

use thiserror::Error;
use wcov_isa::{IsaError, Opcode};

/// Relocation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelocError {
    #[error(transparent)]
    Isa(#[from] IsaError),
    #[error("{0} is not a jump")]
    NotAJump(Opcode),
    #[error("relative jump at {offset} targets {target}, which is behind it")]
    BackwardRelative { offset: usize, target: usize },
    #[error("offset {0} is not an instruction boundary")]
    NotInstructionBoundary(usize),
    #[error("insertion at {offset} is not after the previous insertion at {previous}")]
    UnorderedInsertion { offset: usize, previous: usize },
    #[error("relocation did not converge after {0} sweeps")]
    Diverged(usize),
    #[error("materialized jump at {actual}, relocation expected {expected}")]
    Inconsistent { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, RelocError>;
