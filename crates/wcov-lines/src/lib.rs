//! Line-number tables for wordcode units.
//!
//! A unit's debug line table maps byte ranges of its instruction stream to
//! source lines. Two wire formats exist; both store repeated
//! `(address_delta: u8, line_delta: i8)` records starting from a base line,
//! and differ in what the deltas are relative to and how overflow is split.

mod entry;
mod format;

pub use entry::*;
pub use format::*;

use thiserror::Error;

/// Line table errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineTableError {
    #[error("first line entry starts at {0}, not at 0")]
    NotAtZero(usize),
    #[error("line entry {index} starts at {start}, previous entry ends at {expected}")]
    Discontiguous {
        index: usize,
        start: usize,
        expected: usize,
    },
    #[error("line entry {index} ends before it starts ({start}..{end})")]
    Inverted {
        index: usize,
        start: usize,
        end: usize,
    },
    #[error("line table covers {end} bytes, code is {code_len} bytes")]
    LengthMismatch { end: usize, code_len: usize },
    #[error("format A cannot represent line entry {0} without a line number")]
    NoLineUnsupported(usize),
    #[error("encoded line table has odd length {0}")]
    OddLength(usize),
    #[error("line number out of range at record {0}")]
    LineOutOfRange(usize),
}

pub type Result<T> = std::result::Result<T, LineTableError>;
