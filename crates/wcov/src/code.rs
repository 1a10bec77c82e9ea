//! Compiled program units.

use std::fmt;

use wcov_lines::{LineEntry, LineTableFormat};

use crate::Result;

/// Identity of a program unit: its source file and qualified name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId {
    pub file: String,
    pub name: String,
}

impl UnitId {
    pub fn new(file: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.name)
    }
}

/// A compiled unit: instruction stream, encoded line table, and the pools
/// its operands index into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Code {
    pub id: UnitId,
    /// Line the table's deltas start from.
    pub first_line: u32,
    /// Wire format of `line_table`.
    pub format: LineTableFormat,
    pub bytecode: Vec<u8>,
    pub line_table: Vec<u8>,
    /// Constant pool for `LOAD_CONST`.
    pub consts: Vec<i64>,
    /// Number of name slots for `LOAD_NAME` / `STORE_NAME`.
    pub names: usize,
}

impl Code {
    /// Decode the line table against the instruction stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is malformed or does not cover the
    /// stream exactly.
    pub fn lines(&self) -> Result<Vec<LineEntry>> {
        Ok(self
            .format
            .decode(self.first_line, &self.line_table, self.bytecode.len())?)
    }
}
