//! Decoded line entries.

use crate::{LineTableError, Result};

/// A contiguous byte range mapped to one source line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LineEntry {
    /// Start offset (inclusive).
    pub start: usize,
    /// End offset (exclusive).
    pub end: usize,
    /// Source line, or `None` for code with no associated line.
    pub line: Option<u32>,
}

impl LineEntry {
    #[must_use]
    pub const fn new(start: usize, end: usize, line: u32) -> Self {
        Self {
            start,
            end,
            line: Some(line),
        }
    }

    /// An entry for code with no source line.
    #[must_use]
    pub const fn no_line(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            line: None,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Check that `entries` partition `[0, end)` and return `end`.
///
/// # Errors
///
/// Returns an error if the first entry does not start at 0, if an entry is
/// inverted, or if two entries leave a gap or overlap.
pub fn check_partition(entries: &[LineEntry]) -> Result<usize> {
    let mut expected = 0;
    for (index, entry) in entries.iter().enumerate() {
        if entry.end < entry.start {
            return Err(LineTableError::Inverted {
                index,
                start: entry.start,
                end: entry.end,
            });
        }
        if entry.start != expected {
            return Err(if index == 0 {
                LineTableError::NotAtZero(entry.start)
            } else {
                LineTableError::Discontiguous {
                    index,
                    start: entry.start,
                    expected,
                }
            });
        }
        expected = entry.end;
    }
    Ok(expected)
}

/// Check that `entries` partition exactly `[0, code_len)`.
///
/// # Errors
///
/// Returns an error if the partition is malformed or does not end at
/// `code_len`.
pub fn validate(entries: &[LineEntry], code_len: usize) -> Result<()> {
    let end = check_partition(entries)?;
    if end != code_len {
        return Err(LineTableError::LengthMismatch { end, code_len });
    }
    Ok(())
}

/// Drop empty entries and merge neighbours that share a line.
///
/// This is the shape both decoders produce.
#[must_use]
pub fn coalesce(entries: &[LineEntry]) -> Vec<LineEntry> {
    let mut out: Vec<LineEntry> = Vec::with_capacity(entries.len());
    for entry in entries.iter().filter(|e| !e.is_empty()) {
        push_range(&mut out, *entry);
    }
    out
}

/// Append `entry`, extending the last entry when it is adjacent and has the
/// same line.
pub(crate) fn push_range(out: &mut Vec<LineEntry>, entry: LineEntry) {
    match out.last_mut() {
        Some(last) if last.end == entry.start && last.line == entry.line => {
            last.end = entry.end;
        }
        _ => out.push(entry),
    }
}

/// `(start, line)` for each non-empty entry that has a source line.
pub fn line_starts(entries: &[LineEntry]) -> impl Iterator<Item = (usize, u32)> + '_ {
    entries
        .iter()
        .filter(|e| !e.is_empty())
        .filter_map(|e| e.line.map(|line| (e.start, line)))
}
