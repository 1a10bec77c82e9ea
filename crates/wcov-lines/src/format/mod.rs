//! The two line-table wire formats.
//!
//! Format A stores, per entry, the distance from the previous entry's start
//! and the change of line number. It has no way to express "no line".
//!
//! Format B stores, per entry, the distance from the previous entry's end
//! (its length, for a partition) and the change from the last real line.
//! A line delta of -128 marks a range with no source line and leaves the
//! running line untouched.

use crate::{LineEntry, LineTableError, Result, check_partition, push_range};

/// Record bounds of a line-table format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatLimits {
    /// Largest address delta in one record.
    pub max_addr_delta: u8,
    /// Smallest line delta in one record.
    pub min_line_delta: i8,
    /// Largest line delta in one record.
    pub max_line_delta: i8,
    /// Reserved line delta marking a range with no source line.
    pub no_line: Option<i8>,
}

/// Line table wire format of a unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LineTableFormat {
    /// Start-relative records; no "no line" marker.
    A,
    /// End-relative records with a -128 "no line" sentinel.
    #[default]
    B,
}

impl LineTableFormat {
    #[must_use]
    pub const fn limits(self) -> FormatLimits {
        match self {
            Self::A => FormatLimits {
                max_addr_delta: 255,
                min_line_delta: -128,
                max_line_delta: 127,
                no_line: None,
            },
            Self::B => FormatLimits {
                max_addr_delta: 254,
                min_line_delta: -127,
                max_line_delta: 127,
                no_line: Some(-128),
            },
        }
    }

    /// Encode `entries` starting from `base_line`.
    ///
    /// # Errors
    ///
    /// Returns an error if `entries` do not partition a range starting at 0,
    /// or (format A) if an entry has no line.
    pub fn encode(self, base_line: u32, entries: &[LineEntry]) -> Result<Vec<u8>> {
        check_partition(entries)?;
        let mut out = Records {
            bytes: Vec::with_capacity(entries.len() * 2),
            limits: self.limits(),
        };
        match self {
            Self::A => out.encode_start_relative(base_line, entries)?,
            Self::B => out.encode_end_relative(base_line, entries),
        }
        Ok(out.bytes)
    }

    /// Decode `table` for a stream of `code_len` bytes.
    ///
    /// Zero-length ranges are dropped and neighbours sharing a line are
    /// merged.
    ///
    /// # Errors
    ///
    /// Returns an error if `table` has odd length, produces a line number
    /// outside `u32`, or does not cover exactly `code_len` bytes.
    pub fn decode(self, base_line: u32, table: &[u8], code_len: usize) -> Result<Vec<LineEntry>> {
        if table.len() % 2 != 0 {
            return Err(LineTableError::OddLength(table.len()));
        }
        let records = table
            .chunks_exact(2)
            .map(|r| (r[0], i8::from_ne_bytes([r[1]])));
        match self {
            Self::A => decode_start_relative(base_line, records, code_len),
            Self::B => decode_end_relative(base_line, records, code_len, self.limits()),
        }
    }
}

/// Encode `entries` in format A.
///
/// # Errors
///
/// See [`LineTableFormat::encode`].
pub fn encode_format_a(base_line: u32, entries: &[LineEntry]) -> Result<Vec<u8>> {
    LineTableFormat::A.encode(base_line, entries)
}

/// Encode `entries` in format B.
///
/// # Errors
///
/// See [`LineTableFormat::encode`].
pub fn encode_format_b(base_line: u32, entries: &[LineEntry]) -> Result<Vec<u8>> {
    LineTableFormat::B.encode(base_line, entries)
}

/// Decode a format A table.
///
/// # Errors
///
/// See [`LineTableFormat::decode`].
pub fn decode_format_a(base_line: u32, table: &[u8], code_len: usize) -> Result<Vec<LineEntry>> {
    LineTableFormat::A.decode(base_line, table, code_len)
}

/// Decode a format B table.
///
/// # Errors
///
/// See [`LineTableFormat::decode`].
pub fn decode_format_b(base_line: u32, table: &[u8], code_len: usize) -> Result<Vec<LineEntry>> {
    LineTableFormat::B.decode(base_line, table, code_len)
}

struct Records {
    bytes: Vec<u8>,
    limits: FormatLimits,
}

impl Records {
    fn push(&mut self, addr: usize, line: i64) {
        debug_assert!(addr <= usize::from(self.limits.max_addr_delta));
        debug_assert!(
            (line >= i64::from(self.limits.min_line_delta)
                && line <= i64::from(self.limits.max_line_delta))
                || Some(line) == self.limits.no_line.map(i64::from)
        );
        #[allow(clippy::cast_possible_truncation)]
        self.bytes
            .extend([addr as u8, (line as i8).to_ne_bytes()[0]]);
    }

    /// Split a line delta into in-range records, the first carrying `addr`.
    /// Returns the address and line delta left for the final record.
    fn split_line(&mut self, mut addr: usize, mut delta: i64) -> (usize, i64) {
        let max = i64::from(self.limits.max_line_delta);
        let min = i64::from(self.limits.min_line_delta);
        while delta > max {
            self.push(addr, max);
            addr = 0;
            delta -= max;
        }
        while delta < min {
            self.push(addr, min);
            addr = 0;
            delta -= min;
        }
        (addr, delta)
    }

    /// Split an address delta into in-range records, the first carrying
    /// `line`. Returns the address and line delta left for the final record.
    fn split_addr(&mut self, mut addr: usize, mut line: i64, continuation: i64) -> (usize, i64) {
        let max = usize::from(self.limits.max_addr_delta);
        while addr > max {
            self.push(max, line);
            line = continuation;
            addr -= max;
        }
        (addr, line)
    }

    fn encode_start_relative(&mut self, base_line: u32, entries: &[LineEntry]) -> Result<()> {
        let mut prev_start = 0;
        let mut prev_line = i64::from(base_line);
        for (index, entry) in entries.iter().enumerate() {
            let line = entry.line.ok_or(LineTableError::NoLineUnsupported(index))?;
            let (addr, _) = self.split_addr(entry.start - prev_start, 0, 0);
            let (addr, delta) = self.split_line(addr, i64::from(line) - prev_line);
            self.push(addr, delta);
            prev_start = entry.start;
            prev_line = i64::from(line);
        }
        Ok(())
    }

    fn encode_end_relative(&mut self, base_line: u32, entries: &[LineEntry]) {
        let mut prev_end = 0;
        let mut prev_line = i64::from(base_line);
        for entry in entries {
            let span = entry.end - prev_end;
            match entry.line {
                None => {
                    let sentinel = self.limits.no_line.map_or(0, i64::from);
                    let (addr, line) = self.split_addr(span, sentinel, sentinel);
                    self.push(addr, line);
                }
                Some(line) => {
                    let (_, delta) = self.split_line(0, i64::from(line) - prev_line);
                    let (addr, delta) = self.split_addr(span, delta, 0);
                    self.push(addr, delta);
                    prev_line = i64::from(line);
                }
            }
            prev_end = entry.end;
        }
    }
}

fn to_line(line: i64, record: usize) -> Result<u32> {
    u32::try_from(line).map_err(|_| LineTableError::LineOutOfRange(record))
}

fn decode_start_relative(
    base_line: u32,
    records: impl Iterator<Item = (u8, i8)>,
    code_len: usize,
) -> Result<Vec<LineEntry>> {
    let mut starts: Vec<(usize, u32)> = Vec::new();
    let mut line = i64::from(base_line);
    let mut last_line = None;
    let mut addr = 0;
    let mut count = 0;

    for (index, (addr_delta, line_delta)) in records.enumerate() {
        if addr_delta != 0 {
            if last_line != Some(line) {
                starts.push((addr, to_line(line, index)?));
                last_line = Some(line);
            }
            addr += usize::from(addr_delta);
        }
        line += i64::from(line_delta);
        count = index + 1;
    }
    if last_line != Some(line) {
        starts.push((addr, to_line(line, count)?));
    }
    if addr > code_len {
        return Err(LineTableError::LengthMismatch {
            end: addr,
            code_len,
        });
    }

    let mut entries = Vec::with_capacity(starts.len());
    for (i, &(start, line)) in starts.iter().enumerate() {
        let end = starts.get(i + 1).map_or(code_len, |&(next, _)| next);
        if end > start {
            entries.push(LineEntry::new(start, end, line));
        }
    }
    Ok(entries)
}

fn decode_end_relative(
    base_line: u32,
    records: impl Iterator<Item = (u8, i8)>,
    code_len: usize,
    limits: FormatLimits,
) -> Result<Vec<LineEntry>> {
    let mut entries = Vec::new();
    let mut line = i64::from(base_line);
    let mut addr = 0;

    for (index, (addr_delta, line_delta)) in records.enumerate() {
        let range_line = if Some(line_delta) == limits.no_line {
            None
        } else {
            line += i64::from(line_delta);
            Some(to_line(line, index)?)
        };
        let end = addr + usize::from(addr_delta);
        if end > addr {
            push_range(
                &mut entries,
                LineEntry {
                    start: addr,
                    end,
                    line: range_line,
                },
            );
        }
        addr = end;
    }
    if addr != code_len {
        return Err(LineTableError::LengthMismatch {
            end: addr,
            code_len,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests;
