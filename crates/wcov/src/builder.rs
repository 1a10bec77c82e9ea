//! Wordcode assembler.

use tracing::debug;
use wcov_isa::{JUMP_UNIT, Opcode, UNIT_SIZE, encode_argument_into, encoded_len};
use wcov_lines::{LineEntry, LineTableFormat, coalesce};
use wcov_reloc::RelocError;

use crate::{Code, Error, Result, UnitId};

/// A jump destination, bound to a position with [`CodeBuilder::bind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Label(usize);

#[derive(Clone, Copy, Debug)]
enum Item {
    Op { opcode: Opcode, arg: u32 },
    Jump { opcode: Opcode, label: Label },
}

/// Builder for [`Code`].
///
/// Instructions are attributed to the line set by the most recent
/// [`line`](Self::line) call (initially `first_line`). Jump operands are
/// sized when the unit is finished.
#[derive(Clone, Debug)]
pub struct CodeBuilder {
    id: UnitId,
    first_line: u32,
    format: LineTableFormat,
    items: Vec<(Item, Option<u32>)>,
    line: Option<u32>,
    /// Label -> index of the item it precedes.
    labels: Vec<Option<usize>>,
    consts: Vec<i64>,
    error: Option<Error>,
}

impl CodeBuilder {
    #[must_use]
    pub const fn new(id: UnitId, first_line: u32) -> Self {
        Self {
            id,
            first_line,
            format: LineTableFormat::B,
            items: Vec::new(),
            line: Some(first_line),
            labels: Vec::new(),
            consts: Vec::new(),
            error: None,
        }
    }

    /// Set the line table format.
    #[must_use]
    pub const fn with_format(mut self, format: LineTableFormat) -> Self {
        self.format = format;
        self
    }

    /// Attribute following instructions to `line`.
    pub const fn line(&mut self, line: u32) -> &mut Self {
        self.line = Some(line);
        self
    }

    /// Attribute following instructions to no line.
    pub const fn no_line(&mut self) -> &mut Self {
        self.line = None;
        self
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the next instruction.
    pub fn bind(&mut self, label: Label) -> &mut Self {
        let at = self.items.len();
        match self.labels.get_mut(label.0) {
            Some(slot) if slot.is_none() => *slot = Some(at),
            _ => self.fail(Error::LabelRebound(label.0)),
        }
        self
    }

    /// Index of `value` in the constant pool, adding it if needed.
    pub fn constant(&mut self, value: i64) -> u32 {
        let index = self
            .consts
            .iter()
            .position(|&c| c == value)
            .unwrap_or_else(|| {
                self.consts.push(value);
                self.consts.len() - 1
            });
        self.const_operand(index)
    }

    /// `index` as a `LOAD_CONST` operand. An index past the 32-bit operand
    /// range fails the builder.
    fn const_operand(&mut self, index: usize) -> u32 {
        u32::try_from(index).unwrap_or_else(|_| {
            self.fail(Error::TooManyConstants(index));
            0
        })
    }

    /// Append an instruction with a literal operand.
    pub fn emit(&mut self, opcode: Opcode, arg: u32) -> &mut Self {
        self.items.push((Item::Op { opcode, arg }, self.line));
        self
    }

    /// Append a jump to `label`.
    pub fn jump(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        if !opcode.is_jump() {
            self.fail(RelocError::NotAJump(opcode).into());
        }
        self.items.push((Item::Jump { opcode, label }, self.line));
        self
    }

    fn fail(&mut self, err: Error) {
        self.error.get_or_insert(err);
    }

    /// Size jumps, encode everything, and build the line table.
    ///
    /// # Errors
    ///
    /// Returns the first misuse recorded while building, an unbound label,
    /// a relative jump to a label behind it, or a line table the format
    /// cannot represent.
    pub fn finish(&self) -> Result<Code> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        let mut lengths = self
            .items
            .iter()
            .map(|(item, _)| match item {
                Item::Op { arg, .. } => encoded_len(u64::from(*arg), 0),
                Item::Jump { .. } => Ok(UNIT_SIZE),
            })
            .collect::<wcov_isa::Result<Vec<_>>>()?;

        // Lengths only grow, so this settles within one round per prefix a
        // jump can gain.
        let jumps = self
            .items
            .iter()
            .filter(|(item, _)| matches!(item, Item::Jump { .. }))
            .count();
        let max_rounds = 3 * jumps + 2;
        let mut rounds = 0;
        let (offsets, args) = loop {
            rounds += 1;
            if rounds > max_rounds {
                return Err(RelocError::Diverged(max_rounds).into());
            }
            let offsets = prefix_offsets(&lengths);
            let args = self.jump_args(&offsets, &lengths)?;

            let mut grew = false;
            for (i, arg) in args.iter().enumerate() {
                if let Some(arg) = *arg {
                    let needed = encoded_len(arg, lengths[i] / UNIT_SIZE - 1)?;
                    if needed > lengths[i] {
                        lengths[i] = needed;
                        grew = true;
                    }
                }
            }
            if !grew {
                break (offsets, args);
            }
        };

        let mut bytecode = Vec::with_capacity(offsets[self.items.len()]);
        for (i, (item, _)) in self.items.iter().enumerate() {
            let (opcode, arg) = match *item {
                Item::Op { opcode, arg } => (opcode, u64::from(arg)),
                Item::Jump { opcode, .. } => (opcode, args[i].unwrap_or_default()),
            };
            encode_argument_into(&mut bytecode, opcode, arg, lengths[i] / UNIT_SIZE - 1)?;
        }

        let entries: Vec<LineEntry> = self
            .items
            .iter()
            .enumerate()
            .map(|(i, (_, line))| LineEntry {
                start: offsets[i],
                end: offsets[i + 1],
                line: *line,
            })
            .collect();
        let line_table = self.format.encode(self.first_line, &coalesce(&entries))?;

        let names = self
            .items
            .iter()
            .filter_map(|(item, _)| match *item {
                Item::Op {
                    opcode: Opcode::LoadName | Opcode::StoreName,
                    arg,
                } => Some(arg as usize + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);

        debug!(
            unit = %self.id,
            bytes = bytecode.len(),
            jumps,
            rounds,
            "assembled"
        );

        Ok(Code {
            id: self.id.clone(),
            first_line: self.first_line,
            format: self.format,
            bytecode,
            line_table,
            consts: self.consts.clone(),
            names,
        })
    }

    /// Operand of every jump item for the given layout.
    fn jump_args(&self, offsets: &[usize], lengths: &[usize]) -> Result<Vec<Option<u64>>> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, (item, _))| -> Result<Option<u64>> {
                let Item::Jump { opcode, label } = *item else {
                    return Ok(None);
                };
                let bound = self
                    .labels
                    .get(label.0)
                    .copied()
                    .flatten()
                    .ok_or(Error::UnboundLabel(label.0))?;
                let target = offsets[bound];
                let units = if opcode.is_relative_jump() {
                    let origin = offsets[i] + lengths[i];
                    if target < origin {
                        return Err(RelocError::BackwardRelative {
                            offset: offsets[i],
                            target,
                        }
                        .into());
                    }
                    (target - origin) / JUMP_UNIT
                } else {
                    target / JUMP_UNIT
                };
                Ok(Some(units as u64))
            })
            .collect()
    }
}

fn prefix_offsets(lengths: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(lengths.len() + 1);
    let mut at = 0;
    offsets.push(at);
    for len in lengths {
        at += len;
        offsets.push(at);
    }
    offsets
}
