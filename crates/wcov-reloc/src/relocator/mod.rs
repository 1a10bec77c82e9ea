//! Insertion and relocation fixed point.
//!
//! Insertions are recorded as an ordered history of [`Insertion`] events,
//! each expressed in the coordinates of the stream as it stood after the
//! events before it. Every event is applied to every jump; jumps whose
//! operands then outgrow their encoding grow in place, and that growth is
//! recorded as one more event. The loop ends when a full sweep grows nothing.

use rustc_hash::FxHashMap;
use tracing::{debug, trace, trace_span};
use wcov_isa::{Instruction, Instructions, UNIT_SIZE};

use crate::{Jump, RelocError, Result};

/// `len` bytes inserted at `at`, in the coordinates of the stream at that
/// point of the history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Insertion {
    pub at: usize,
    pub len: usize,
}

/// Map a position forward through an insertion history.
///
/// A position moves only for insertions strictly before it, so an insertion
/// exactly at a boundary stays with the code that starts there.
#[must_use]
pub fn map_position(history: &[Insertion], position: usize) -> usize {
    history.iter().fold(position, |p, ins| if ins.at < p { p + ins.len } else { p })
}

/// Grows an instruction stream by inserting payloads in front of
/// instructions, keeping every jump pointing at the same instruction.
pub struct Relocator<'a> {
    code: &'a [u8],
    instructions: Vec<Instruction>,
    jumps: Vec<Jump>,
    /// Original offset -> index into `jumps`.
    jump_index: FxHashMap<usize, usize>,
    /// Original target of each jump.
    original_targets: Vec<usize>,
    /// `(original offset, payload)`, ascending.
    payloads: Vec<(usize, Vec<u8>)>,
    history: Vec<Insertion>,
    /// Bytes inserted so far.
    inserted: usize,
}

impl<'a> Relocator<'a> {
    /// Decode `code` and extract its jumps.
    ///
    /// # Errors
    ///
    /// Returns an error if `code` is not a well-formed instruction stream.
    pub fn new(code: &'a [u8]) -> Result<Self> {
        let instructions = Instructions::new(code).collect::<wcov_isa::Result<Vec<_>>>()?;

        let mut jumps = Vec::new();
        let mut jump_index = FxHashMap::default();
        for instr in instructions.iter().filter(|i| i.opcode.is_jump()) {
            jump_index.insert(instr.offset, jumps.len());
            jumps.push(Jump::new(instr.offset, instr.length, instr.opcode, instr.arg)?);
        }
        let original_targets = jumps.iter().map(Jump::target).collect();

        Ok(Self {
            code,
            instructions,
            jumps,
            jump_index,
            original_targets,
            payloads: Vec::new(),
            history: Vec::new(),
            inserted: 0,
        })
    }

    /// Jumps of the stream, in their current (relocated) state.
    #[must_use]
    pub fn jumps(&self) -> &[Jump] {
        &self.jumps
    }

    /// Insert `payload` in front of the instruction at original `offset`.
    ///
    /// Offsets must be strictly ascending across calls. `offset` may also be
    /// the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if `offset` is not an instruction boundary, or is not
    /// after the previous insertion.
    pub fn insert_before(&mut self, offset: usize, payload: Vec<u8>) -> Result<()> {
        if let Some(&(previous, _)) = self.payloads.last() {
            if offset <= previous {
                return Err(RelocError::UnorderedInsertion { offset, previous });
            }
        }
        if !self.is_boundary(offset) {
            return Err(RelocError::NotInstructionBoundary(offset));
        }
        if payload.is_empty() {
            return Ok(());
        }

        // Earlier payloads all sit strictly before `offset`.
        let at = offset + self.inserted;
        let len = payload.len();
        for jump in &mut self.jumps {
            jump.adjust(at, len);
        }
        self.history.push(Insertion { at, len });
        self.inserted += len;
        self.payloads.push((offset, payload));
        Ok(())
    }

    fn is_boundary(&self, offset: usize) -> bool {
        offset == self.code.len()
            || self
                .instructions
                .binary_search_by_key(&offset, |i| i.offset)
                .is_ok()
    }

    /// Resolve jump growth to a fixed point and materialize the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if an operand outgrows 32 bits, if the fixed point is
    /// not reached within its bound, or if the materialized stream disagrees
    /// with the relocation model.
    pub fn finish(mut self) -> Result<Relocated> {
        let _span = trace_span!("relocate", jumps = self.jumps.len()).entered();
        let sweeps = self.resolve()?;
        debug!(
            jumps = self.jumps.len(),
            sweeps,
            insertions = self.history.len(),
            "relocation converged"
        );
        self.materialize()
    }

    fn resolve(&mut self) -> Result<usize> {
        // Each jump can grow at most once per extension prefix it may gain.
        let max_sweeps = 3 * self.jumps.len() + 2;
        let mut sweeps = 0;

        loop {
            sweeps += 1;
            if sweeps > max_sweeps {
                return Err(RelocError::Diverged(max_sweeps));
            }

            let mut grew = false;
            for i in 0..self.jumps.len() {
                let growth = self.jumps[i].adjust_length()?;
                if growth == 0 {
                    continue;
                }
                grew = true;

                let at = self.jumps[i].offset;
                for (k, other) in self.jumps.iter_mut().enumerate() {
                    if k != i {
                        other.adjust(at, growth);
                    }
                }
                self.history.push(Insertion { at, len: growth });
                self.inserted += growth;
                trace!(at, growth, length = self.jumps[i].length, "jump grew");
            }

            if !grew {
                return Ok(sweeps);
            }
        }
    }

    fn materialize(self) -> Result<Relocated> {
        let mut out = Vec::with_capacity(self.code.len() + self.inserted);
        let mut positions = vec![None; self.code.len() / UNIT_SIZE + 1];
        let mut payloads = self.payloads.into_iter().peekable();

        for instr in &self.instructions {
            positions[instr.offset / UNIT_SIZE] = Some(out.len());
            if let Some((_, payload)) = payloads.next_if(|(at, _)| *at == instr.offset) {
                out.extend_from_slice(&payload);
            }
            match self.jump_index.get(&instr.offset) {
                Some(&i) => {
                    let jump = &self.jumps[i];
                    if jump.offset != out.len() {
                        return Err(RelocError::Inconsistent {
                            expected: jump.offset,
                            actual: out.len(),
                        });
                    }
                    jump.encode_into(&mut out)?;
                }
                None => out.extend_from_slice(&self.code[instr.offset..instr.end()]),
            }
        }
        positions[self.code.len() / UNIT_SIZE] = Some(out.len());
        if let Some((_, payload)) = payloads.next() {
            out.extend_from_slice(&payload);
        }

        let relocated = Relocated {
            code: out,
            history: self.history,
            positions,
            jumps: self.jumps,
        };
        for (jump, &target) in relocated.jumps.iter().zip(&self.original_targets) {
            if let Some(mapped) = relocated.map(target) {
                if mapped != jump.target() {
                    return Err(RelocError::Inconsistent {
                        expected: jump.target(),
                        actual: mapped,
                    });
                }
            }
        }
        Ok(relocated)
    }
}

/// A grown instruction stream and the bookkeeping to map old positions.
#[derive(Clone, Debug)]
pub struct Relocated {
    pub code: Vec<u8>,
    /// Every insertion, probes and jump growth alike, in order.
    pub history: Vec<Insertion>,
    /// New position of each original instruction boundary, by unit index.
    positions: Vec<Option<usize>>,
    pub jumps: Vec<Jump>,
}

impl Relocated {
    /// New position of the original instruction boundary `offset`.
    ///
    /// Equivalent to [`map_position`] over the history, for boundaries.
    #[must_use]
    pub fn map(&self, offset: usize) -> Option<usize> {
        if offset % UNIT_SIZE != 0 {
            return None;
        }
        self.positions.get(offset / UNIT_SIZE).copied().flatten()
    }
}
