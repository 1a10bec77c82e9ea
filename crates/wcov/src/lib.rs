//! wcov - probe-based line coverage for wordcode units
//!
//! Instruments compiled units in place: a `PROBE` instruction is inserted at
//! the start of every source line, jumps are relocated around the inserted
//! bytes, and the line table is rewritten to match. When a probe fires its
//! line is recorded and the probe is overwritten with a `NOP`, so code that
//! has already been covered runs at close to its original speed.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wcov::{CoverageStore, InstrumentConfig, LiveUnit, Machine, Tracker, instrument};
//!
//! let config = InstrumentConfig::default();
//! let unit = LiveUnit::new(instrument(&code)?);
//! let tracker = Tracker::new(Arc::new(CoverageStore::new()), config.clone());
//!
//! Machine::new(&config).run(&unit, &mut |offset| {
//!     tracker.hit(&unit, offset);
//! })?;
//! let covered = tracker.store().by_file();
//! ```

// Re-export from sub-crates
pub use wcov_isa::{CompareOp, Instruction, Instructions, IsaError, Opcode, disassemble};
pub use wcov_lines::{LineEntry, LineTableError, LineTableFormat};
pub use wcov_reloc::{Jump, RelocError, extract_jumps};

mod builder;
mod code;
mod config;
mod error;
mod instrument;
mod live;
mod probe;
mod store;
mod tracker;
mod vm;

pub use builder::*;
pub use code::*;
pub use config::*;
pub use error::*;
pub use instrument::*;
pub use live::*;
pub use probe::*;
pub use store::*;
pub use tracker::*;
pub use vm::*;
