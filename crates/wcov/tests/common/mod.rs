#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use wcov::{
    Code, CodeBuilder, CompareOp, CoverageStore, InstrumentConfig, Instrumented, LineTableFormat,
    LiveUnit, Machine, Opcode, Tracker, UnitId, Value,
};

/// Route engine logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// ```text
/// first:     x = 0
/// first + 1: for i in range(n):
/// first + 2:     x += (i + 1)
/// first + 3: return x
/// ```
pub fn sum_unit(file: &str, first: u32, n: i64, format: LineTableFormat) -> Code {
    let mut b = CodeBuilder::new(UnitId::new(file, "foo"), first).with_format(format);
    let (zero, one, n) = (b.constant(0), b.constant(1), b.constant(n));
    let (top, done) = (b.new_label(), b.new_label());

    b.emit(Opcode::LoadConst, zero).emit(Opcode::StoreName, 0);
    b.line(first + 1)
        .emit(Opcode::LoadConst, n)
        .emit(Opcode::MakeRange, 0)
        .bind(top)
        .jump(Opcode::ForIter, done)
        .emit(Opcode::StoreName, 1);
    b.line(first + 2)
        .emit(Opcode::LoadName, 0)
        .emit(Opcode::LoadName, 1)
        .emit(Opcode::LoadConst, one)
        .emit(Opcode::BinaryAdd, 0)
        .emit(Opcode::InplaceAdd, 0)
        .emit(Opcode::StoreName, 0)
        .jump(Opcode::JumpAbsolute, top);
    b.line(first + 3)
        .bind(done)
        .emit(Opcode::LoadName, 0)
        .emit(Opcode::ReturnValue, 0);
    b.finish().unwrap()
}

/// ```text
/// 1:     x = 0
/// 2:     while x == 0:
/// 3:       if x >= 0:
/// 4..:       x += 1      (repeated `n` times)
/// ```
///
/// Every guard jumps over the whole body, so a large `n` needs wide jumps.
pub fn long_jump_unit(n: u32) -> Code {
    let mut b = CodeBuilder::new(UnitId::new("foo", "<module>"), 1);
    let (zero, one) = (b.constant(0), b.constant(1));
    let (top, body, after, done) = (b.new_label(), b.new_label(), b.new_label(), b.new_label());

    b.emit(Opcode::LoadConst, zero).emit(Opcode::StoreName, 0);
    b.line(2)
        .bind(top)
        .emit(Opcode::LoadName, 0)
        .emit(Opcode::LoadConst, zero)
        .emit(Opcode::CompareOp, CompareOp::Eq.into())
        .jump(Opcode::PopJumpIfFalse, done);
    b.line(3)
        .emit(Opcode::LoadName, 0)
        .emit(Opcode::LoadConst, zero)
        .emit(Opcode::CompareOp, CompareOp::Ge.into())
        .jump(Opcode::PopJumpIfTrue, body)
        .jump(Opcode::JumpForward, after);
    b.bind(body);
    for line in 4..4 + n {
        b.line(line)
            .emit(Opcode::LoadName, 0)
            .emit(Opcode::LoadConst, one)
            .emit(Opcode::InplaceAdd, 0)
            .emit(Opcode::StoreName, 0);
    }
    b.bind(after).jump(Opcode::JumpAbsolute, top);
    b.line(2)
        .bind(done)
        .emit(Opcode::LoadName, 0)
        .emit(Opcode::ReturnValue, 0);
    b.finish().unwrap()
}

pub fn lines(first: u32, last: u32) -> BTreeSet<u32> {
    (first..last).collect()
}

/// Offsets in `code`'s line table that start a line.
pub fn line_start_offsets(code: &Code) -> Vec<usize> {
    code.lines()
        .unwrap()
        .iter()
        .filter(|e| !e.is_empty() && e.line.is_some())
        .map(|e| e.start)
        .collect()
}

/// Run `unit` once with a tracker writing to a fresh store.
pub fn run_tracked(
    unit: Instrumented,
    config: &InstrumentConfig,
) -> (Value, Arc<CoverageStore>, LiveUnit) {
    init_tracing();
    let store = Arc::new(CoverageStore::new());
    let tracker = Tracker::new(Arc::clone(&store), config.clone());
    let live = LiveUnit::new(unit);
    let value = Machine::new(config)
        .run(&live, &mut |offset: usize| {
            tracker.hit(&live, offset);
        })
        .unwrap();
    (value, store, live)
}
