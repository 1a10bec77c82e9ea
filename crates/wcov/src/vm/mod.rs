//! Reference interpreter for wordcode units.
//!
//! Small stack machine over `i64` values, enough to execute instrumented
//! units and observe their probes firing. `PROBE` calls out to a
//! [`ProbeHandler`]; the machine lets go of its code snapshot for the
//! duration of the call and fetches a fresh one afterwards, so a probe that
//! disarms itself takes effect for the rest of the run.

mod value;

pub use value::*;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};
use wcov_isa::{CompareOp, Instruction, Instructions, IsaError, JUMP_UNIT, Opcode};

use crate::{Code, InstrumentConfig, Instrumented, LiveUnit};

/// Execution errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("stack underflow at offset {0}")]
    StackUnderflow(usize),
    #[error("bad operand {arg} for {opcode} at offset {offset}")]
    BadOperand {
        offset: usize,
        opcode: Opcode,
        arg: u32,
    },
    #[error("unknown opcode {byte:#04x} at offset {offset}")]
    UnknownOpcode { offset: usize, byte: u8 },
    #[error("malformed instruction: {0}")]
    Malformed(IsaError),
    #[error("operand type mismatch for {opcode} at offset {offset}")]
    TypeMismatch { offset: usize, opcode: Opcode },
    #[error("name {slot} read before assignment at offset {offset}")]
    UnboundName { offset: usize, slot: u32 },
    #[error("execution ran off the end of the code at offset {0}")]
    FellOffEnd(usize),
    #[error("step limit of {0} exceeded")]
    StepLimit(u64),
}

pub type VmResult<T> = std::result::Result<T, VmError>;

/// Receives `PROBE` executions.
pub trait ProbeHandler {
    /// The probe at `offset` executed.
    fn on_probe(&mut self, offset: usize);
}

impl<F: FnMut(usize)> ProbeHandler for F {
    fn on_probe(&mut self, offset: usize) {
        self(offset);
    }
}

/// Where the interpreter fetches code from.
pub trait CodeSource {
    /// The code to execute as of now.
    fn snapshot(&self) -> Arc<Instrumented>;
}

impl CodeSource for LiveUnit {
    fn snapshot(&self) -> Arc<Instrumented> {
        Self::snapshot(self)
    }
}

impl CodeSource for Arc<Instrumented> {
    fn snapshot(&self) -> Arc<Instrumented> {
        Self::clone(self)
    }
}

enum Flow {
    Next(usize),
    Probe { offset: usize, next: usize },
    Return(Value),
}

/// Stack interpreter.
#[derive(Debug)]
pub struct Machine {
    max_steps: u64,
    steps: u64,
    stack: Vec<Value>,
    names: Vec<Option<Value>>,
}

impl Machine {
    #[must_use]
    pub const fn new(config: &InstrumentConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            steps: 0,
            stack: Vec::new(),
            names: Vec::new(),
        }
    }

    /// Instructions executed by the last run.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Value of name slot `slot` after the last run.
    #[must_use]
    pub fn name(&self, slot: usize) -> Option<Value> {
        self.names.get(slot).copied().flatten()
    }

    /// Execute from offset 0 until `RETURN_VALUE`.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed code, operand misuse, or when the step
    /// limit is exceeded.
    pub fn run<S, H>(&mut self, source: &S, handler: &mut H) -> VmResult<Value>
    where
        S: CodeSource + ?Sized,
        H: ProbeHandler + ?Sized,
    {
        let mut unit = source.snapshot();
        self.steps = 0;
        self.stack.clear();
        self.names = vec![None; unit.code.names];

        let mut pc = 0;
        loop {
            if self.steps == self.max_steps {
                return Err(VmError::StepLimit(self.max_steps));
            }
            self.steps += 1;

            let instr = fetch(&unit.code.bytecode, pc)?;
            match self.step(&unit.code, &instr)? {
                Flow::Next(next) => pc = next,
                Flow::Probe { offset, next } => {
                    drop(unit);
                    trace!(offset, "probe");
                    handler.on_probe(offset);
                    unit = source.snapshot();
                    pc = next;
                }
                Flow::Return(value) => {
                    debug!(unit = %unit.code.id, steps = self.steps, %value, "returned");
                    return Ok(value);
                }
            }
        }
    }

    fn step(&mut self, code: &Code, instr: &Instruction) -> VmResult<Flow> {
        let offset = instr.offset;
        let next = instr.end();
        let arg = instr.arg;
        let slot = arg as usize;
        let target = if instr.opcode.is_relative_jump() {
            next + slot * JUMP_UNIT
        } else {
            slot * JUMP_UNIT
        };
        let bad_operand = || VmError::BadOperand {
            offset,
            opcode: instr.opcode,
            arg,
        };

        let flow = match instr.opcode {
            Opcode::Nop | Opcode::ExtendedArg => Flow::Next(next),
            Opcode::Probe => Flow::Probe { offset, next },
            Opcode::PopTop => {
                self.pop(offset)?;
                Flow::Next(next)
            }
            Opcode::LoadConst => {
                let value = code.consts.get(slot).copied().ok_or_else(bad_operand)?;
                self.stack.push(Value::Int(value));
                Flow::Next(next)
            }
            Opcode::LoadName => {
                let value = self
                    .names
                    .get(slot)
                    .ok_or_else(bad_operand)?
                    .ok_or(VmError::UnboundName { offset, slot: arg })?;
                self.stack.push(value);
                Flow::Next(next)
            }
            Opcode::StoreName => {
                let value = self.pop(offset)?;
                *self.names.get_mut(slot).ok_or_else(bad_operand)? = Some(value);
                Flow::Next(next)
            }
            Opcode::BinaryAdd | Opcode::InplaceAdd => {
                let (lhs, rhs) = self.pop_pair(instr)?;
                self.stack.push(Value::Int(lhs.wrapping_add(rhs)));
                Flow::Next(next)
            }
            Opcode::BinarySubtract => {
                let (lhs, rhs) = self.pop_pair(instr)?;
                self.stack.push(Value::Int(lhs.wrapping_sub(rhs)));
                Flow::Next(next)
            }
            Opcode::CompareOp => {
                let cmp = CompareOp::try_from(arg).map_err(|_| bad_operand())?;
                let (lhs, rhs) = self.pop_pair(instr)?;
                self.stack.push(Value::from(cmp.apply(lhs, rhs)));
                Flow::Next(next)
            }
            Opcode::MakeRange => {
                let stop = self.pop_int(instr)?;
                self.stack.push(Value::Range { next: 0, stop });
                Flow::Next(next)
            }
            Opcode::ForIter => match self.stack.last_mut() {
                Some(Value::Range { next: current, stop }) if *current < *stop => {
                    let value = *current;
                    *current += 1;
                    self.stack.push(Value::Int(value));
                    Flow::Next(next)
                }
                Some(Value::Range { .. }) => {
                    self.stack.pop();
                    Flow::Next(target)
                }
                Some(Value::Int(_)) => {
                    return Err(VmError::TypeMismatch {
                        offset,
                        opcode: instr.opcode,
                    });
                }
                None => return Err(VmError::StackUnderflow(offset)),
            },
            Opcode::JumpForward | Opcode::JumpAbsolute => Flow::Next(target),
            Opcode::PopJumpIfFalse => {
                let taken = self.pop_int(instr)? == 0;
                Flow::Next(if taken { target } else { next })
            }
            Opcode::PopJumpIfTrue => {
                let taken = self.pop_int(instr)? != 0;
                Flow::Next(if taken { target } else { next })
            }
            Opcode::ReturnValue => Flow::Return(self.pop(offset)?),
        };
        Ok(flow)
    }

    fn pop(&mut self, offset: usize) -> VmResult<Value> {
        self.stack.pop().ok_or(VmError::StackUnderflow(offset))
    }

    fn pop_int(&mut self, instr: &Instruction) -> VmResult<i64> {
        self.pop(instr.offset)?
            .as_int()
            .ok_or(VmError::TypeMismatch {
                offset: instr.offset,
                opcode: instr.opcode,
            })
    }

    /// Pop `rhs` then `lhs`.
    fn pop_pair(&mut self, instr: &Instruction) -> VmResult<(i64, i64)> {
        let rhs = self.pop_int(instr)?;
        let lhs = self.pop_int(instr)?;
        Ok((lhs, rhs))
    }
}

fn fetch(code: &[u8], pc: usize) -> VmResult<Instruction> {
    let rest = code.get(pc..).unwrap_or_default();
    match Instructions::new(rest).next() {
        Some(Ok(instr)) => Ok(Instruction { offset: pc, ..instr }),
        Some(Err(IsaError::UnknownOpcode { offset, byte })) => Err(VmError::UnknownOpcode {
            offset: pc + offset,
            byte,
        }),
        Some(Err(err)) => Err(VmError::Malformed(err)),
        None => Err(VmError::FellOffEnd(pc)),
    }
}
