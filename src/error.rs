//! Faults raised by a running machine, and errors raised by the code that feeds and wires machines.

use thiserror::Error;

use crate::Word;

/// What went wrong. Every fault is terminal for the machine that raised it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum FaultKind {
  /// The two low decimal digits of the instruction word are not in the instruction table.
  #[error("unknown opcode {0}")]
  UnknownOpcode(Word),
  /// A mode digit outside of {0, 1, 2}.
  #[error("unknown addressing mode {digit} for parameter {parameter}")]
  UnknownAddressingMode { digit: Word, parameter: usize },
  /// The destination parameter of a writing instruction used immediate mode.
  #[error("parameter {parameter} is written to but uses immediate mode")]
  IllegalWriteMode { parameter: usize },
  /// A resolved address (position, relative + base, or jump target) was negative.
  #[error("negative address {0}")]
  NegativeAddress(Word),
  /// Relative addressing or a relative base adjustment went past the largest word.
  #[error("address {base} + {offset} overflows")]
  AddressOverflow { base: Word, offset: Word },
  /// The machine asked for input from a source that will never produce another value.
  #[error("input closed")]
  InputClosed,
  /// The machine produced output for a sink whose receiving end is gone.
  #[error("output closed")]
  OutputClosed,
}

/// A fault together with where it happened, enough to diagnose a malformed program.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("{kind} at pc {pc} (word {word})")]
pub struct Fault {
  pub kind: FaultKind,
  /// The program counter of the faulting instruction.
  pub pc: Word,
  /// The raw instruction word at `pc`.
  pub word: Word,
}

/// Program text that is not a comma separated list of signed decimal integers.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ParseError {
  #[error("program text is empty")]
  Empty,
  #[error("token {index} is not a valid integer: {text:?}")]
  InvalidToken { index: usize, text: String },
}

/// Errors surfaced by the drivers in [`crate::pipeline`].
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum PipelineError {
  #[error("stage {stage} faulted: {fault}")]
  Stage { stage: usize, fault: Fault },
  #[error("stage {stage} panicked")]
  Panicked { stage: usize },
  #[error("pipeline needs at least one stage")]
  NoStages,
  #[error("pipeline halted without producing a result")]
  NoResult,
  #[error("channel feeding stage {stage} closed before it started")]
  Disconnected { stage: usize },
  #[error("the machine stopped before accepting input")]
  MachineStopped,
  #[error("expected a group of {expected} outputs but the machine produced {received}")]
  PartialGroup { expected: usize, received: usize },
}
