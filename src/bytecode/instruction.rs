use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use super::{Mode, Opcode};
use crate::error::FaultKind;
use crate::Word;

/// No operation takes more than three parameters.
pub const MAX_ARITY: usize = 3;

/// A decoded instruction word. Modes past the opcode's arity are `Position` and never consulted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Instruction {
  pub opcode : Opcode,
  pub modes  : [Mode; MAX_ARITY],
}

impl Instruction {
  pub fn arity(&self) -> usize {
    self.opcode.arity()
  }

  /// The mode of the zero based parameter `i`.
  pub fn mode(&self, i: usize) -> Mode {
    self.modes[i]
  }

  /// How far the program counter moves when the instruction does not jump.
  pub fn width(&self) -> usize {
    1 + self.arity()
  }
}

/**
  Decodes an instruction word. Only as many mode digits as the opcode has parameters are examined;
  any of them outside {0, 1, 2} is an `UnknownAddressingMode` fault, and a destination parameter in
  immediate mode is an `IllegalWriteMode` fault.
*/
pub fn decode(word: Word) -> Result<Instruction, FaultKind> {
  let code = word % 100;
  let opcode =
    u8::try_from(code)
      .ok()
      .and_then(|code| Opcode::try_from(code).ok())
      .ok_or(FaultKind::UnknownOpcode(code))?;

  let mut modes = [Mode::Position; MAX_ARITY];
  let mut place: Word = 100;
  for (i, mode) in modes.iter_mut().enumerate().take(opcode.arity()) {
    let digit = (word / place) % 10;
    *mode =
      u8::try_from(digit)
        .ok()
        .and_then(|digit| Mode::try_from(digit).ok())
        .ok_or(FaultKind::UnknownAddressingMode { digit, parameter: i + 1 })?;
    place *= 10;
  }

  if let Some(destination) = opcode.destination() {
    if modes[destination] == Mode::Immediate {
      return Err(FaultKind::IllegalWriteMode { parameter: destination + 1 });
    }
  }

  Ok(Instruction { opcode, modes })
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let modes: Vec<&'static str> =
      self.modes[..self.arity()]
        .iter()
        .map(|mode| <&'static str>::from(*mode))
        .collect();
    match modes.is_empty() {
      true  => write!(f, "{}", self.opcode),
      false => write!(f, "{}({})", self.opcode, modes.join(", "))
    }
  }
}
