/*!
  An Intcode instruction is a single word. Its two low decimal digits select the operation and each
  higher decimal digit selects the addressing mode of one parameter, starting at the hundreds place
  for the first parameter:

  ```text
      1002  =  0    1    0    02
               │    │    │    └─ opcode: Multiply
               │    │    └────── parameter 1: Position
               │    └─────────── parameter 2: Immediate
               └──────────────── parameter 3: Position
  ```

  The parameters themselves are the words following the instruction word. Instructions are never
  stored decoded; the machine decodes the word at the program counter on every step, so a program
  that rewrites its own code behaves as expected.

  The opcode enum below is the single, immutable instruction table shared by every machine. Its
  arity and write-parameter metadata are what the decoder and the execution engine both consult.
*/

mod assembly;
mod instruction;

pub use assembly::{disassemble, parse_program};
pub use instruction::{decode, Instruction, MAX_ARITY};

use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Opcodes of the virtual machine. The discriminant is the opcode's number in an instruction word.
#[derive(
StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
Clone,        Copy,          Eq, PartialEq,  Debug,            Hash
)]
#[repr(u8)]
pub enum Opcode {
  Add                = 1,  // dest = a + b
  Multiply           = 2,  // dest = a * b
  Input              = 3,  // dest = <input>
  Output             = 4,  // <output> = a
  JumpIfTrue         = 5,  // if a != 0 { pc = b }
  JumpIfFalse        = 6,  // if a == 0 { pc = b }
  LessThan           = 7,  // dest = (a < b) as word
  Equals             = 8,  // dest = (a == b) as word
  AdjustRelativeBase = 9,  // relative_base += a
  Halt               = 99,
}

impl Opcode {
  /// The number of parameter words that follow the instruction word.
  pub fn arity(&self) -> usize {
    match self {
      | Opcode::Add
      | Opcode::Multiply
      | Opcode::LessThan
      | Opcode::Equals             => 3,

      | Opcode::JumpIfTrue
      | Opcode::JumpIfFalse        => 2,

      | Opcode::Input
      | Opcode::Output
      | Opcode::AdjustRelativeBase => 1,

      Opcode::Halt                 => 0,
    }
  }

  /// The zero based index of the parameter this operation writes to, if any.
  pub fn destination(&self) -> Option<usize> {
    match self {
      | Opcode::Add
      | Opcode::Multiply
      | Opcode::LessThan
      | Opcode::Equals => Some(2),
      Opcode::Input    => Some(0),
      _                => None
    }
  }
}

/// Per-parameter rule for resolving an operand's value or write destination.
#[derive(
StrumDisplay, IntoStaticStr, EnumString, TryFromPrimitive, IntoPrimitive,
Clone,        Copy,          Eq, PartialEq,  Debug,            Hash
)]
#[repr(u8)]
pub enum Mode {
  /// The parameter is the address of the operand.
  Position  = 0,
  /// The parameter is the operand. Illegal for destinations.
  Immediate = 1,
  /// The parameter plus the relative base is the address of the operand.
  Relative  = 2,
}

impl Default for Mode {
  fn default() -> Self {
    Mode::Position
  }
}
