/*!
  An Intcode virtual machine.

  A [`Machine`] executes a program image held in a sparse, auto-growing [`Memory`]. It talks to
  the outside world only through an [`Input`] and an [`Output`], which are usually the two ends of
  a blocking channel. Several machines can be wired together with the helpers in [`pipeline`] to
  build feedback loops or interactive controllers.

  ```
  use intcode::{Machine, Status};

  let mut machine = Machine::load(&[3, 9, 8, 9, 10, 9, 4, 9, 99, -1, 8]);
  let outputs = machine.run_with(&[8]).unwrap();
  assert_eq!(outputs, vec![1]);
  assert_eq!(machine.status(), Status::Halted);
  ```
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

mod address;
mod memory;
mod status;

pub mod bytecode;
pub mod config;
pub mod error;
pub mod io;
pub mod machine;
pub mod pipeline;

pub use address::Address;
pub use bytecode::{decode, disassemble, parse_program, Instruction, Mode, Opcode};
pub use config::MachineConfig;
pub use error::{Fault, FaultKind, ParseError, PipelineError};
pub use io::{Input, Output};
pub use machine::Machine;
pub use memory::Memory;
pub use status::{Status, StatusHandle};

/// The machine's only data type.
pub type Word = i64;
