//! The Intcode virtual machine: memory, registers, and the fetch-decode-execute loop.

use std::collections::VecDeque;
use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use prettytable::{format as TableFormat, Cell, Row, Table};
use tracing::{debug, trace, warn};

use crate::address::{checked_sum, Address};
use crate::bytecode::{decode, Instruction, Mode, Opcode};
use crate::config::MachineConfig;
use crate::error::{Fault, FaultKind};
use crate::io::{Input, Output};
use crate::memory::Memory;
use crate::status::{Status, StatusHandle};
use crate::Word;

/// Number of memory cells per row in the state table.
const TABLE_COLUMNS: usize = 8;

/// What the loop does after an instruction has executed.
enum Flow {
  /// Fall through to the next instruction, `width` words on.
  Next(usize),
  Jump(Address),
  Halt,
}

pub struct Machine {

  // Memory Store
  memory        : Memory,

  // Registers //
  pc            : Address, // Program Counter
  relative_base : Word,    // Added to relative mode parameters

  steps         : u64,
  status        : StatusHandle,
  config        : MachineConfig,

}

impl Machine {

  // region Display methods

  fn make_memory_table(memory: &Memory, highlight: Address) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Address", ubl->"Contents"]);

    let cells: Vec<(Address, Word)> = memory.cells().collect();
    for row in cells.chunks(TABLE_COLUMNS) {
      let mut entries = Vec::with_capacity(row.len() + 1);
      entries.push(Cell::new(&format!("{} =", row[0].0)));
      for (address, value) in row {
        match *address == highlight {
          true  => entries.push(Cell::new(&format!("*{}", value))),
          false => entries.push(Cell::new(&value.to_string()))
        }
      }
      table.add_row(Row::new(entries));
    } // end for
    table
  }

  // endregion

  // region Construction and inspection

  /// Loads a program image with the default configuration.
  pub fn load(program: &[Word]) -> Machine {
    Machine::with_config(program, MachineConfig::default())
  }

  pub fn with_config(program: &[Word], config: MachineConfig) -> Machine {
    Machine {
      memory        : Memory::from_program(program),
      pc            : Address::ZERO,
      relative_base : 0,
      steps         : 0,
      status        : StatusHandle::new(),
      config,
    }
  }

  /// Reads a memory cell directly, e.g. to inspect a result after the machine halted.
  pub fn peek(&self, address: Word) -> Result<Word, FaultKind> {
    self.memory.read_word(address)
  }

  /// Writes a memory cell directly, e.g. to patch a configuration cell before running.
  pub fn poke(&mut self, address: Word, value: Word) -> Result<(), FaultKind> {
    self.memory.write_word(address, value)
  }

  pub fn status(&self) -> Status {
    self.status.get()
  }

  /// A handle for reading the status from another thread while the machine runs.
  pub fn status_handle(&self) -> StatusHandle {
    self.status.clone()
  }

  pub fn pc(&self) -> Address {
    self.pc
  }

  pub fn relative_base(&self) -> Word {
    self.relative_base
  }

  /// The number of instructions executed so far.
  pub fn steps(&self) -> u64 {
    self.steps
  }

  pub fn memory(&self) -> &Memory {
    &self.memory
  }

  pub fn config(&self) -> &MachineConfig {
    &self.config
  }

  // endregion

  // region Execution

  /**
    Runs the machine until it halts or faults. A machine that is already halted returns
    immediately, and one that has already faulted returns its fault again; neither state is ever
    left.
  */
  pub fn run<I, O>(&mut self, input: &mut I, output: &mut O) -> Result<(), Fault>
    where I: Input + ?Sized,
          O: Output + ?Sized
  {
    loop {
      if self.step(input, output)?.is_terminal() {
        return Ok(());
      }
    }
  }

  /// Runs the machine to completion on a fixed list of inputs, returning everything it output.
  pub fn run_with(&mut self, inputs: &[Word]) -> Result<Vec<Word>, Fault> {
    let mut input: VecDeque<Word> = inputs.iter().copied().collect();
    let mut output = Vec::new();
    self.run(&mut input, &mut output)?;
    Ok(output)
  }

  /// Executes a single instruction and returns the resulting status.
  pub fn step<I, O>(&mut self, input: &mut I, output: &mut O) -> Result<Status, Fault>
    where I: Input + ?Sized,
          O: Output + ?Sized
  {
    match self.status() {
      Status::Halted         => return Ok(Status::Halted),
      Status::Faulted(fault) => return Err(fault),
      Status::Initialized    => {
        debug!(machine = %self.config.name, "starting");
        self.status.set(Status::Running);
      }
      _ => {}
    }

    let result = self.execute(input, output);
    self.steps += 1;

    #[cfg(feature = "trace_computation")]
    trace!(machine = %self.config.name, "\n{}", self);

    match result {

      Ok(Flow::Next(width)) => {
        self.pc = self.pc + width;
        Ok(Status::Running)
      }

      Ok(Flow::Jump(target)) => {
        self.pc = target;
        Ok(Status::Running)
      }

      Ok(Flow::Halt) => {
        debug!(machine = %self.config.name, steps = self.steps, "halted");
        self.status.set(Status::Halted);
        Ok(Status::Halted)
      }

      Err(kind) => {
        let fault = Fault { kind, pc: self.pc.word(), word: self.memory.read(self.pc) };
        warn!(machine = %self.config.name, %fault, "faulted");
        self.status.set(Status::Faulted(fault));
        Err(fault)
      }

    }
  }

  /// Decodes the word at the program counter and carries out its semantics.
  fn execute<I, O>(&mut self, input: &mut I, output: &mut O) -> Result<Flow, FaultKind>
    where I: Input + ?Sized,
          O: Output + ?Sized
  {
    let instruction = decode(self.memory.read(self.pc))?;

    if self.config.trace {
      trace!(
        machine = %self.config.name,
        pc = %self.pc,
        rb = self.relative_base,
        "{}",
        instruction
      );
    }

    match instruction.opcode {

      Opcode::Add => {
        let (a, b) = (self.operand(&instruction, 0)?, self.operand(&instruction, 1)?);
        self.store(&instruction, 2, a.wrapping_add(b))?;
      }

      Opcode::Multiply => {
        let (a, b) = (self.operand(&instruction, 0)?, self.operand(&instruction, 1)?);
        self.store(&instruction, 2, a.wrapping_mul(b))?;
      }

      Opcode::Input => {
        self.status.set(Status::WaitingForInput);
        debug!(machine = %self.config.name, pc = %self.pc, "waiting for input");
        let value = input.read().ok_or(FaultKind::InputClosed)?;
        self.status.set(Status::Running);
        self.store(&instruction, 0, value)?;
      }

      Opcode::Output => {
        let value = self.operand(&instruction, 0)?;
        output.write(value).map_err(|_| FaultKind::OutputClosed)?;
      }

      Opcode::JumpIfTrue => {
        let (condition, target) = (self.operand(&instruction, 0)?, self.operand(&instruction, 1)?);
        if condition != 0 {
          return Ok(Flow::Jump(Address::try_from(target)?));
        }
      }

      Opcode::JumpIfFalse => {
        let (condition, target) = (self.operand(&instruction, 0)?, self.operand(&instruction, 1)?);
        if condition == 0 {
          return Ok(Flow::Jump(Address::try_from(target)?));
        }
      }

      Opcode::LessThan => {
        let (a, b) = (self.operand(&instruction, 0)?, self.operand(&instruction, 1)?);
        self.store(&instruction, 2, (a < b) as Word)?;
      }

      Opcode::Equals => {
        let (a, b) = (self.operand(&instruction, 0)?, self.operand(&instruction, 1)?);
        self.store(&instruction, 2, (a == b) as Word)?;
      }

      Opcode::AdjustRelativeBase => {
        let delta = self.operand(&instruction, 0)?;
        self.relative_base = checked_sum(self.relative_base, delta)?;
      }

      Opcode::Halt => {
        return Ok(Flow::Halt);
      }

    } // end match on opcode

    Ok(Flow::Next(instruction.width()))
  }

  // endregion

  // region Operand resolution

  /// The effective address of the zero based parameter `i` of the current instruction.
  fn parameter_address(&self, instruction: &Instruction, i: usize) -> Result<Address, FaultKind> {
    let slot = self.pc + (1 + i);
    match instruction.mode(i) {
      Mode::Position  => Address::try_from(self.memory.read(slot)),
      Mode::Immediate => Ok(slot),
      Mode::Relative  => Address::relative(self.relative_base, self.memory.read(slot)),
    }
  }

  fn operand(&self, instruction: &Instruction, i: usize) -> Result<Word, FaultKind> {
    Ok(self.memory.read(self.parameter_address(instruction, i)?))
  }

  fn store(&mut self, instruction: &Instruction, i: usize, value: Word) -> Result<(), FaultKind> {
    if instruction.mode(i) == Mode::Immediate {
      return Err(FaultKind::IllegalWriteMode { parameter: i + 1 });
    }
    let address = self.parameter_address(instruction, i)?;
    self.memory.write(address, value);
    Ok(())
  }

  // endregion

}


lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl Display for Machine {

  // The decoded instruction at the program counter is shown if `trace_computation` is on.
  #[cfg(feature = "trace_computation")]
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let memory_table = Machine::make_memory_table(&self.memory, self.pc);
    let next = match decode(self.memory.read(self.pc)) {
      Ok(instruction) => instruction.to_string(),
      Err(kind)       => kind.to_string()
    };

    write!(
      f,
      "{}: {}\tpc: {}\trb: {}\tsteps: {}\tnext: {}\n{}",
      self.config.name, self.status(), self.pc, self.relative_base, self.steps, next, memory_table
    )
  }

  #[cfg(not(feature = "trace_computation"))]
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let memory_table = Machine::make_memory_table(&self.memory, self.pc);

    write!(
      f,
      "{}: {}\tpc: {}\trb: {}\tsteps: {}\n{}",
      self.config.name, self.status(), self.pc, self.relative_base, self.steps, memory_table
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn run(program: &[Word]) -> Machine {
    let mut machine = Machine::load(program);
    machine.run_with(&[]).unwrap();
    machine
  }

  #[test]
  fn halt_alone_consumes_and_produces_nothing() {
    let mut machine = Machine::load(&[99]);
    assert_eq!(machine.status(), Status::Initialized);
    let mut input: VecDeque<Word> = vec![7].into();
    let mut output: Vec<Word> = Vec::new();
    machine.run(&mut input, &mut output).unwrap();
    assert_eq!(machine.status(), Status::Halted);
    assert_eq!(input.len(), 1);
    assert!(output.is_empty());
    assert_eq!(machine.steps(), 1);
  }

  #[test]
  fn self_add() {
    assert_eq!(run(&[1, 0, 0, 0, 99]).peek(0), Ok(2));
  }

  #[test]
  fn immediate_operands() {
    assert_eq!(run(&[1101, 4, 3, 0, 99]).peek(0), Ok(7));
    assert_eq!(run(&[1002, 4, 3, 4, 33]).peek(4), Ok(99));
  }

  #[test]
  fn negative_immediates() {
    assert_eq!(run(&[1101, 100, -1, 4, 0]).peek(4), Ok(99));
  }

  #[test]
  fn relative_writes_are_offset_by_the_base() {
    // rb += 10; [rb + 3] = 7 * 6
    let machine = run(&[109, 10, 21102, 7, 6, 3, 99]);
    assert_eq!(machine.relative_base(), 10);
    assert_eq!(machine.peek(13), Ok(42));
    assert_eq!(machine.peek(3), Ok(7));
  }

  #[test]
  fn relative_reads_are_offset_by_the_base() {
    // rb += 5; output [rb - 5], i.e. the first word of the program.
    let mut machine = Machine::load(&[109, 5, 204, -5, 99]);
    assert_eq!(machine.run_with(&[]), Ok(vec![109]));
  }

  #[test]
  fn jumps_treat_any_non_zero_value_as_true() {
    // if -1 { jump to 7 } else { output 0 }; output 1
    let program = [1105, -1, 7, 104, 0, 99, 0, 104, 1, 99];
    assert_eq!(Machine::load(&program).run_with(&[]), Ok(vec![1]));

    let program = [1106, -1, 7, 104, 0, 99, 0, 104, 1, 99];
    assert_eq!(Machine::load(&program).run_with(&[]), Ok(vec![0]));
  }

  #[test]
  fn comparisons_write_flags() {
    let machine = run(&[1107, 1, 2, 9, 1108, 3, 4, 10, 99, -1, -1]);
    assert_eq!(machine.peek(9), Ok(1));
    assert_eq!(machine.peek(10), Ok(0));
  }

  #[test]
  fn writes_far_beyond_the_image() {
    let machine = run(&[1101, 5, 6, 1_000_000, 99]);
    assert_eq!(machine.peek(1_000_000), Ok(11));
    assert_eq!(machine.peek(999_999), Ok(0));
  }

  #[test]
  fn arithmetic_wraps_instead_of_clamping() {
    let machine = run(&[1101, Word::MAX, 1, 0, 99]);
    assert_eq!(machine.peek(0), Ok(Word::MIN));
  }

  #[test]
  fn poke_before_run_patches_the_image() {
    let mut machine = Machine::load(&[1, 0, 0, 0, 99]);
    machine.poke(1, 4).unwrap();
    machine.poke(2, 4).unwrap();
    machine.run_with(&[]).unwrap();
    assert_eq!(machine.peek(0), Ok(198));
  }

  #[test]
  fn peek_and_poke_reject_negative_addresses() {
    let mut machine = Machine::load(&[99]);
    assert_eq!(machine.peek(-1), Err(FaultKind::NegativeAddress(-1)));
    assert_eq!(machine.poke(-2, 0), Err(FaultKind::NegativeAddress(-2)));
  }

  #[test]
  fn unknown_mode_faults_with_location() {
    let mut machine = Machine::load(&[1101, 0, 0, 9, 305, 1, 0, 99]);
    let fault = machine.run_with(&[]).unwrap_err();
    assert_eq!(fault.kind, FaultKind::UnknownAddressingMode { digit: 3, parameter: 1 });
    assert_eq!(fault.pc, 4);
    assert_eq!(fault.word, 305);
    assert_eq!(machine.status(), Status::Faulted(fault));
  }

  #[test]
  fn unknown_opcode_faults() {
    let mut machine = Machine::load(&[42]);
    let fault = machine.run_with(&[]).unwrap_err();
    assert_eq!(fault, Fault { kind: FaultKind::UnknownOpcode(42), pc: 0, word: 42 });
  }

  #[test]
  fn negative_addresses_fault() {
    let mut machine = Machine::load(&[1, -1, 0, 0, 99]);
    assert_eq!(machine.run_with(&[]).unwrap_err().kind, FaultKind::NegativeAddress(-1));

    let mut machine = Machine::load(&[109, -10, 22201, 0, 0, 0, 99]);
    assert_eq!(machine.run_with(&[]).unwrap_err().kind, FaultKind::NegativeAddress(-10));

    let mut machine = Machine::load(&[1105, 1, -4, 99]);
    assert_eq!(machine.run_with(&[]).unwrap_err().kind, FaultKind::NegativeAddress(-4));
  }

  #[test]
  fn relative_addresses_never_wrap_around() {
    // rb = -1; output [rb + MIN]
    let mut machine = Machine::load(&[109, -1, 204, Word::MIN, 99]);
    let fault = machine.run_with(&[]).unwrap_err();
    assert_eq!(fault.kind, FaultKind::NegativeAddress(Word::MIN));
    assert_eq!(fault.pc, 2);

    // rb = MAX; output [rb + 1]
    let mut machine = Machine::load(&[109, Word::MAX, 204, 1, 99]);
    let fault = machine.run_with(&[]).unwrap_err();
    assert_eq!(fault.kind, FaultKind::AddressOverflow { base: Word::MAX, offset: 1 });
  }

  #[test]
  fn relative_base_never_wraps_around() {
    // rb = MIN; rb -= 1; [rb] = 2 + 3
    let mut machine = Machine::load(&[109, Word::MIN, 109, -1, 21101, 2, 3, 0, 99]);
    let fault = machine.run_with(&[]).unwrap_err();
    assert_eq!(fault.kind, FaultKind::NegativeAddress(Word::MIN));
    assert_eq!(fault.pc, 2);
    assert_eq!(machine.relative_base(), Word::MIN);
    assert_eq!(machine.memory().len(), 9);
  }

  #[test]
  fn missing_input_faults() {
    let mut machine = Machine::load(&[3, 0, 99]);
    let fault = machine.run_with(&[]).unwrap_err();
    assert_eq!(fault.kind, FaultKind::InputClosed);
    assert_eq!(fault.pc, 0);
  }

  #[test]
  fn faults_are_terminal() {
    let mut machine = Machine::load(&[3, 0, 99]);
    let fault = machine.run_with(&[]).unwrap_err();
    assert_eq!(machine.run_with(&[5]), Err(fault));
    assert_eq!(machine.peek(0), Ok(3));
  }

  #[test]
  fn halted_machines_stay_halted() {
    let mut machine = Machine::load(&[104, 1, 99]);
    assert_eq!(machine.run_with(&[]), Ok(vec![1]));
    assert_eq!(machine.run_with(&[]), Ok(vec![]));
    assert_eq!(machine.status(), Status::Halted);
  }

  #[test]
  fn single_steps() {
    let mut machine = Machine::load(&[1101, 1, 1, 0, 99]);
    let (mut input, mut output) = (VecDeque::<Word>::new(), Vec::<Word>::new());
    assert_eq!(machine.step(&mut input, &mut output), Ok(Status::Running));
    assert_eq!(machine.pc(), Address::from(4));
    assert_eq!(machine.step(&mut input, &mut output), Ok(Status::Halted));
  }

  #[test]
  fn state_table_highlights_the_program_counter() {
    let machine = Machine::load(&[1101, 4, 3, 0, 99]);
    let rendered = machine.to_string();
    assert!(rendered.contains("Initialized"));
    assert!(rendered.contains("*1101"));
  }
}
