/*!
  Drivers that run machines on their own threads and wire their I/O together.

  Each machine executes on a dedicated thread and owns its memory and registers outright; the only
  things shared between threads are the channels connecting a machine to its counterpart and the
  machine's `StatusHandle`. When a machine stops, its thread drops its channel ends, so a neighbour
  blocked on that channel sees `InputClosed` or `OutputClosed` instead of waiting forever.
*/

use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::config::MachineConfig;
use crate::error::PipelineError;
use crate::io::{self, Input, Output};
use crate::machine::Machine;
use crate::status::{Status, StatusHandle};
use crate::Word;

/// Room for a phase setting and one signal in flight on every link of a chain or loop.
pub const LINK_CAPACITY: usize = 2;

/// Runs a machine on its own thread. Joining the handle gives the machine back in its final state.
pub fn spawn<I, O>(mut machine: Machine, mut input: I, mut output: O) -> JoinHandle<Machine>
  where I: Input + Send + 'static,
        O: Output + Send + 'static
{
  thread::spawn(move || {
    // A fault is recorded in the machine's status.
    let _ = machine.run(&mut input, &mut output);
    machine
  })
}

// region Chains and feedback loops

type StageHandle = JoinHandle<(Machine, Option<Word>)>;

/**
  Runs one stage of a chain. With `drain_input` set, a stage that halted cleanly keeps reading its
  input link until every upstream sender is gone and hands back the last value left on it. The
  stage's output is dropped first, so the stages downstream of it wind down too. Otherwise the
  input is dropped with the thread, which disconnects the upstream stage.
*/
fn spawn_stage(
    mut machine : Machine,
    mut input   : Receiver<Word>,
    mut output  : SyncSender<Word>,
    drain_input : bool
  ) -> StageHandle
{
  thread::spawn(move || {
    let result = machine.run(&mut input, &mut output);
    drop(output);
    match drain_input && result.is_ok() {
      true  => {
        let leftover = input.iter().last();
        (machine, leftover)
      }
      false => (machine, None)
    }
  })
}

/// Joins every stage, reporting the first stage (in wiring order) that faulted or panicked.
fn join_stages(handles: Vec<StageHandle>)
  -> Result<Vec<(Machine, Option<Word>)>, PipelineError>
{
  let mut joined = Vec::with_capacity(handles.len());
  let mut first_error = None;

  for (stage, handle) in handles.into_iter().enumerate() {
    match handle.join() {

      Ok((machine, leftover)) => {
        if let Status::Faulted(fault) = machine.status() {
          first_error.get_or_insert(PipelineError::Stage { stage, fault });
        }
        joined.push((machine, leftover));
      }

      Err(_) => {
        first_error.get_or_insert(PipelineError::Panicked { stage });
      }

    }
  }

  match first_error {
    Some(error) => Err(error),
    None        => Ok(joined)
  }
}

/// One machine per phase setting, each named after its position.
fn stage_machines(program: &[Word], stages: usize) -> Vec<Machine> {
  let base = MachineConfig::from_env();
  (0..stages)
    .map(|stage| {
      let config = base.clone().named(format!("amp-{}", stage));
      Machine::with_config(program, config)
    })
    .collect()
}

/// Creates one link per stage and seeds link `i` with phase `i`.
fn seeded_links(phases: &[Word], links: usize)
  -> Result<(Vec<SyncSender<Word>>, Vec<Receiver<Word>>), PipelineError>
{
  let (senders, receivers): (Vec<_>, Vec<_>) =
    (0..links).map(|_| io::channel(LINK_CAPACITY)).unzip();

  for (stage, (sender, phase)) in senders.iter().zip(phases).enumerate() {
    sender.send(*phase).map_err(|_| PipelineError::Disconnected { stage })?;
  }

  Ok((senders, receivers))
}

/**
  Runs one copy of `program` per phase setting, connected output to input in a line. Every stage
  first receives its phase setting; the first stage then receives `seed`. The result is the last
  value the final stage outputs.
*/
pub fn chain(program: &[Word], phases: &[Word], seed: Word) -> Result<Word, PipelineError> {
  if phases.is_empty() {
    return Err(PipelineError::NoStages);
  }
  let stages = phases.len();

  // Link `i` feeds stage `i`; link `stages` is read by the driver.
  let (mut senders, mut receivers) = seeded_links(phases, stages + 1)?;
  senders[0].send(seed).map_err(|_| PipelineError::Disconnected { stage: 0 })?;

  let results = receivers.pop().ok_or(PipelineError::NoStages)?;
  let outputs = senders.split_off(1);

  let handles: Vec<StageHandle> =
    stage_machines(program, stages)
      .into_iter()
      .zip(receivers.into_iter().zip(outputs))
      .map(|(machine, (input, output))| spawn_stage(machine, input, output, false))
      .collect();
  // The driver's sender for link 0 must not keep stage 0 from seeing its input close.
  drop(senders);

  // Drain before joining so the last stage never blocks on a full link.
  let result = results.iter().last();
  join_stages(handles)?;

  debug!(stages, ?result, "chain finished");
  result.ok_or(PipelineError::NoResult)
}

/**
  Runs one copy of `program` per phase setting, connected in a cycle: stage `i` outputs to stage
  `i + 1`, and the last stage outputs back to the first. Every stage first receives its phase
  setting, then `seed` is placed on the first stage's link to start the loop. Once every stage has
  halted, the last value left on the first stage's link is the result. The first stage drains that
  link after it halts, so a stage still producing output behind it never blocks.
*/
pub fn feedback_loop(program: &[Word], phases: &[Word], seed: Word) -> Result<Word, PipelineError> {
  if phases.is_empty() {
    return Err(PipelineError::NoStages);
  }
  let stages = phases.len();

  let (mut senders, receivers) = seeded_links(phases, stages)?;
  senders[0].send(seed).map_err(|_| PipelineError::Disconnected { stage: 0 })?;
  // Stage `i` writes to link `i + 1`, wrapping around.
  senders.rotate_left(1);

  let handles: Vec<StageHandle> =
    stage_machines(program, stages)
      .into_iter()
      .zip(receivers.into_iter().zip(senders))
      .enumerate()
      .map(|(stage, (machine, (input, output)))| spawn_stage(machine, input, output, stage == 0))
      .collect();

  let joined = join_stages(handles)?;
  let result = joined.into_iter().next().and_then(|(_, leftover)| leftover);

  debug!(stages, ?result, "feedback loop finished");
  result.ok_or(PipelineError::NoResult)
}

// endregion

// region Interactive duplex

/// What a duplex machine sent to its driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Event {
  Output(Word),
  AwaitingInput,
}

/// The machine's side of a duplex: every read first tells the driver that input is wanted.
struct DuplexInput {
  commands : Receiver<Word>,
  events   : SyncSender<Event>,
}

impl Input for DuplexInput {
  fn read(&mut self) -> Option<Word> {
    self.events.send(Event::AwaitingInput).ok()?;
    self.commands.recv().ok()
  }
}

struct DuplexOutput {
  events : SyncSender<Event>,
}

impl Output for DuplexOutput {
  fn write(&mut self, value: Word) -> Result<(), Word> {
    self.events.send(Event::Output(value)).map_err(|_| value)
  }
}

/// The answer to a driver waiting on a duplex machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reply<T> {
  /// The machine produced a value (or a complete group of values).
  Value(T),
  /// The machine is blocked on an input instruction; `send` the next command.
  AwaitingInput,
  /// The machine halted or faulted; no more values will arrive.
  Finished,
}

/**
  A machine driven interactively. The machine runs on its own thread and hands every value to the
  driver through a rendezvous; before every input instruction it announces that it is waiting, so
  the driver always knows whether to read outputs or issue the next command. Control returns to
  the driver between every hand-off.

  ```
  use intcode::{Machine, Status};
  use intcode::pipeline::{Duplex, Reply};

  // Echo every input until a zero arrives.
  let mut duplex = Duplex::start(Machine::load(&[3, 11, 1006, 11, 10, 4, 11, 1105, 1, 0, 99]));
  assert_eq!(duplex.recv(), Reply::AwaitingInput);
  duplex.send(5).unwrap();
  assert_eq!(duplex.recv(), Reply::Value(5));
  duplex.send(0).unwrap();
  assert_eq!(duplex.recv(), Reply::Finished);
  assert_eq!(duplex.finish().unwrap().status(), Status::Halted);
  ```
*/
pub struct Duplex {
  commands       : SyncSender<Word>,
  events         : Receiver<Event>,
  status         : StatusHandle,
  handle         : JoinHandle<Machine>,
  pending        : VecDeque<Word>,
  awaiting_input : bool,
}

impl Duplex {

  pub fn start(machine: Machine) -> Duplex {
    let (commands, command_source) = io::rendezvous();
    let (event_sink, events) = std::sync::mpsc::sync_channel(0);
    let status = machine.status_handle();

    let input = DuplexInput { commands: command_source, events: event_sink.clone() };
    let output = DuplexOutput { events: event_sink };
    let handle = spawn(machine, input, output);

    Duplex {
      commands,
      events,
      status,
      handle,
      pending        : VecDeque::new(),
      awaiting_input : false,
    }
  }

  pub fn status(&self) -> Status {
    self.status.get()
  }

  /**
    Hands the machine its next command. If the machine has not asked for input yet, outputs it
    produces in the meantime are queued for later `recv` calls.
  */
  pub fn send(&mut self, command: Word) -> Result<(), PipelineError> {
    while !self.awaiting_input {
      match self.events.recv() {
        Ok(Event::Output(value))   => self.pending.push_back(value),
        Ok(Event::AwaitingInput)   => self.awaiting_input = true,
        Err(_)                     => return Err(PipelineError::MachineStopped)
      }
    }
    self.awaiting_input = false;
    self.commands.send(command).map_err(|_| PipelineError::MachineStopped)
  }

  /// Waits for the machine's next output.
  pub fn recv(&mut self) -> Reply<Word> {
    if let Some(value) = self.pending.pop_front() {
      return Reply::Value(value);
    }
    if self.awaiting_input {
      return Reply::AwaitingInput;
    }
    match self.events.recv() {
      Ok(Event::Output(value)) => Reply::Value(value),
      Ok(Event::AwaitingInput) => {
        self.awaiting_input = true;
        Reply::AwaitingInput
      }
      Err(_)                   => Reply::Finished
    }
  }

  /**
    Waits for the machine's next `N` outputs, e.g. the `(x, y, tile)` triples of a game board. A
    group cut short by an input request or by the machine stopping is an error.
  */
  pub fn recv_group<const N: usize>(&mut self) -> Result<Reply<[Word; N]>, PipelineError> {
    let mut group = [0; N];
    for received in 0..N {
      match (self.recv(), received) {
        (Reply::Value(value), _)     => group[received] = value,
        (Reply::AwaitingInput, 0)    => return Ok(Reply::AwaitingInput),
        (Reply::Finished, 0)         => return Ok(Reply::Finished),
        _                            => return Err(PipelineError::PartialGroup { expected: N, received })
      }
    }
    Ok(Reply::Value(group))
  }

  /**
    Closes both channels and waits for the machine's thread. A machine still waiting for input
    faults with `InputClosed`; one still producing output faults with `OutputClosed`.
  */
  pub fn finish(self) -> Result<Machine, PipelineError> {
    let Duplex { commands, events, handle, .. } = self;
    drop(commands);
    drop(events);
    handle.join().map_err(|_| PipelineError::Panicked { stage: 0 })
  }
}

// endregion

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::{Fault, FaultKind};

  // Reads its phase; phase 2 faults on an unknown opcode, anything else forwards one signal.
  const FRAGILE: [Word; 21] = [
    3, 30, 1008, 30, 2, 31, 1005, 31, 20, 3, 32, 4, 32, 99, 0, 0, 0, 0, 0, 0, 42
  ];

  #[test]
  fn spawn_returns_the_finished_machine() {
    let (sender, receiver) = io::channel(1);
    let (results, collected) = io::channel(4);
    sender.send(41).unwrap();
    let handle = spawn(Machine::load(&[3, 9, 1001, 9, 1, 9, 4, 9, 99]), receiver, results);
    let machine = handle.join().unwrap();
    assert_eq!(machine.status(), Status::Halted);
    assert_eq!(collected.iter().collect::<Vec<_>>(), vec![42]);
  }

  #[test]
  fn chain_passes_the_signal_through_every_stage() {
    // output = input * 10 + phase
    let program = [3, 15, 3, 16, 1002, 16, 10, 16, 1, 16, 15, 15, 4, 15, 99, 0, 0];
    assert_eq!(chain(&program, &[4, 3, 2, 1, 0], 0), Ok(43210));
  }

  #[test]
  fn empty_pipelines_are_rejected() {
    assert_eq!(chain(&[99], &[], 0), Err(PipelineError::NoStages));
    assert_eq!(feedback_loop(&[99], &[], 0), Err(PipelineError::NoStages));
  }

  #[test]
  fn stage_faults_are_reported_not_hung() {
    // Every stage faults on its first instruction; nothing is left waiting.
    let error = feedback_loop(&[42], &[1, 2, 3], 0).unwrap_err();
    match error {
      PipelineError::Stage { stage, fault } => {
        assert_eq!(stage, 0);
        assert_eq!(fault.kind, FaultKind::UnknownOpcode(42));
      }
      other => panic!("unexpected error {:?}", other),
    }
  }

  #[test]
  fn a_fault_cascades_down_the_chain() {
    assert_eq!(chain(&FRAGILE, &[1, 1, 1], 5), Ok(5));

    // The first stage faults; the stages after it see their input close instead of hanging.
    let error = chain(&FRAGILE, &[2, 1, 1], 5).unwrap_err();
    assert_eq!(
      error,
      PipelineError::Stage { stage: 0, fault: Fault { kind: FaultKind::UnknownOpcode(42), pc: 20, word: 42 } }
    );
  }

  #[test]
  fn first_stage_halting_early_does_not_block_the_loop() {
    // Phase 0 halts at once; phase 1 outputs 1, 2, 3 onto the first stage's link.
    let program = [3, 100, 1005, 100, 6, 99, 104, 1, 104, 2, 104, 3, 99];
    let (sender, receiver) = std::sync::mpsc::channel();
    thread::spawn(move || {
      let _ = sender.send(feedback_loop(&program, &[0, 1], 0));
    });
    let result = receiver.recv_timeout(std::time::Duration::from_secs(10));
    assert_eq!(result, Ok(Ok(3)));
  }

  #[test]
  fn halting_without_output_is_no_result() {
    assert_eq!(chain(&[3, 0, 3, 0, 99], &[1], 0), Err(PipelineError::NoResult));
  }

  #[test]
  fn duplex_queues_outputs_produced_before_input() {
    // output 1, output 2, read, output what was read.
    let mut duplex = Duplex::start(Machine::load(&[104, 1, 104, 2, 3, 9, 4, 9, 99, 0]));
    duplex.send(7).unwrap();
    assert_eq!(duplex.recv(), Reply::Value(1));
    assert_eq!(duplex.recv(), Reply::Value(2));
    assert_eq!(duplex.recv(), Reply::Value(7));
    assert_eq!(duplex.recv(), Reply::Finished);
    assert_eq!(duplex.send(1), Err(PipelineError::MachineStopped));
    assert_eq!(duplex.finish().unwrap().status(), Status::Halted);
  }

  #[test]
  fn finishing_early_closes_the_input() {
    let mut duplex = Duplex::start(Machine::load(&[3, 0, 99]));
    assert_eq!(duplex.recv(), Reply::AwaitingInput);
    assert_eq!(duplex.status(), Status::WaitingForInput);
    let machine = duplex.finish().unwrap();
    assert_eq!(machine.status().fault().map(|fault| fault.kind), Some(FaultKind::InputClosed));
  }

  #[test]
  fn partial_groups_are_errors() {
    let mut duplex = Duplex::start(Machine::load(&[104, 1, 104, 2, 99]));
    assert_eq!(duplex.recv_group::<3>(), Err(PipelineError::PartialGroup { expected: 3, received: 2 }));
    assert!(duplex.finish().is_ok());
  }
}
