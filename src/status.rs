use std::fmt::{Display, Formatter};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Fault;

/**
  The lifecycle state of a machine.

  ```text
  Initialized ─start─> Running ─halt─> Halted
                        │  ↑
                 input  ↓  │ value available
                   WaitingForInput
                        │
         any fault ─────┴──> Faulted
  ```

  `Halted` and `Faulted` are terminal.
*/
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
  Initialized,
  Running,
  WaitingForInput,
  Halted,
  Faulted(Fault),
}

impl Status {
  pub fn is_terminal(&self) -> bool {
    matches!(self, Status::Halted | Status::Faulted(_))
  }

  pub fn fault(&self) -> Option<Fault> {
    match self {
      Status::Faulted(fault) => Some(*fault),
      _                      => None
    }
  }
}

impl Display for Status {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Status::Initialized     => write!(f, "Initialized"),
      Status::Running         => write!(f, "Running"),
      Status::WaitingForInput => write!(f, "WaitingForInput"),
      Status::Halted          => write!(f, "Halted"),
      Status::Faulted(fault)  => write!(f, "Faulted: {}", fault),
    }
  }
}

/**
  A shared, read-only view of a machine's status. The machine keeps the writing end; handles can be
  cloned freely and read from any thread while the machine runs on another.
*/
#[derive(Clone, Debug)]
pub struct StatusHandle(Arc<RwLock<Status>>);

impl StatusHandle {
  pub(crate) fn new() -> StatusHandle {
    StatusHandle(Arc::new(RwLock::new(Status::Initialized)))
  }

  pub fn get(&self) -> Status {
    *self.0.read()
  }

  /// Terminal states are never left.
  pub(crate) fn set(&self, status: Status) {
    let mut current = self.0.write();
    if !current.is_terminal() {
      *current = status;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::FaultKind;

  #[test]
  fn handles_share_state() {
    let handle = StatusHandle::new();
    let view = handle.clone();
    assert_eq!(view.get(), Status::Initialized);
    handle.set(Status::Running);
    assert_eq!(view.get(), Status::Running);
  }

  #[test]
  fn terminal_states_stick() {
    let handle = StatusHandle::new();
    handle.set(Status::Halted);
    handle.set(Status::Running);
    assert_eq!(handle.get(), Status::Halted);

    let handle = StatusHandle::new();
    let fault = Fault { kind: FaultKind::InputClosed, pc: 0, word: 3 };
    handle.set(Status::Faulted(fault));
    handle.set(Status::Halted);
    assert_eq!(handle.get().fault(), Some(fault));
  }
}
