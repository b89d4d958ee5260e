/*!
  The two capabilities a machine has for talking to its environment: a source of input values and a
  sink for output values. Both may block. The usual implementations are the two ends of a
  `std::sync::mpsc` channel; a bound of zero gives a true rendezvous, where every hand-off waits for
  both parties. In-memory queues are provided for drivers that know all inputs up front.
*/

use std::collections::VecDeque;
use std::sync::mpsc::{sync_channel, Receiver, Sender, SyncSender};

use crate::Word;

pub trait Input {
  /// Blocks until the next value is available. `None` means no value will ever arrive.
  fn read(&mut self) -> Option<Word>;
}

pub trait Output {
  /// Blocks until the value is accepted. Gives the value back if the receiving party is gone.
  fn write(&mut self, value: Word) -> Result<(), Word>;
}

impl Input for Receiver<Word> {
  fn read(&mut self) -> Option<Word> {
    self.recv().ok()
  }
}

impl Input for VecDeque<Word> {
  fn read(&mut self) -> Option<Word> {
    self.pop_front()
  }
}

impl Output for SyncSender<Word> {
  fn write(&mut self, value: Word) -> Result<(), Word> {
    self.send(value).map_err(|error| error.0)
  }
}

impl Output for Sender<Word> {
  fn write(&mut self, value: Word) -> Result<(), Word> {
    self.send(value).map_err(|error| error.0)
  }
}

impl Output for Vec<Word> {
  fn write(&mut self, value: Word) -> Result<(), Word> {
    self.push(value);
    Ok(())
  }
}

/// A bounded channel. Senders block once `capacity` values are waiting.
pub fn channel(capacity: usize) -> (SyncSender<Word>, Receiver<Word>) {
  sync_channel(capacity)
}

/// A channel with no buffer: every send waits for the matching receive.
pub fn rendezvous() -> (SyncSender<Word>, Receiver<Word>) {
  sync_channel(0)
}
