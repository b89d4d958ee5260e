/*!
  The machine's memory store.

  Memory is effectively infinite: every non-negative address can be read (unset cells read as
  zero) and written. Programs overwhelmingly touch a compact prefix of the address space plus a
  scratch area a little beyond it, so that region lives in a dynamically grown vector. Writes far
  past the end of the vector spill into an ordered map, which keeps a stray write to address
  `10^12` from allocating terabytes.
*/

use std::collections::BTreeMap;
use std::convert::TryFrom;

use crate::address::{Address, AddressNumberType};
use crate::error::FaultKind;
use crate::Word;

/// How far past the end of the dense region a write may land and still grow the vector.
const DENSE_SLACK: AddressNumberType = 1 << 16;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Memory {
  dense  : Vec<Word>,
  sparse : BTreeMap<AddressNumberType, Word>,
}

impl Memory {

  pub fn new() -> Memory {
    Memory::default()
  }

  /// Initializes memory with `memory[i] = words[i]`.
  pub fn from_program(words: &[Word]) -> Memory {
    Memory {
      dense  : words.to_vec(),
      sparse : BTreeMap::new(),
    }
  }

  pub fn read(&self, address: Address) -> Word {
    let idx = address.idx();
    match self.dense.get(idx) {
      Some(value) => *value,
      None        => self.sparse.get(&idx).copied().unwrap_or(0)
    }
  }

  /**
    Sets the value at the given address, dynamically growing the dense region if the address is
    close to its end and spilling into the sparse map otherwise.
  */
  pub fn write(&mut self, address: Address, value: Word) {
    let idx = address.idx();

    if idx < self.dense.len() {
      self.dense[idx] = value;
      return;
    }

    if idx - self.dense.len() < DENSE_SLACK {
      self.dense.resize(idx + 1, 0);
      // Cells that were spilled earlier and are now covered by the vector move into it.
      let above = self.sparse.split_off(&(idx + 1));
      for (spilled, spilled_value) in std::mem::replace(&mut self.sparse, above) {
        self.dense[spilled] = spilled_value;
      }
      self.dense[idx] = value;
    } else {
      self.sparse.insert(idx, value);
    }
  }

  /// Reads the cell at a raw word, faulting if the word is not a valid address.
  pub fn read_word(&self, address: Word) -> Result<Word, FaultKind> {
    Ok(self.read(Address::try_from(address)?))
  }

  /// Writes the cell at a raw word, faulting if the word is not a valid address.
  pub fn write_word(&mut self, address: Word, value: Word) -> Result<(), FaultKind> {
    self.write(Address::try_from(address)?, value);
    Ok(())
  }

  /// One past the highest address that has been loaded or written.
  pub fn len(&self) -> AddressNumberType {
    match self.sparse.keys().next_back() {
      Some(highest) => highest + 1,
      None          => self.dense.len()
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Every stored cell in address order, including cells that hold zero.
  pub fn cells(&self) -> impl Iterator<Item = (Address, Word)> + '_ {
    self.dense
        .iter()
        .enumerate()
        .map(|(idx, value)| (Address::from(idx), *value))
        .chain(self.sparse.iter().map(|(idx, value)| (Address::from(*idx), *value)))
  }
}
