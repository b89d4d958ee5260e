//! A validated memory address, with some convenience functions.

use std::convert::TryFrom;
use std::fmt::{Display, Formatter};
use std::ops::Add;

use crate::error::FaultKind;
use crate::Word;

// `AddressNumberType` is `usize`, as it is naturally an index into a memory store.
pub type AddressNumberType = usize;

/**
  An offset into [`Memory`](crate::Memory). Addresses are never negative: every word that is used
  as an address passes through `Address::try_from`, which turns a negative value into a
  `NegativeAddress` fault instead of wrapping around.
*/
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub struct Address(AddressNumberType);

impl Address {
  pub const ZERO: Address = Address(0);

  /// Converts the address to an index into a memory store.
  pub fn idx(&self) -> AddressNumberType {
    self.0
  }

  /// The address as a machine word, e.g. for fault reports.
  pub fn word(&self) -> Word {
    self.0 as Word
  }

  /// The address `base + offset`, as used by relative addressing.
  pub fn relative(base: Word, offset: Word) -> Result<Address, FaultKind> {
    Address::try_from(checked_sum(base, offset)?)
  }
}

/// Adds to an address-valued word. A sum outside the word range faults instead of wrapping around.
pub(crate) fn checked_sum(base: Word, offset: Word) -> Result<Word, FaultKind> {
  match base.checked_add(offset) {
    Some(sum)          => Ok(sum),
    None if offset < 0 => Err(FaultKind::NegativeAddress(Word::MIN)),
    None               => Err(FaultKind::AddressOverflow { base, offset })
  }
}

impl TryFrom<Word> for Address {
  type Error = FaultKind;

  fn try_from(word: Word) -> Result<Self, Self::Error> {
    match word < 0 {
      true  => Err(FaultKind::NegativeAddress(word)),
      false => Ok(Address(word as AddressNumberType))
    }
  }
}

impl From<AddressNumberType> for Address {
  fn from(idx: AddressNumberType) -> Self {
    Address(idx)
  }
}

impl Display for Address {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:04}", self.0)
  }
}

// Increment an address
impl Add<AddressNumberType> for Address {
  type Output = Address;
  fn add(self, rhs: AddressNumberType) -> Address {
    Address(self.0 + rhs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn negative_words_are_rejected() {
    assert_eq!(Address::try_from(-1 as Word), Err(FaultKind::NegativeAddress(-1)));
    assert_eq!(Address::try_from(12 as Word).map(|a| a.idx()), Ok(12));
  }

  #[test]
  fn relative_addresses_are_checked() {
    assert_eq!(Address::relative(10, -10), Ok(Address::ZERO));
    assert_eq!(Address::relative(-5, 20), Ok(Address::from(15)));
    assert_eq!(Address::relative(10, -11), Err(FaultKind::NegativeAddress(-1)));
    assert_eq!(Address::relative(-1, Word::MIN), Err(FaultKind::NegativeAddress(Word::MIN)));
    assert_eq!(
      Address::relative(Word::MAX, 1),
      Err(FaultKind::AddressOverflow { base: Word::MAX, offset: 1 })
    );
  }

  #[test]
  fn display_is_zero_padded() {
    assert_eq!(Address::from(7).to_string(), "0007");
    assert_eq!((Address::from(7) + 3).to_string(), "0010");
  }
}
