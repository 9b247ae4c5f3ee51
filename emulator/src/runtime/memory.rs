use thiserror::Error;

use crate::constants::{Address, Word, MEMORY_SIZE, RESERVED_END};

/// Represents errors related to memory manipulations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The given address was outside of the memory
    #[error("invalid address {0:#o}")]
    InvalidAddress(Address),
}

/// Holds the memory words of the computer.
///
/// It has 2048 words, all zeroed on startup.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    inner: Box<[Word; MEMORY_SIZE]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            inner: Box::new([0; MEMORY_SIZE]),
        }
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.inner.iter().filter(|&&w| w != 0).count();
        write!(f, "Memory {{ size: {MEMORY_SIZE}, non_zero: {used} }}")
    }
}

impl Memory {
    /// Checks if an address lies in the reserved block
    #[must_use]
    pub const fn is_reserved(address: Address) -> bool {
        address < RESERVED_END
    }

    fn index(address: Address) -> Result<usize, MemoryError> {
        let index = usize::from(address);
        if index < MEMORY_SIZE {
            Ok(index)
        } else {
            Err(MemoryError::InvalidAddress(address))
        }
    }

    /// Get the word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get(&self, address: Address) -> Result<Word, MemoryError> {
        Ok(self.inner[Self::index(address)?])
    }

    /// Set the word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn set(&mut self, address: Address, value: Word) -> Result<(), MemoryError> {
        self.inner[Self::index(address)?] = value;
        Ok(())
    }

    /// Zero the whole memory
    pub fn clear(&mut self) {
        self.inner.fill(0);
    }

    /// Iterate over a block of words, stopping at the end of the memory
    pub fn block(&self, start: Address, len: usize) -> impl Iterator<Item = (Address, Word)> + '_ {
        (usize::from(start)..MEMORY_SIZE)
            .take(len)
            .zip(self.inner.iter().skip(usize::from(start)))
            .filter_map(|(address, word)| Some((Address::try_from(address).ok()?, *word)))
    }
}

/// Compute `start + offset`, failing if it does not fit in an address
pub(crate) fn offset_address(start: Address, offset: usize) -> Result<Address, MemoryError> {
    usize::from(start)
        .checked_add(offset)
        .and_then(|address| Address::try_from(address).ok())
        .ok_or(MemoryError::InvalidAddress(start))
}
