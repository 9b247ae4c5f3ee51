//! A 16-line, fully associative cache sitting in front of the memory.
//!
//! Lines are replaced in FIFO order. Writes go through to the memory and only update a line that
//! already holds the address: a write miss never allocates a line.

use parse_display::Display;
use tracing::trace;

use super::memory::{Memory, MemoryError};
use crate::constants::{Address, Word, CACHE_LINES};

/// Outcome of a cache lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "UPPERCASE")]
pub enum Access {
    Hit,
    Miss,
}

/// A single line of the cache. The tag is the full address.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheLine {
    pub tag: Address,
    pub data: Word,
    pub valid: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Cache {
    lines: [CacheLine; CACHE_LINES],

    /// Next line to be replaced
    fifo: usize,

    hits: u64,
    misses: u64,
}

impl Cache {
    fn find(&self, address: Address) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.valid && line.tag == address)
    }

    /// Read a word, loading it in the cache on a miss
    ///
    /// # Errors
    ///
    /// Fails if the address is outside of the memory. Nothing is allocated in that case.
    pub fn read(&mut self, memory: &Memory, address: Address) -> Result<(Word, Access), MemoryError> {
        if let Some(index) = self.find(address) {
            self.hits += 1;
            trace!(address, line = index, "Cache hit");
            return Ok((self.lines[index].data, Access::Hit));
        }

        let data = memory.get(address)?;
        self.misses += 1;
        trace!(address, line = self.fifo, "Cache miss");

        self.lines[self.fifo] = CacheLine {
            tag: address,
            data,
            valid: true,
        };
        self.fifo = (self.fifo + 1) % CACHE_LINES;

        Ok((data, Access::Miss))
    }

    /// Write a word through to the memory, updating the matching line if there is one
    ///
    /// # Errors
    ///
    /// Fails if the address is outside of the memory. The cache is left untouched in that case.
    pub fn write(
        &mut self,
        memory: &mut Memory,
        address: Address,
        data: Word,
    ) -> Result<Access, MemoryError> {
        memory.set(address, data)?;

        if let Some(index) = self.find(address) {
            self.lines[index].data = data;
            Ok(Access::Hit)
        } else {
            Ok(Access::Miss)
        }
    }

    /// Drop every line and rewind the FIFO pointer
    pub fn invalidate(&mut self) {
        for line in &mut self.lines {
            line.valid = false;
        }
        self.fifo = 0;
        trace!("Cache invalidated");
    }

    /// Checks if a valid line holds this address
    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        self.find(address).is_some()
    }

    #[must_use]
    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }

    #[must_use]
    pub const fn fifo_pointer(&self) -> usize {
        self.fifo
    }

    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }
}

impl std::fmt::Display for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "FIFO Pointer -> Line {}", self.fifo)?;
        writeln!(f, "----------------------------------")?;
        writeln!(f, "LN | V | TAG (OCT) | DATA (OCT)")?;
        writeln!(f, "----------------------------------")?;
        for (index, line) in self.lines.iter().enumerate() {
            if line.valid {
                let tag = format!("{:04o}", line.tag);
                let data = format!("{:06o}", line.data);
                writeln!(f, "{index:02} | 1 | {tag:<9} | {data:<10}")?;
            } else {
                writeln!(f, "{index:02} | 0 | {:<9} | {:<10}", "-", "-")?;
            }
        }
        Ok(())
    }
}
