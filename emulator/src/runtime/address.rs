use super::fault::Fault;
use super::registers::IndexReg;
use super::{Computer, Console};
use crate::constants::Address;

/// Memory operand of an instruction.
///
/// The effective address is `address + X[index]`, replaced by the word stored there when the
/// operand is indirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Operand {
    pub address: Address,
    pub index: Option<IndexReg>,
    pub indirect: bool,
}

impl Operand {
    #[must_use]
    pub const fn direct(address: Address) -> Self {
        Self {
            address,
            index: None,
            indirect: false,
        }
    }

    #[must_use]
    pub const fn indexed(address: Address, index: IndexReg) -> Self {
        Self {
            address,
            index: Some(index),
            indirect: false,
        }
    }

    #[must_use]
    pub const fn indirect(self) -> Self {
        Self {
            indirect: true,
            ..self
        }
    }
}

impl From<Address> for Operand {
    fn from(address: Address) -> Self {
        Self::direct(address)
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.indirect {
            write!(f, "@")?;
        }
        match self.index {
            Some(index) => write!(f, "{}({index})", self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

impl<C: Console> Computer<C> {
    /// Resolve the effective address of an operand.
    ///
    /// Indirection reads memory through the cache, so it can fault on an out of range
    /// intermediate address. The returned address itself is not checked.
    ///
    /// # Errors
    ///
    /// Fails with a memory fault if the indirect fetch is out of range.
    pub fn effective_address(&mut self, operand: &Operand) -> Result<Address, Fault> {
        let offset = operand
            .index
            .map_or(0, |index| self.registers.ixr(index));
        let address = operand.address.wrapping_add(offset);

        if operand.indirect {
            self.load(address)
        } else {
            Ok(address)
        }
    }
}
