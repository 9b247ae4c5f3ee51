use tracing::{trace, warn};

use crate::constants::{Address, Word, MEMORY_SIZE};

mod address;
mod cache;
mod console;
mod devices;
mod encoding;
mod fault;
mod instructions;
mod memory;
mod registers;
mod scheduler;
mod search;
mod trap;

pub use self::address::Operand;
pub use self::cache::{Access, Cache, CacheLine};
pub use self::console::{Console, Printer};
pub use self::devices::{Device, Keyboard};
pub use self::encoding::{decode, DecodeError, EncodeError, Opcode};
pub use self::fault::{Fault, FaultCode, IllegalOperation};
pub use self::instructions::{Direction, Flow, Instruction, Shift, ShiftMode};
pub use self::memory::{Memory, MemoryError};
pub use self::registers::{ConditionCode, IndexReg, Reg, Register, RegisterParseError, Registers};
pub use self::scheduler::RunState;
pub use self::search::{find_word, Location, Segmenter};
pub use self::trap::{SearchPhase, Service, Session};

use self::trap::TrapController;

/// Reinterpret a word as a two's-complement value
#[allow(clippy::cast_possible_wrap)]
pub(crate) const fn signed(word: Word) -> i16 {
    word as i16
}

/// Store a two's-complement value in a word
#[allow(clippy::cast_sign_loss)]
pub(crate) const fn unsigned(value: i16) -> Word {
    value as Word
}

/// The whole machine: registers, memory, cache, devices and trap state.
///
/// Side effects visible to the user (printed characters, diagnostics) go through the console.
pub struct Computer<C = Printer> {
    pub registers: Registers,
    pub memory: Memory,
    pub cache: Cache,
    pub keyboard: Keyboard,
    pub cycles: usize,
    console: C,
    traps: TrapController,
    state: RunState,
}

impl<C> std::fmt::Debug for Computer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Computer {{ registers: {:?}, state: {:?}, cycles: {}, memory: [...] }}",
            self.registers, self.state, self.cycles
        )
    }
}

impl Default for Computer<Printer> {
    fn default() -> Self {
        Self::with_console(Printer::default())
    }
}

impl<C: Console> Computer<C> {
    pub fn with_console(console: C) -> Self {
        Self {
            registers: Registers::default(),
            memory: Memory::default(),
            cache: Cache::default(),
            keyboard: Keyboard::default(),
            cycles: 0,
            console,
            traps: TrapController::default(),
            state: RunState::Running,
        }
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    /// Zero the memory and the registers, drop the cache content, pending input and any trap in
    /// progress. The configured paragraph text is kept.
    pub fn reset(&mut self) {
        self.registers = Registers::default();
        self.memory.clear();
        self.cache.invalidate();
        self.keyboard.clear();
        self.traps.cancel();
        self.cycles = 0;
        self.state = RunState::Running;
        self.console.refresh();
    }

    /// Text written in memory by the "load paragraph" trap service
    pub fn set_paragraph(&mut self, text: impl Into<Vec<u8>>) {
        self.traps.set_paragraph(text.into());
    }

    /// Drop any trap session in progress. The next `TRAP` starts from scratch.
    pub fn cancel_trap(&mut self) {
        self.traps.cancel();
    }

    /// The trap session in progress, if any
    #[must_use]
    pub fn trap_session(&self) -> Option<&Session> {
        self.traps.session()
    }

    /// Read a memory word without going through the cache
    ///
    /// # Errors
    ///
    /// Fails if the address is out of bounds.
    pub fn peek(&self, address: Address) -> Result<Word, MemoryError> {
        self.memory.get(address)
    }

    /// Write text in memory, one byte per word, bypassing the cache.
    ///
    /// A zero sentinel follows the text if there is room left. Returns the number of bytes
    /// written.
    ///
    /// # Errors
    ///
    /// Fails if the start address is outside of the memory.
    pub fn load_text(&mut self, start: Address, text: &[u8]) -> Result<usize, MemoryError> {
        let room = MEMORY_SIZE
            .checked_sub(usize::from(start))
            .filter(|room| *room > 0)
            .ok_or(MemoryError::InvalidAddress(start))?;

        let count = text.len().min(room);
        for (offset, byte) in text.iter().take(count).enumerate() {
            let address = memory::offset_address(start, offset)?;
            self.memory.set(address, Word::from(*byte))?;
        }
        if count < room {
            self.memory.set(memory::offset_address(start, count)?, 0)?;
        }

        self.cache.invalidate();
        Ok(count)
    }

    fn check_reserved(&mut self, address: Address) {
        if Memory::is_reserved(address) {
            warn!(address, "Access to a reserved address");
            self.console
                .log(&format!("-> WARNING reserved address @ {address:04o}"));
        }
    }

    /// Read a word through the cache, updating MAR and MBR
    pub(crate) fn load(&mut self, address: Address) -> Result<Word, Fault> {
        self.registers.mar = address;
        self.check_reserved(address);
        let (value, access) = self.cache.read(&self.memory, address)?;
        self.console
            .log(&format!("-> CACHE {access} (Read) @ {address:04o}"));
        self.registers.mbr = value;
        Ok(value)
    }

    /// Write a word through the cache, updating MAR and MBR
    pub(crate) fn store(&mut self, address: Address, value: Word) -> Result<(), Fault> {
        self.registers.mar = address;
        self.check_reserved(address);
        let access = self.cache.write(&mut self.memory, address, value)?;
        trace!(address, value, %access, "Stored word");
        self.registers.mbr = value;
        Ok(())
    }
}
