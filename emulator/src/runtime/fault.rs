use thiserror::Error;

use super::memory::MemoryError;
use super::registers::Reg;
use crate::constants::Word;

/// Value held by the machine fault register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultCode {
    #[default]
    None,
    IllegalMemoryAddress,
    IllegalOpcode,
    IllegalOperation,
}

impl FaultCode {
    #[must_use]
    pub const fn word(self) -> Word {
        match self {
            Self::None => 0,
            Self::IllegalMemoryAddress => 1,
            Self::IllegalOpcode => 2,
            Self::IllegalOperation => 3,
        }
    }

    #[must_use]
    pub const fn from_word(word: Word) -> Self {
        match word {
            1 => Self::IllegalMemoryAddress,
            2 => Self::IllegalOpcode,
            3 => Self::IllegalOperation,
            _ => Self::None,
        }
    }
}

/// Opcode-level precondition violations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllegalOperation {
    #[error("division by zero")]
    DivideByZero,

    #[error("register {0} can not hold a two-word result")]
    InvalidRegisterPair(Reg),

    #[error("index register 0 is not a valid target")]
    NoIndexRegister,

    #[error("unknown device {0}")]
    UnknownDevice(u8),

    #[error("device {device} does not support {operation}")]
    UnsupportedDeviceOperation {
        device: u8,
        operation: &'static str,
    },

    #[error("unknown trap service {0}")]
    UnknownTrapService(u8),
}

/// Fatal conditions. Any of them halts the computer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    #[error("illegal memory address ({0})")]
    IllegalMemoryAddress(#[from] MemoryError),

    #[error("illegal opcode {0:#04o}")]
    IllegalOpcode(u8),

    #[error("illegal operation: {0}")]
    IllegalOperation(#[from] IllegalOperation),
}

impl Fault {
    #[must_use]
    pub const fn code(&self) -> FaultCode {
        match self {
            Self::IllegalMemoryAddress(_) => FaultCode::IllegalMemoryAddress,
            Self::IllegalOpcode(_) => FaultCode::IllegalOpcode,
            Self::IllegalOperation(_) => FaultCode::IllegalOperation,
        }
    }
}
