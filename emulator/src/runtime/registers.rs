use bitflags::bitflags;
use parse_display::Display;
use thiserror::Error;

use super::fault::FaultCode;
use crate::constants::{Address, Word};

bitflags! {
    /// Condition code. Bit `n` is what `JCC n, …` tests.
    ///
    /// Only OVERFLOW and EQUAL are ever raised. UNDERFLOW and DIVZERO are reserved: a division
    /// by zero is a fault, and the fault rollback would clear the flag anyway.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct ConditionCode: u8 {
        const OVERFLOW  = 0b0001;
        const UNDERFLOW = 0b0010;
        const DIVZERO   = 0b0100;
        const EQUAL     = 0b1000;
    }
}

impl ConditionCode {
    /// The flag tested by `JCC` for a given bit index
    #[must_use]
    pub const fn bit(index: u8) -> Self {
        Self::from_bits_truncate(1 << (index & 0b11))
    }
}

impl std::fmt::Debug for ConditionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06b}", self.bits())
    }
}

/// One of the four general purpose registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Reg {
    R0,
    R1,
    R2,
    R3,
}

impl Reg {
    /// Decode a 2-bit register field
    #[must_use]
    pub const fn from_field(field: Word) -> Self {
        match field & 0b11 {
            0 => Self::R0,
            1 => Self::R1,
            2 => Self::R2,
            _ => Self::R3,
        }
    }

    #[must_use]
    pub const fn field(self) -> Word {
        self as Word
    }

    const fn index(self) -> usize {
        self as usize
    }

    /// The register holding the second half of a `MLT`/`DVD` result. Only R0 and R2 have one.
    #[must_use]
    pub const fn pair(self) -> Option<Self> {
        match self {
            Self::R0 => Some(Self::R1),
            Self::R2 => Some(Self::R3),
            Self::R1 | Self::R3 => None,
        }
    }
}

/// One of the three index registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum IndexReg {
    X1,
    X2,
    X3,
}

impl IndexReg {
    /// Decode a 2-bit index field. Zero means "no index register".
    #[must_use]
    pub const fn from_field(field: Word) -> Option<Self> {
        match field & 0b11 {
            0 => None,
            1 => Some(Self::X1),
            2 => Some(Self::X2),
            _ => Some(Self::X3),
        }
    }

    #[must_use]
    pub const fn field(self) -> Word {
        self as Word + 1
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Any register of the machine, as named in the debugger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Register {
    #[display("{0}")]
    Gpr(Reg),
    #[display("{0}")]
    Index(IndexReg),
    PC,
    MAR,
    MBR,
    IR,
    MFR,
    CC,
}

#[derive(Error, Debug)]
#[error("could not parse register")]
pub struct RegisterParseError;

impl std::str::FromStr for Register {
    type Err = RegisterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let register = match s.to_uppercase().as_str() {
            "R0" => Self::Gpr(Reg::R0),
            "R1" => Self::Gpr(Reg::R1),
            "R2" => Self::Gpr(Reg::R2),
            "R3" => Self::Gpr(Reg::R3),
            "X1" => Self::Index(IndexReg::X1),
            "X2" => Self::Index(IndexReg::X2),
            "X3" => Self::Index(IndexReg::X3),
            "PC" => Self::PC,
            "MAR" => Self::MAR,
            "MBR" => Self::MBR,
            "IR" => Self::IR,
            "MFR" => Self::MFR,
            "CC" => Self::CC,
            _ => return Err(RegisterParseError),
        };
        Ok(register)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    /// General purpose
    pub gpr: [Word; 4],

    /// Index registers X1 to X3
    pub ixr: [Word; 3],

    /// Program counter
    pub pc: Address,

    /// Memory address register, last address sent to the memory
    pub mar: Address,

    /// Memory buffer register, last word read or written
    pub mbr: Word,

    /// Instruction register
    pub ir: Word,

    /// Machine fault register
    pub mfr: Word,

    /// Condition code
    pub cc: ConditionCode,
}

impl Registers {
    #[must_use]
    pub const fn gpr(&self, reg: Reg) -> Word {
        self.gpr[reg.index()]
    }

    pub fn set_gpr(&mut self, reg: Reg, value: Word) {
        self.gpr[reg.index()] = value;
    }

    #[must_use]
    pub const fn ixr(&self, reg: IndexReg) -> Word {
        self.ixr[reg.index()]
    }

    pub fn set_ixr(&mut self, reg: IndexReg, value: Word) {
        self.ixr[reg.index()] = value;
    }

    #[must_use]
    pub fn fault(&self) -> FaultCode {
        FaultCode::from_word(self.mfr)
    }

    #[must_use]
    pub fn get(&self, register: Register) -> Word {
        match register {
            Register::Gpr(reg) => self.gpr(reg),
            Register::Index(reg) => self.ixr(reg),
            Register::PC => self.pc,
            Register::MAR => self.mar,
            Register::MBR => self.mbr,
            Register::IR => self.ir,
            Register::MFR => self.mfr,
            Register::CC => Word::from(self.cc.bits()),
        }
    }

    /// Set a register value. The condition code keeps only its 4 low bits.
    pub fn set(&mut self, register: Register, value: Word) {
        match register {
            Register::Gpr(reg) => self.set_gpr(reg, value),
            Register::Index(reg) => self.set_ixr(reg, value),
            Register::PC => self.pc = value,
            Register::MAR => self.mar = value,
            Register::MBR => self.mbr = value,
            Register::IR => self.ir = value,
            Register::MFR => self.mfr = value,
            Register::CC => {
                #[allow(clippy::cast_possible_truncation)]
                let bits = (value & 0b1111) as u8;
                self.cc = ConditionCode::from_bits_truncate(bits);
            }
        }
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r0, r1, r2, r3] = self.gpr;
        let [x1, x2, x3] = self.ixr;
        write!(
            f,
            "R0 = {r0:06o} | R1 = {r1:06o} | R2 = {r2:06o} | R3 = {r3:06o} | \
             X1 = {x1:06o} | X2 = {x2:06o} | X3 = {x3:06o} | \
             PC = {:04o} | MAR = {:04o} | MBR = {:06o} | IR = {:06o} | MFR = {} | CC = {:?}",
            self.pc, self.mar, self.mbr, self.ir, self.mfr, self.cc
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_test() {
        assert_eq!(Reg::from_field(0b110), Reg::R2);
        assert_eq!(Reg::R3.field(), 3);
        assert_eq!(IndexReg::from_field(0), None);
        assert_eq!(IndexReg::from_field(3), Some(IndexReg::X3));
        assert_eq!(IndexReg::X1.field(), 1);
        assert_eq!(Reg::R0.pair(), Some(Reg::R1));
        assert_eq!(Reg::R1.pair(), None);
    }

    #[test]
    fn condition_code_bit_test() {
        assert_eq!(ConditionCode::bit(0), ConditionCode::OVERFLOW);
        assert_eq!(ConditionCode::bit(1), ConditionCode::UNDERFLOW);
        assert_eq!(ConditionCode::bit(2), ConditionCode::DIVZERO);
        assert_eq!(ConditionCode::bit(3), ConditionCode::EQUAL);
    }

    #[test]
    fn get_set_test() {
        let mut registers = Registers::default();
        registers.set(Register::Gpr(Reg::R2), 0o777);
        registers.set(Register::Index(IndexReg::X3), 5);
        registers.set(Register::CC, 0xFFFF);

        assert_eq!(registers.gpr(Reg::R2), 0o777);
        assert_eq!(registers.ixr(IndexReg::X3), 5);
        assert_eq!(registers.get(Register::CC), 0b1111);
        assert!(registers.cc.contains(ConditionCode::EQUAL));
    }

    #[test]
    fn parse_register_test() {
        assert_eq!("r1".parse::<Register>().unwrap(), Register::Gpr(Reg::R1));
        assert_eq!(
            "X2".parse::<Register>().unwrap(),
            Register::Index(IndexReg::X2)
        );
        assert_eq!("mfr".parse::<Register>().unwrap(), Register::MFR);
        assert!("x0".parse::<Register>().is_err());
        assert_eq!(Register::Gpr(Reg::R1).to_string(), "R1");
        assert_eq!(Register::MBR.to_string(), "MBR");
    }
}
