//! Binary layout of the instruction words.
//!
//! The opcode always sits in the 6 high bits. The rest of the word depends on the instruction
//! format:
//!
//! ```text
//!  15    10  9  8  7  6  5  4  3  2  1  0
//! [ opcode ][  r ][     address (8)      ]   LDR STR LDA AMR SMR JZ JNE JCC JMA JSR SOB JGE
//! [ opcode ][ 00 ][  x ][ i][ address (5)]   LDX STX
//! [ opcode ][  r ][ 0  0  0][ immed (5)  ]   AIR SIR (RFS with r = 0)
//! [ opcode ][ rx ][ ry ][ 0  0  0  0  0 0]   MLT DVD TRR AND ORR NOT
//! [ opcode ][  r ][al][lr][0 0][count (4)]   SRC RRC
//! [ opcode ][  r ][     device id (8)    ]   IN OUT CHK
//! [ opcode ][ 0  0  0  0  0  0][svc (4)  ]   TRAP
//! ```

use parse_display::Display;
use thiserror::Error;

use super::address::Operand;
use super::fault::{Fault, IllegalOperation};
use super::instructions::{Direction, Instruction, Shift, ShiftMode};
use super::registers::{IndexReg, Reg};
use crate::constants::{Address, Word};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display(style = "UPPERCASE")]
#[repr(u8)]
pub enum Opcode {
    Hlt = 0o00,
    Ldr = 0o01,
    Str = 0o02,
    Lda = 0o03,
    Amr = 0o04,
    Smr = 0o05,
    Air = 0o06,
    Sir = 0o07,
    Jz = 0o10,
    Jne = 0o11,
    Jcc = 0o12,
    Jma = 0o13,
    Jsr = 0o14,
    Rfs = 0o15,
    Sob = 0o16,
    Jge = 0o17,
    Trap = 0o30,
    Src = 0o31,
    Rrc = 0o32,
    Ldx = 0o41,
    Stx = 0o42,
    In = 0o61,
    Out = 0o62,
    Chk = 0o63,
    Mlt = 0o70,
    Dvd = 0o71,
    Trr = 0o72,
    And = 0o73,
    Orr = 0o74,
    Not = 0o75,
}

impl Opcode {
    pub const ALL: [Self; 30] = [
        Self::Hlt,
        Self::Ldr,
        Self::Str,
        Self::Lda,
        Self::Amr,
        Self::Smr,
        Self::Air,
        Self::Sir,
        Self::Jz,
        Self::Jne,
        Self::Jcc,
        Self::Jma,
        Self::Jsr,
        Self::Rfs,
        Self::Sob,
        Self::Jge,
        Self::Trap,
        Self::Src,
        Self::Rrc,
        Self::Ldx,
        Self::Stx,
        Self::In,
        Self::Out,
        Self::Chk,
        Self::Mlt,
        Self::Dvd,
        Self::Trr,
        Self::And,
        Self::Orr,
        Self::Not,
    ];

    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|opcode| opcode.code() == code)
            .ok_or(DecodeError::UnknownOpcode(code))
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown opcode {0:#04o}")]
    UnknownOpcode(u8),

    #[error("missing index register")]
    MissingIndexRegister,
}

impl From<DecodeError> for Fault {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::UnknownOpcode(code) => Self::IllegalOpcode(code),
            DecodeError::MissingIndexRegister => IllegalOperation::NoIndexRegister.into(),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("address {address} does not fit in {bits} bits")]
    AddressOutOfRange { address: Address, bits: u32 },

    #[error("{0} can not be encoded with an indexed or indirect operand")]
    UnsupportedAddressing(Opcode),

    #[error("value {value} does not fit in {bits} bits")]
    FieldOutOfRange { value: u8, bits: u32 },
}

/// Extract `bits` bits of a word, starting at `shift`
#[allow(clippy::cast_possible_truncation)]
const fn field(word: Word, shift: u32, bits: u32) -> u8 {
    ((word >> shift) & ((1 << bits) - 1)) as u8
}

fn check_field(value: u8, bits: u32) -> Result<Word, EncodeError> {
    if u32::from(value) < 1 << bits {
        Ok(Word::from(value))
    } else {
        Err(EncodeError::FieldOutOfRange { value, bits })
    }
}

fn check_address(address: Address, bits: u32) -> Result<Word, EncodeError> {
    if u32::from(address) < 1 << bits {
        Ok(address)
    } else {
        Err(EncodeError::AddressOutOfRange { address, bits })
    }
}

/// Decode an instruction word
///
/// # Errors
///
/// Fails on an opcode outside of the instruction set, or on a `LDX`/`STX` without an index
/// register.
pub fn decode(word: Word) -> Result<Instruction, DecodeError> {
    use Instruction as I;

    let opcode = Opcode::try_from(field(word, 10, 6))?;
    let r = Reg::from_field(word >> 8);
    let ry = Reg::from_field(word >> 6);
    let ra = Operand::direct(word & 0xFF);
    let immed = field(word, 0, 5);
    let device = field(word, 0, 8);

    let instruction = match opcode {
        Opcode::Hlt => I::Hlt,
        Opcode::Ldr => I::Ldr(r, ra),
        Opcode::Str => I::Str(r, ra),
        Opcode::Lda => I::Lda(r, ra),
        Opcode::Amr => I::Amr(r, ra),
        Opcode::Smr => I::Smr(r, ra),
        Opcode::Air => I::Air(r, immed),
        Opcode::Sir => I::Sir(r, immed),
        Opcode::Jz => I::Jz(r, ra),
        Opcode::Jne => I::Jne(r, ra),
        Opcode::Jcc => I::Jcc(field(word, 8, 2), ra),
        Opcode::Jma => I::Jma(ra),
        Opcode::Jsr => I::Jsr(ra),
        Opcode::Rfs => I::Rfs(immed),
        Opcode::Sob => I::Sob(r, ra),
        Opcode::Jge => I::Jge(r, ra),
        Opcode::Trap => I::Trap(field(word, 0, 4)),
        Opcode::Src | Opcode::Rrc => {
            let shift = Shift {
                count: field(word, 0, 4),
                direction: if field(word, 6, 1) == 1 {
                    Direction::Left
                } else {
                    Direction::Right
                },
                mode: if field(word, 7, 1) == 1 {
                    ShiftMode::Logical
                } else {
                    ShiftMode::Arithmetic
                },
            };
            if opcode == Opcode::Src {
                I::Src(r, shift)
            } else {
                I::Rrc(r, shift)
            }
        }
        Opcode::Ldx | Opcode::Stx => {
            let x = IndexReg::from_field(word >> 6).ok_or(DecodeError::MissingIndexRegister)?;
            let mut operand = Operand::direct(word & 0x1F);
            if field(word, 5, 1) == 1 {
                operand = operand.indirect();
            }
            if opcode == Opcode::Ldx {
                I::Ldx(x, operand)
            } else {
                I::Stx(x, operand)
            }
        }
        Opcode::In => I::In(r, device),
        Opcode::Out => I::Out(r, device),
        Opcode::Chk => I::Chk(r, device),
        Opcode::Mlt => I::Mlt(r, ry),
        Opcode::Dvd => I::Dvd(r, ry),
        Opcode::Trr => I::Trr(r, ry),
        Opcode::And => I::And(r, ry),
        Opcode::Orr => I::Orr(r, ry),
        Opcode::Not => I::Not(r),
    };

    Ok(instruction)
}

impl Instruction {
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        use Instruction as I;
        match self {
            I::Hlt => Opcode::Hlt,
            I::Ldr(..) => Opcode::Ldr,
            I::Str(..) => Opcode::Str,
            I::Lda(..) => Opcode::Lda,
            I::Amr(..) => Opcode::Amr,
            I::Smr(..) => Opcode::Smr,
            I::Air(..) => Opcode::Air,
            I::Sir(..) => Opcode::Sir,
            I::Jz(..) => Opcode::Jz,
            I::Jne(..) => Opcode::Jne,
            I::Jcc(..) => Opcode::Jcc,
            I::Jma(..) => Opcode::Jma,
            I::Jsr(..) => Opcode::Jsr,
            I::Rfs(..) => Opcode::Rfs,
            I::Sob(..) => Opcode::Sob,
            I::Jge(..) => Opcode::Jge,
            I::Trap(..) => Opcode::Trap,
            I::Src(..) => Opcode::Src,
            I::Rrc(..) => Opcode::Rrc,
            I::Ldx(..) => Opcode::Ldx,
            I::Stx(..) => Opcode::Stx,
            I::In(..) => Opcode::In,
            I::Out(..) => Opcode::Out,
            I::Chk(..) => Opcode::Chk,
            I::Mlt(..) => Opcode::Mlt,
            I::Dvd(..) => Opcode::Dvd,
            I::Trr(..) => Opcode::Trr,
            I::And(..) => Opcode::And,
            I::Orr(..) => Opcode::Orr,
            I::Not(..) => Opcode::Not,
        }
    }

    /// Encode the instruction in a single word
    ///
    /// # Errors
    ///
    /// Fails if an operand or an immediate can not be represented in its field. Only `LDX` and
    /// `STX` accept an indirect operand, and no instruction accepts an indexed one.
    pub fn encode(&self) -> Result<Word, EncodeError> {
        use Instruction as I;

        let opcode = self.opcode();
        let ra = |operand: &Operand| {
            if operand.index.is_some() || operand.indirect {
                return Err(EncodeError::UnsupportedAddressing(opcode));
            }
            check_address(operand.address, 8)
        };
        let reg = |r: &Reg| r.field() << 8;
        let pair = |rx: &Reg, ry: &Reg| (rx.field() << 8) | (ry.field() << 6);

        let operands = match self {
            I::Hlt => 0,
            I::Ldr(r, op)
            | I::Str(r, op)
            | I::Lda(r, op)
            | I::Amr(r, op)
            | I::Smr(r, op)
            | I::Jz(r, op)
            | I::Jne(r, op)
            | I::Sob(r, op)
            | I::Jge(r, op) => reg(r) | ra(op)?,
            I::Jcc(bit, op) => (check_field(*bit, 2)? << 8) | ra(op)?,
            I::Jma(op) | I::Jsr(op) => ra(op)?,
            I::Air(r, immed) | I::Sir(r, immed) => reg(r) | check_field(*immed, 5)?,
            I::Rfs(immed) => check_field(*immed, 5)?,
            I::Trap(service) => check_field(*service, 4)?,
            I::Src(r, shift) | I::Rrc(r, shift) => {
                let al = Word::from(shift.mode == ShiftMode::Logical) << 7;
                let lr = Word::from(shift.direction == Direction::Left) << 6;
                reg(r) | al | lr | check_field(shift.count, 4)?
            }
            I::Ldx(x, op) | I::Stx(x, op) => {
                if op.index.is_some() {
                    return Err(EncodeError::UnsupportedAddressing(opcode));
                }
                let i = Word::from(op.indirect) << 5;
                (x.field() << 6) | i | check_address(op.address, 5)?
            }
            I::In(r, device) | I::Out(r, device) | I::Chk(r, device) => {
                reg(r) | Word::from(*device)
            }
            I::Mlt(rx, ry) | I::Dvd(rx, ry) | I::Trr(rx, ry) | I::And(rx, ry) | I::Orr(rx, ry) => {
                pair(rx, ry)
            }
            I::Not(rx) => reg(rx),
        };

        Ok((Word::from(opcode.code()) << 10) | operands)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn opcode_test() {
        for opcode in Opcode::ALL {
            assert_eq!(Opcode::try_from(opcode.code()), Ok(opcode));
        }
        assert_eq!(Opcode::try_from(0o20), Err(DecodeError::UnknownOpcode(0o20)));
        assert_eq!(Opcode::Trap.to_string(), "TRAP");
    }

    #[test]
    fn decode_test() {
        use Instruction as I;

        // Words produced by the assembler
        let cases = [
            (0o002437, I::Ldr(Reg::R1, Operand::direct(0o37))),
            (0o004777, I::Str(Reg::R1, Operand::direct(0o377))),
            (0o014412, I::Air(Reg::R1, 10)),
            (0o102110, I::Ldx(IndexReg::X1, Operand::direct(8))),
            (0o104270, I::Stx(IndexReg::X2, Operand::direct(24).indirect())),
            (0o025403, I::Jcc(3, Operand::direct(3))),
            (0o062703, I::Src(
                Reg::R1,
                Shift {
                    count: 3,
                    direction: Direction::Left,
                    mode: ShiftMode::Logical,
                },
            )),
            (0o060001, I::Trap(1)),
            (0o142400, I::In(Reg::R1, 0)),
            (0o161200, I::Mlt(Reg::R2, Reg::R2)),
            (0o172400, I::Not(Reg::R1)),
            (0o000000, I::Hlt),
        ];

        for (word, expected) in cases {
            assert_eq!(decode(word), Ok(expected), "decoding {word:06o}");
            assert_eq!(expected.encode(), Ok(word), "encoding {expected}");
        }
    }

    #[test]
    fn decode_error_test() {
        assert_eq!(decode(0o177777), Err(DecodeError::UnknownOpcode(0o77)));
        assert_eq!(decode(0o102010), Err(DecodeError::MissingIndexRegister));

        let fault: Fault = DecodeError::UnknownOpcode(0o77).into();
        assert_eq!(fault, Fault::IllegalOpcode(0o77));
        let fault: Fault = DecodeError::MissingIndexRegister.into();
        assert_eq!(
            fault,
            Fault::IllegalOperation(IllegalOperation::NoIndexRegister)
        );
    }

    #[test]
    fn ignored_bits_test() {
        // HLT ignores everything but the opcode
        assert_eq!(decode(0o001777), Ok(Instruction::Hlt));
        // JMA ignores the register field
        assert_eq!(
            decode(0o026420),
            Ok(Instruction::Jma(Operand::direct(0o20)))
        );
    }

    #[test]
    fn encode_error_test() {
        use Instruction as I;

        assert_eq!(
            I::Ldr(Reg::R0, Operand::direct(256)).encode(),
            Err(EncodeError::AddressOutOfRange {
                address: 256,
                bits: 8
            })
        );
        assert_eq!(
            I::Ldr(Reg::R0, Operand::direct(50).indirect()).encode(),
            Err(EncodeError::UnsupportedAddressing(Opcode::Ldr))
        );
        assert_eq!(
            I::Ldx(IndexReg::X1, Operand::indexed(3, IndexReg::X2)).encode(),
            Err(EncodeError::UnsupportedAddressing(Opcode::Ldx))
        );
        assert_eq!(
            I::Ldx(IndexReg::X1, Operand::direct(32)).encode(),
            Err(EncodeError::AddressOutOfRange {
                address: 32,
                bits: 5
            })
        );
        assert_eq!(
            I::Air(Reg::R0, 32).encode(),
            Err(EncodeError::FieldOutOfRange { value: 32, bits: 5 })
        );
        assert_eq!(
            I::Trap(16).encode(),
            Err(EncodeError::FieldOutOfRange { value: 16, bits: 4 })
        );
    }
}
