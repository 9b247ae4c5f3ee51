use parse_display::Display;
use tracing::debug;

use super::address::Operand;
use super::fault::{Fault, IllegalOperation};
use super::registers::{ConditionCode, IndexReg, Reg};
use super::{signed, unsigned, Computer, Console};
use crate::constants::Word;

/// What the scheduler should do once an instruction ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Go on with the next instruction
    Continue,

    /// Stop, with PC pointing at the `HLT` word
    Halt,

    /// Wait for keyboard input, then run the same instruction again
    Suspend,

    /// A trap service made progress but is not done. The same instruction runs on the next step.
    Yield,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Direction {
    #[display("1")]
    Left,
    #[display("0")]
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ShiftMode {
    #[display("1")]
    Logical,
    #[display("0")]
    Arithmetic,
}

/// Operands of `SRC` and `RRC`, printed in the assembler order: `count, L/R, A/L`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display("{count}, {direction}, {mode}")]
pub struct Shift {
    pub count: u8,
    pub direction: Direction,
    pub mode: ShiftMode,
}

impl Shift {
    /// Shift a word. Arithmetic right shifts copy the sign bit, every other shift fills with
    /// zeroes.
    #[must_use]
    pub fn shift(self, value: Word) -> Word {
        let count = u32::from(self.count);
        match (self.direction, self.mode) {
            (Direction::Left, _) => value.checked_shl(count).unwrap_or(0),
            (Direction::Right, ShiftMode::Logical) => value.checked_shr(count).unwrap_or(0),
            (Direction::Right, ShiftMode::Arithmetic) => unsigned(signed(value) >> count.min(15)),
        }
    }

    /// Rotate a word. The mode is ignored.
    #[must_use]
    pub fn rotate(self, value: Word) -> Word {
        let count = u32::from(self.count) % Word::BITS;
        match self.direction {
            Direction::Left => value.rotate_left(count),
            Direction::Right => value.rotate_right(count),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Instruction {
    /// Stop the machine
    #[display("HLT")]
    Hlt,

    /// Load a register from memory
    #[display("LDR {0}, {1}")]
    Ldr(Reg, Operand),

    /// Store a register in memory
    #[display("STR {0}, {1}")]
    Str(Reg, Operand),

    /// Load a register with an effective address
    #[display("LDA {0}, {1}")]
    Lda(Reg, Operand),

    /// Add a memory word to a register
    #[display("AMR {0}, {1}")]
    Amr(Reg, Operand),

    /// Subtract a memory word from a register
    #[display("SMR {0}, {1}")]
    Smr(Reg, Operand),

    /// Add an immediate to a register
    #[display("AIR {0}, {1}")]
    Air(Reg, u8),

    /// Subtract an immediate from a register
    #[display("SIR {0}, {1}")]
    Sir(Reg, u8),

    /// Jump if zero
    #[display("JZ {0}, {1}")]
    Jz(Reg, Operand),

    /// Jump if not zero
    #[display("JNE {0}, {1}")]
    Jne(Reg, Operand),

    /// Jump if a condition code bit is set
    #[display("JCC {0}, {1}")]
    Jcc(u8, Operand),

    /// Unconditional jump
    #[display("JMA {0}")]
    Jma(Operand),

    /// Jump to a subroutine, saving the return address in R3
    #[display("JSR {0}")]
    Jsr(Operand),

    /// Return from a subroutine with a value in R0
    #[display("RFS {0}")]
    Rfs(u8),

    /// Decrement, then jump if still positive
    #[display("SOB {0}, {1}")]
    Sob(Reg, Operand),

    /// Jump if greater or equal to zero
    #[display("JGE {0}, {1}")]
    Jge(Reg, Operand),

    /// Call a trap service
    #[display("TRAP {0}")]
    Trap(u8),

    #[display("SRC {0}, {1}")]
    Src(Reg, Shift),

    #[display("RRC {0}, {1}")]
    Rrc(Reg, Shift),

    /// Load an index register from memory
    #[display("LDX {0}, {1}")]
    Ldx(IndexReg, Operand),

    /// Store an index register in memory
    #[display("STX {0}, {1}")]
    Stx(IndexReg, Operand),

    /// Read a character from a device
    #[display("IN {0}, {1}")]
    In(Reg, u8),

    /// Write a character to a device
    #[display("OUT {0}, {1}")]
    Out(Reg, u8),

    /// Check the status of a device
    #[display("CHK {0}, {1}")]
    Chk(Reg, u8),

    /// Signed multiplication. The 32-bit product lands in a register pair.
    #[display("MLT {0}, {1}")]
    Mlt(Reg, Reg),

    /// Signed division. Quotient and remainder land in a register pair.
    #[display("DVD {0}, {1}")]
    Dvd(Reg, Reg),

    /// Test two registers for equality
    #[display("TRR {0}, {1}")]
    Trr(Reg, Reg),

    #[display("AND {0}, {1}")]
    And(Reg, Reg),

    #[display("ORR {0}, {1}")]
    Orr(Reg, Reg),

    #[display("NOT {0}")]
    Not(Reg),
}

/// Both operands of `MLT` and `DVD` must be the first register of a pair
fn check_pair(rx: Reg, ry: Reg) -> Result<Reg, IllegalOperation> {
    let low = rx.pair().ok_or(IllegalOperation::InvalidRegisterPair(rx))?;
    ry.pair().ok_or(IllegalOperation::InvalidRegisterPair(ry))?;
    Ok(low)
}

impl<C: Console> Computer<C> {
    fn add_to(&mut self, reg: Reg, value: Word) {
        let a = signed(self.registers.gpr(reg));
        let (res, overflow) = a.overflowing_add(signed(value));
        debug!("{} + {} = {}", a, signed(value), res);
        self.registers.set_gpr(reg, unsigned(res));
        self.registers.cc.set(ConditionCode::OVERFLOW, overflow);
    }

    fn sub_from(&mut self, reg: Reg, value: Word) {
        let a = signed(self.registers.gpr(reg));
        let (res, overflow) = a.overflowing_sub(signed(value));
        debug!("{} - {} = {}", a, signed(value), res);
        self.registers.set_gpr(reg, unsigned(res));
        self.registers.cc.set(ConditionCode::OVERFLOW, overflow);
    }

    fn jump_if(&mut self, condition: bool, operand: &Operand) -> Result<(), Fault> {
        let address = self.effective_address(operand)?;
        if condition {
            debug!("Jumping to address {:04o}", address);
            self.registers.pc = address;
        }
        Ok(())
    }
}

impl Instruction {
    #[allow(clippy::too_many_lines)]
    pub(crate) fn execute<C: Console>(&self, computer: &mut Computer<C>) -> Result<Flow, Fault> {
        use Instruction as I;

        match self {
            I::Hlt => return Ok(Flow::Halt),

            I::Ldr(reg, operand) => {
                let address = computer.effective_address(operand)?;
                let value = computer.load(address)?;
                computer.registers.set_gpr(*reg, value);
            }

            I::Str(reg, operand) => {
                let address = computer.effective_address(operand)?;
                computer.store(address, computer.registers.gpr(*reg))?;
            }

            I::Lda(reg, operand) => {
                let address = computer.effective_address(operand)?;
                computer.registers.set_gpr(*reg, address);
            }

            I::Amr(reg, operand) => {
                let address = computer.effective_address(operand)?;
                let value = computer.load(address)?;
                computer.add_to(*reg, value);
            }

            I::Smr(reg, operand) => {
                let address = computer.effective_address(operand)?;
                let value = computer.load(address)?;
                computer.sub_from(*reg, value);
            }

            I::Air(reg, immed) => computer.add_to(*reg, Word::from(*immed)),

            I::Sir(reg, immed) => computer.sub_from(*reg, Word::from(*immed)),

            I::Jz(reg, operand) => {
                let condition = computer.registers.gpr(*reg) == 0;
                computer.jump_if(condition, operand)?;
            }

            I::Jne(reg, operand) => {
                let condition = computer.registers.gpr(*reg) != 0;
                computer.jump_if(condition, operand)?;
            }

            I::Jcc(bit, operand) => {
                let condition = computer.registers.cc.contains(ConditionCode::bit(*bit));
                computer.jump_if(condition, operand)?;
            }

            I::Jma(operand) => computer.jump_if(true, operand)?,

            I::Jsr(operand) => {
                let address = computer.effective_address(operand)?;
                // PC already points past the JSR
                let ret = computer.registers.pc;
                computer.registers.set_gpr(Reg::R3, ret);
                computer.registers.pc = address;
            }

            I::Rfs(immed) => {
                computer.registers.set_gpr(Reg::R0, Word::from(*immed));
                computer.registers.pc = computer.registers.gpr(Reg::R3);
            }

            I::Sob(reg, operand) => {
                let value = computer.registers.gpr(*reg).wrapping_sub(1);
                computer.registers.set_gpr(*reg, value);
                computer.jump_if(signed(value) > 0, operand)?;
            }

            I::Jge(reg, operand) => {
                let condition = signed(computer.registers.gpr(*reg)) >= 0;
                computer.jump_if(condition, operand)?;
            }

            I::Trap(service) => return computer.trap(*service),

            I::Src(reg, shift) => {
                let value = shift.shift(computer.registers.gpr(*reg));
                computer.registers.set_gpr(*reg, value);
            }

            I::Rrc(reg, shift) => {
                let value = shift.rotate(computer.registers.gpr(*reg));
                computer.registers.set_gpr(*reg, value);
            }

            I::Ldx(index, operand) => {
                let address = computer.effective_address(operand)?;
                let value = computer.load(address)?;
                computer.registers.set_ixr(*index, value);
            }

            I::Stx(index, operand) => {
                let address = computer.effective_address(operand)?;
                computer.store(address, computer.registers.ixr(*index))?;
            }

            I::In(reg, device) => return computer.device_input(*reg, *device),

            I::Out(reg, device) => computer.device_output(*reg, *device)?,

            I::Chk(reg, device) => computer.device_status(*reg, *device)?,

            I::Mlt(rx, ry) => {
                let low = check_pair(*rx, *ry)?;
                let a = i32::from(signed(computer.registers.gpr(*rx)));
                let b = i32::from(signed(computer.registers.gpr(*ry)));
                let product = a * b;
                debug!("{} * {} = {}", a, b, product);

                let [h1, h0, l1, l0] = product.to_be_bytes();
                computer
                    .registers
                    .set_gpr(*rx, Word::from_be_bytes([h1, h0]));
                computer.registers.set_gpr(low, Word::from_be_bytes([l1, l0]));
                computer
                    .registers
                    .cc
                    .set(ConditionCode::OVERFLOW, i16::try_from(product).is_err());
            }

            I::Dvd(rx, ry) => {
                let remainder_reg = check_pair(*rx, *ry)?;
                let a = signed(computer.registers.gpr(*rx));
                let b = signed(computer.registers.gpr(*ry));
                if b == 0 {
                    return Err(IllegalOperation::DivideByZero.into());
                }
                let (quotient, overflow) = a.overflowing_div(b);
                let remainder = a.wrapping_rem(b);
                debug!("{} / {} = {} (remainder {})", a, b, quotient, remainder);

                computer.registers.set_gpr(*rx, unsigned(quotient));
                computer.registers.set_gpr(remainder_reg, unsigned(remainder));
                computer.registers.cc.set(ConditionCode::OVERFLOW, overflow);
            }

            I::Trr(rx, ry) => {
                let equal = computer.registers.gpr(*rx) == computer.registers.gpr(*ry);
                computer.registers.cc.set(ConditionCode::EQUAL, equal);
            }

            I::And(rx, ry) => {
                let value = computer.registers.gpr(*rx) & computer.registers.gpr(*ry);
                computer.registers.set_gpr(*rx, value);
            }

            I::Orr(rx, ry) => {
                let value = computer.registers.gpr(*rx) | computer.registers.gpr(*ry);
                computer.registers.set_gpr(*rx, value);
            }

            I::Not(rx) => {
                let value = !computer.registers.gpr(*rx);
                computer.registers.set_gpr(*rx, value);
            }
        };

        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn run(computer: &mut Computer, instruction: Instruction) -> Result<Flow, Fault> {
        instruction.execute(computer)
    }

    #[test]
    fn load_store_test() {
        let mut computer = Computer::default();
        computer.registers.set_gpr(Reg::R1, 0o173);
        run(&mut computer, Instruction::Str(Reg::R1, 0o300.into())).unwrap();
        assert_eq!(computer.peek(0o300), Ok(0o173));

        computer.registers.set_gpr(Reg::R1, 0);
        run(&mut computer, Instruction::Ldr(Reg::R1, 0o300.into())).unwrap();
        assert_eq!(computer.registers.gpr(Reg::R1), 0o173);
    }

    #[test]
    fn indirect_load_test() {
        let mut computer = Computer::default();
        computer.memory.set(50, 60).unwrap();
        computer.memory.set(60, 42).unwrap();

        run(
            &mut computer,
            Instruction::Ldr(Reg::R0, Operand::direct(50).indirect()),
        )
        .unwrap();
        assert_eq!(computer.registers.gpr(Reg::R0), 42);
        assert_eq!(computer.registers.mar, 60);
        assert_eq!(computer.registers.mbr, 42);
    }

    #[test]
    fn lda_test() {
        let mut computer = Computer::default();
        computer.registers.set_ixr(IndexReg::X1, 100);
        run(
            &mut computer,
            Instruction::Lda(Reg::R2, Operand::indexed(20, IndexReg::X1)),
        )
        .unwrap();
        assert_eq!(computer.registers.gpr(Reg::R2), 120);
    }

    #[test]
    fn arithmetic_test() {
        let mut computer = Computer::default();
        computer.memory.set(20, 5).unwrap();
        computer.registers.set_gpr(Reg::R0, 10);

        run(&mut computer, Instruction::Amr(Reg::R0, 20.into())).unwrap();
        assert_eq!(computer.registers.gpr(Reg::R0), 15);
        run(&mut computer, Instruction::Smr(Reg::R0, 20.into())).unwrap();
        assert_eq!(computer.registers.gpr(Reg::R0), 10);
        run(&mut computer, Instruction::Sir(Reg::R0, 12)).unwrap();
        assert_eq!(computer.registers.gpr(Reg::R0), unsigned(-2));
        assert!(!computer.registers.cc.contains(ConditionCode::OVERFLOW));
        run(&mut computer, Instruction::Air(Reg::R0, 31)).unwrap();
        assert_eq!(computer.registers.gpr(Reg::R0), 29);
    }

    #[test]
    fn overflow_test() {
        let mut computer = Computer::default();
        computer.registers.set_gpr(Reg::R1, unsigned(i16::MAX));
        run(&mut computer, Instruction::Air(Reg::R1, 1)).unwrap();
        assert_eq!(signed(computer.registers.gpr(Reg::R1)), i16::MIN);
        assert!(computer.registers.cc.contains(ConditionCode::OVERFLOW));

        // Wrapping back down overflows too
        run(&mut computer, Instruction::Sir(Reg::R1, 1)).unwrap();
        assert_eq!(signed(computer.registers.gpr(Reg::R1)), i16::MAX);
        assert!(computer.registers.cc.contains(ConditionCode::OVERFLOW));

        run(&mut computer, Instruction::Sir(Reg::R1, 1)).unwrap();
        assert!(!computer.registers.cc.contains(ConditionCode::OVERFLOW));
    }

    #[test]
    fn jumps_test() {
        let mut computer = Computer::default();
        computer.registers.pc = 10;

        run(&mut computer, Instruction::Jz(Reg::R0, 40.into())).unwrap();
        assert_eq!(computer.registers.pc, 40);
        run(&mut computer, Instruction::Jne(Reg::R0, 50.into())).unwrap();
        assert_eq!(computer.registers.pc, 40);

        computer.registers.set_gpr(Reg::R1, unsigned(-1));
        run(&mut computer, Instruction::Jge(Reg::R1, 60.into())).unwrap();
        assert_eq!(computer.registers.pc, 40);
        computer.registers.set_gpr(Reg::R1, 0);
        run(&mut computer, Instruction::Jge(Reg::R1, 60.into())).unwrap();
        assert_eq!(computer.registers.pc, 60);

        run(&mut computer, Instruction::Jcc(3, 70.into())).unwrap();
        assert_eq!(computer.registers.pc, 60);
        computer.registers.cc.insert(ConditionCode::EQUAL);
        run(&mut computer, Instruction::Jcc(3, 70.into())).unwrap();
        assert_eq!(computer.registers.pc, 70);

        run(&mut computer, Instruction::Jma(80.into())).unwrap();
        assert_eq!(computer.registers.pc, 80);
    }

    #[test]
    fn subroutine_test() {
        let mut computer = Computer::default();
        // As if the JSR at 30 was just fetched
        computer.registers.pc = 31;
        run(&mut computer, Instruction::Jsr(100.into())).unwrap();
        assert_eq!(computer.registers.pc, 100);
        assert_eq!(computer.registers.gpr(Reg::R3), 31);

        run(&mut computer, Instruction::Rfs(7)).unwrap();
        assert_eq!(computer.registers.pc, 31);
        assert_eq!(computer.registers.gpr(Reg::R0), 7);
    }

    #[test]
    fn sob_test() {
        let mut computer = Computer::default();
        computer.registers.set_gpr(Reg::R2, 2);
        computer.registers.pc = 10;

        run(&mut computer, Instruction::Sob(Reg::R2, 30.into())).unwrap();
        assert_eq!(computer.registers.gpr(Reg::R2), 1);
        assert_eq!(computer.registers.pc, 30);

        computer.registers.pc = 10;
        run(&mut computer, Instruction::Sob(Reg::R2, 30.into())).unwrap();
        assert_eq!(computer.registers.gpr(Reg::R2), 0);
        assert_eq!(computer.registers.pc, 10);
    }

    #[test]
    fn index_register_test() {
        let mut computer = Computer::default();
        computer.memory.set(12, 0o1234).unwrap();
        run(&mut computer, Instruction::Ldx(IndexReg::X2, 12.into())).unwrap();
        assert_eq!(computer.registers.ixr(IndexReg::X2), 0o1234);

        run(&mut computer, Instruction::Stx(IndexReg::X2, 13.into())).unwrap();
        assert_eq!(computer.peek(13), Ok(0o1234));
    }

    #[test]
    fn shift_test() {
        use Direction::{Left, Right};
        use ShiftMode::{Arithmetic, Logical};

        let shift = |count, direction, mode| Shift {
            count,
            direction,
            mode,
        };

        assert_eq!(shift(3, Left, Logical).shift(0b1), 0b1000);
        assert_eq!(shift(3, Left, Arithmetic).shift(0b1), 0b1000);
        assert_eq!(shift(4, Right, Logical).shift(0x8000), 0x0800);
        assert_eq!(shift(4, Right, Arithmetic).shift(0x8000), 0xF800);
        assert_eq!(shift(0, Right, Arithmetic).shift(0x1234), 0x1234);
        assert_eq!(shift(16, Left, Logical).shift(0xFFFF), 0);
        assert_eq!(shift(16, Right, Logical).shift(0xFFFF), 0);
        assert_eq!(shift(16, Right, Arithmetic).shift(0x8000), 0xFFFF);

        assert_eq!(shift(4, Left, Logical).rotate(0x8001), 0x0018);
        assert_eq!(shift(4, Right, Arithmetic).rotate(0x8001), 0x1800);
        assert_eq!(shift(0, Left, Logical).rotate(0x8001), 0x8001);
    }

    #[test]
    fn multiply_test() {
        let mut computer = Computer::default();
        computer.registers.set_gpr(Reg::R0, 300);
        computer.registers.set_gpr(Reg::R2, 400);
        run(&mut computer, Instruction::Mlt(Reg::R0, Reg::R2)).unwrap();
        // 120000 = 0x0001_D4C0
        assert_eq!(computer.registers.gpr(Reg::R0), 0x0001);
        assert_eq!(computer.registers.gpr(Reg::R1), 0xD4C0);
        assert!(computer.registers.cc.contains(ConditionCode::OVERFLOW));

        computer.registers.set_gpr(Reg::R0, unsigned(-3));
        computer.registers.set_gpr(Reg::R2, 5);
        run(&mut computer, Instruction::Mlt(Reg::R0, Reg::R2)).unwrap();
        assert_eq!(computer.registers.gpr(Reg::R0), 0xFFFF);
        assert_eq!(signed(computer.registers.gpr(Reg::R1)), -15);
        assert!(!computer.registers.cc.contains(ConditionCode::OVERFLOW));

        assert_eq!(
            run(&mut computer, Instruction::Mlt(Reg::R1, Reg::R2)),
            Err(Fault::IllegalOperation(
                IllegalOperation::InvalidRegisterPair(Reg::R1)
            ))
        );
    }

    #[test]
    fn divide_test() {
        let mut computer = Computer::default();
        computer.registers.set_gpr(Reg::R2, unsigned(-17));
        computer.registers.set_gpr(Reg::R0, 5);
        run(&mut computer, Instruction::Dvd(Reg::R2, Reg::R0)).unwrap();
        assert_eq!(signed(computer.registers.gpr(Reg::R2)), -3);
        assert_eq!(signed(computer.registers.gpr(Reg::R3)), -2);

        computer.registers.set_gpr(Reg::R2, unsigned(i16::MIN));
        computer.registers.set_gpr(Reg::R0, unsigned(-1));
        run(&mut computer, Instruction::Dvd(Reg::R2, Reg::R0)).unwrap();
        assert_eq!(signed(computer.registers.gpr(Reg::R2)), i16::MIN);
        assert_eq!(computer.registers.gpr(Reg::R3), 0);
        assert!(computer.registers.cc.contains(ConditionCode::OVERFLOW));
    }

    #[test]
    fn divide_by_zero_test() {
        let mut computer = Computer::default();
        computer.registers.set_gpr(Reg::R0, 10);
        let before = computer.registers.clone();
        assert_eq!(
            run(&mut computer, Instruction::Dvd(Reg::R0, Reg::R2)),
            Err(Fault::IllegalOperation(IllegalOperation::DivideByZero))
        );
        assert_eq!(computer.registers, before);
    }

    #[test]
    fn logic_test() {
        let mut computer = Computer::default();
        computer.registers.set_gpr(Reg::R0, 0b1100);
        computer.registers.set_gpr(Reg::R1, 0b1010);

        run(&mut computer, Instruction::Trr(Reg::R0, Reg::R1)).unwrap();
        assert!(!computer.registers.cc.contains(ConditionCode::EQUAL));
        run(&mut computer, Instruction::Trr(Reg::R0, Reg::R0)).unwrap();
        assert!(computer.registers.cc.contains(ConditionCode::EQUAL));

        run(&mut computer, Instruction::And(Reg::R0, Reg::R1)).unwrap();
        assert_eq!(computer.registers.gpr(Reg::R0), 0b1000);
        run(&mut computer, Instruction::Orr(Reg::R0, Reg::R1)).unwrap();
        assert_eq!(computer.registers.gpr(Reg::R0), 0b1010);
        run(&mut computer, Instruction::Not(Reg::R0)).unwrap();
        assert_eq!(computer.registers.gpr(Reg::R0), !0b1010);
    }

    #[test]
    fn halt_test() {
        let mut computer = Computer::default();
        assert_eq!(run(&mut computer, Instruction::Hlt), Ok(Flow::Halt));
    }

    #[test]
    fn display_test() {
        assert_eq!(
            Instruction::Ldr(Reg::R1, Operand::direct(31)).to_string(),
            "LDR R1, 31"
        );
        assert_eq!(
            Instruction::Ldx(IndexReg::X1, Operand::direct(4).indirect()).to_string(),
            "LDX X1, @4"
        );
        assert_eq!(
            Instruction::Src(
                Reg::R0,
                Shift {
                    count: 3,
                    direction: Direction::Left,
                    mode: ShiftMode::Logical
                }
            )
            .to_string(),
            "SRC R0, 3, 1, 1"
        );
        assert_eq!(Instruction::Trap(0).to_string(), "TRAP 0");
        assert_eq!(Instruction::Hlt.to_string(), "HLT");
    }
}
