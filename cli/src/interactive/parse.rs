//! Arguments of the interactive commands.
//!
//! Numbers are octal unless prefixed with `0x` (hexadecimal) or `0d` (decimal). A register name
//! stands for its current value, optionally followed by an offset, like `PC+4` or `X1-0d10`.

use std::str::FromStr;

use nom::branch::alt;
use nom::bytes::complete::tag_no_case;
use nom::character::complete::{alphanumeric1, char, digit1, hex_digit1, oct_digit1, space0};
use nom::combinator::{all_consuming, map, map_res, opt};
use nom::error::{convert_error, VerboseError};
use nom::sequence::{preceded, tuple};
use nom::{Finish, IResult};
use thiserror::Error;

use c6461_emulator::constants::Word;
use c6461_emulator::runtime::Register;
use c6461_emulator::Computer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argument {
    Literal(Word),
    Register(Register),
    Offset(Register, i32),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("value {0} does not fit in a word")]
pub struct OutOfRange(i32);

impl Argument {
    pub fn evaluate<C>(self, computer: &Computer<C>) -> Result<Word, OutOfRange> {
        match self {
            Self::Literal(value) => Ok(value),
            Self::Register(reg) => Ok(computer.registers.get(reg)),
            Self::Offset(reg, offset) => {
                let value = i32::from(computer.registers.get(reg)) + offset;
                Word::try_from(value).map_err(|_| OutOfRange(value))
            }
        }
    }
}

/// Where the `set` command writes its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentTarget {
    Address(Word),
    Register(Register),
}

#[derive(Debug, Error)]
#[error("could not parse argument: {0}")]
pub struct ParseArgumentError(String);

impl FromStr for Argument {
    type Err = ParseArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_complete(parse_argument, s)
    }
}

impl FromStr for AssignmentTarget {
    type Err = ParseArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_complete(parse_target, s)
    }
}

fn parse_complete<'a, T>(
    parser: impl FnMut(&'a str) -> IResult<&'a str, T, VerboseError<&'a str>>,
    input: &'a str,
) -> Result<T, ParseArgumentError> {
    all_consuming(parser)(input)
        .finish()
        .map(|(_, value)| value)
        .map_err(|e| ParseArgumentError(convert_error(input, e)))
}

fn parse_number(input: &str) -> IResult<&str, Word, VerboseError<&str>> {
    alt((
        map_res(preceded(tag_no_case("0x"), hex_digit1), |digits: &str| {
            Word::from_str_radix(digits, 16)
        }),
        map_res(preceded(tag_no_case("0d"), digit1), |digits: &str| {
            digits.parse::<Word>()
        }),
        map_res(preceded(opt(tag_no_case("0o")), oct_digit1), |digits: &str| {
            Word::from_str_radix(digits, 8)
        }),
    ))(input)
}

fn parse_register(input: &str) -> IResult<&str, Register, VerboseError<&str>> {
    map_res(alphanumeric1, |name: &str| name.parse::<Register>())(input)
}

fn parse_offset(input: &str) -> IResult<&str, Argument, VerboseError<&str>> {
    let (rest, (reg, _, sign, _, value)) = tuple((
        parse_register,
        space0,
        alt((char('+'), char('-'))),
        space0,
        parse_number,
    ))(input)?;

    let value = i32::from(value);
    let offset = if sign == '-' { -value } else { value };
    Ok((rest, Argument::Offset(reg, offset)))
}

fn parse_argument(input: &str) -> IResult<&str, Argument, VerboseError<&str>> {
    alt((
        map(parse_number, Argument::Literal),
        parse_offset,
        map(parse_register, Argument::Register),
    ))(input)
}

fn parse_target(input: &str) -> IResult<&str, AssignmentTarget, VerboseError<&str>> {
    alt((
        map(parse_number, AssignmentTarget::Address),
        map(parse_register, AssignmentTarget::Register),
    ))(input)
}

#[cfg(test)]
mod tests {
    use c6461_emulator::runtime::{IndexReg, Reg};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_number_test() {
        assert_eq!("10".parse::<Argument>().unwrap(), Argument::Literal(8));
        assert_eq!("0o17".parse::<Argument>().unwrap(), Argument::Literal(15));
        assert_eq!("0x1F".parse::<Argument>().unwrap(), Argument::Literal(31));
        assert_eq!("0d100".parse::<Argument>().unwrap(), Argument::Literal(100));
        assert!("8".parse::<Argument>().is_err());
        assert!("0x10000".parse::<Argument>().is_err());
    }

    #[test]
    fn parse_register_test() {
        assert_eq!(
            "pc".parse::<Argument>().unwrap(),
            Argument::Register(Register::PC)
        );
        assert_eq!(
            "R2".parse::<Argument>().unwrap(),
            Argument::Register(Register::Gpr(Reg::R2))
        );
        assert!("R4".parse::<Argument>().is_err());
    }

    #[test]
    fn parse_offset_test() {
        assert_eq!(
            "PC+4".parse::<Argument>().unwrap(),
            Argument::Offset(Register::PC, 4)
        );
        assert_eq!(
            "X1 - 0d10".parse::<Argument>().unwrap(),
            Argument::Offset(Register::Index(IndexReg::X1), -10)
        );
    }

    #[test]
    fn parse_target_test() {
        assert_eq!(
            "MFR".parse::<AssignmentTarget>().unwrap(),
            AssignmentTarget::Register(Register::MFR)
        );
        assert_eq!(
            "0o20".parse::<AssignmentTarget>().unwrap(),
            AssignmentTarget::Address(16)
        );
        assert!("PC+1".parse::<AssignmentTarget>().is_err());
    }

    #[test]
    fn evaluate_test() {
        let mut computer = Computer::default();
        computer.registers.pc = 0o20;
        computer.registers.set(Register::Index(IndexReg::X2), 3);

        let arg = Argument::Offset(Register::PC, -2);
        assert_eq!(arg.evaluate(&computer), Ok(0o16));

        let arg = Argument::Register(Register::Index(IndexReg::X2));
        assert_eq!(arg.evaluate(&computer), Ok(3));

        let arg = Argument::Offset(Register::Index(IndexReg::X2), -4);
        assert_eq!(arg.evaluate(&computer), Err(OutOfRange(-1)));
    }
}
