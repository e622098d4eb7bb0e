//! Parsing of the locations given to interactive commands

use std::str::FromStr;

use lc3b_emulator::assembler::SymbolTable;
use lc3b_emulator::constants as C;
use lc3b_emulator::isa::Reg;
use lc3b_emulator::Computer;
use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while1};
use nom::character::complete::{char, digit1, hex_digit1, space0};
use nom::combinator::{all_consuming, map, map_res, opt, recognize, verify};
use nom::sequence::{pair, preceded, tuple};
use nom::{Finish, IResult};
use thiserror::Error;

/// A memory location, as typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A number literal
    Literal(i32),

    /// A label of the program
    Label(String),

    /// The address held by a register
    Register(Reg),

    /// A register with a byte offset
    Indexed(Reg, i32),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("unknown label {0:?}")]
    UnknownLabel(String),

    #[error("address {0:#x} is out of range")]
    OutOfRange(i32),
}

impl Location {
    pub fn evaluate(
        &self,
        computer: &Computer,
        labels: &SymbolTable,
    ) -> Result<C::Address, EvaluationError> {
        let address = match self {
            Self::Literal(value) => *value,
            Self::Label(label) => labels
                .get(label)
                .copied()
                .map(i32::from)
                .ok_or_else(|| EvaluationError::UnknownLabel(label.clone()))?,
            Self::Register(reg) => i32::from(computer.registers().get_word(*reg)),
            Self::Indexed(reg, offset) => i32::from(computer.registers().get_word(*reg)) + offset,
        };

        C::Address::try_from(address).map_err(|_| EvaluationError::OutOfRange(address))
    }
}

#[derive(Debug, Error)]
#[error("could not parse location {0:?}")]
pub struct ParseLocationError(String);

impl FromStr for Location {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_location(s)
            .finish()
            .map(|(_, location)| location)
            .map_err(|_| ParseLocationError(s.to_owned()))
    }
}

fn parse_hexadecimal(input: &str) -> IResult<&str, i32> {
    preceded(
        alt((tag_no_case("0x"), tag_no_case("x"))),
        map_res(hex_digit1, |digits| i32::from_str_radix(digits, 16)),
    )(input)
}

fn parse_decimal(input: &str) -> IResult<&str, i32> {
    preceded(
        opt(char('#')),
        map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i32>),
    )(input)
}

fn parse_number(input: &str) -> IResult<&str, i32> {
    alt((parse_hexadecimal, parse_decimal))(input)
}

fn parse_identifier(input: &str) -> IResult<&str, &str> {
    verify(
        take_while1(|c: char| c == '_' || c.is_ascii_alphanumeric()),
        |s: &str| !s.starts_with(|c: char| c.is_ascii_digit()),
    )(input)
}

fn parse_register(input: &str) -> IResult<&str, Reg> {
    map_res(parse_identifier, Reg::from_str)(input)
}

fn parse_indexed(input: &str) -> IResult<&str, Location> {
    let (rest, (reg, _, sign, _, offset)) = tuple((
        parse_register,
        space0,
        alt((char('+'), char('-'))),
        space0,
        parse_number,
    ))(input)?;

    let offset = if sign == '-' { -offset } else { offset };
    Ok((rest, Location::Indexed(reg, offset)))
}

fn parse_location(input: &str) -> IResult<&str, Location> {
    let input = input.trim();
    alt((
        all_consuming(parse_indexed),
        all_consuming(map(parse_register, Location::Register)),
        all_consuming(map(parse_number, Location::Literal)),
        all_consuming(map(parse_identifier, |label| Location::Label(label.to_owned()))),
    ))(input)
}
