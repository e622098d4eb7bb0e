//! Parse number and string literals.
//!
//! Numbers are either decimal, optionally prefixed by `#` and optionally
//! negative (`#-5`, `12`), or hexadecimal, prefixed by `x` or `0x` (`x3000`).
//! Strings are double-quoted and support the `\n`, `\t`, `\r`, `\0`, `\\` and
//! `\"` escapes.

use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag_no_case, take_while1},
    character::complete::{char, digit1, none_of, satisfy},
    combinator::{map_res, not, opt, recognize, value},
    sequence::{pair, preceded, terminated},
    IResult,
};

use super::is_identifier_char;

/// Parse a string literal
pub(crate) fn parse_string_literal(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let (input, string) = opt(escaped_transform(
        none_of("\"\\"),
        '\\',
        alt((
            value("\\", char('\\')),
            value("\"", char('"')),
            value("\n", char('n')),
            value("\t", char('t')),
            value("\r", char('r')),
            value("\0", char('0')),
        )),
    ))(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, string.unwrap_or_default()))
}

/// Parse a decimal number
fn from_decimal(input: &str) -> Result<i32, std::num::ParseIntError> {
    i32::from_str(input)
}

/// Parse a hexadecimal number
fn from_hexadecimal(input: &str) -> Result<i32, std::num::ParseIntError> {
    i32::from_str_radix(input, 16)
}

/// Check if character is a hexadecimal digit
fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

/// Extract a hexadecimal literal
fn take_hexadecimal_literal(input: &str) -> IResult<&str, &str> {
    let (input, _) = alt((tag_no_case("0x"), tag_no_case("x")))(input)?;
    take_while1(is_hex_digit)(input)
}

/// Extract a decimal literal, with its sign
fn take_decimal_literal(input: &str) -> IResult<&str, &str> {
    preceded(opt(char('#')), recognize(pair(opt(char('-')), digit1)))(input)
}

/// Parse a number literal
///
/// The literal must not be directly followed by an identifier character, so
/// that labels like `xray` are not mistaken for a number.
pub(crate) fn parse_number(input: &str) -> IResult<&str, i32> {
    terminated(
        alt((
            map_res(take_hexadecimal_literal, from_hexadecimal),
            map_res(take_decimal_literal, from_decimal),
        )),
        not(satisfy(is_identifier_char)),
    )(input)
}
