//! Assembly source parsing
//!
//! Sources are parsed one line at a time, with the `nom` library. This module
//! only deals with syntax: whether a mnemonic exists or an operand fits its
//! field is checked by the assembler.

use nom::bytes::complete::take_while1;
use nom::combinator::verify;
use nom::IResult;

pub(crate) mod line;
pub(crate) mod literal;
pub(crate) mod mnemonic;

pub use self::line::{Line, LineContent, Operand};
pub use self::mnemonic::{Directive, Mnemonic};

pub(crate) fn is_identifier_char(c: char) -> bool {
    is_start_identifier_char(c) || c.is_ascii_digit()
}

fn is_start_identifier_char(c: char) -> bool {
    c == '_' || c.is_ascii_lowercase() || c.is_ascii_uppercase()
}

/// Parse an identifier: a letter or underscore, then letters, digits or
/// underscores
pub(crate) fn parse_identifier(input: &str) -> IResult<&str, &str> {
    verify(take_while1(is_identifier_char), |f: &str| {
        f.chars()
            .next()
            .filter(|&c| is_start_identifier_char(c))
            .is_some()
    })(input)
}

/// Find the token where parsing stopped, for error reporting
fn offending_token(rest: &str) -> &str {
    let rest = rest.trim();
    let token = rest.trim_start_matches(',').trim_start();
    let end = token
        .find(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .unwrap_or(token.len());

    if end == 0 {
        rest
    } else {
        &token[..end]
    }
}

/// Parse a single line of assembly
///
/// # Errors
///
/// Returns the first token that could not be parsed if the line is not fully
/// consumed
pub fn parse_line(input: &str) -> Result<Line<'_>, &str> {
    let (rest, line) = self::line::parse_line(input).map_err(|_| input.trim())?;
    if rest.trim().is_empty() {
        Ok(line)
    } else {
        Err(offending_token(rest))
    }
}
