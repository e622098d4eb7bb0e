//! Program line parsing
//!
//! This module parses whole program lines, including the label definition,
//! the comment and the line content itself (either an instruction or a
//! directive).
//!
//! Parsing does zero copy over the original input, except for string literals
//! which need their escapes resolved. A label may be written with or without a
//! trailing colon. Without one, the first word of a line is a label unless it
//! is a mnemonic, or it is directly followed by an operand (`FOO R1, R2` is an
//! instruction with an unknown mnemonic, not a label).

use nom::{
    branch::alt,
    character::complete::{char, not_line_ending, space0, space1},
    combinator::{map, map_res, not, opt, peek, recognize, verify},
    multi::separated_list1,
    sequence::{delimited, preceded, terminated},
    IResult,
};

use super::{
    literal::{parse_number, parse_string_literal},
    mnemonic::Mnemonic,
    parse_identifier,
};
use crate::isa::Reg;

/// A single instruction or directive operand
#[derive(Clone, Debug, PartialEq)]
pub enum Operand<'a> {
    Register(Reg),
    Number(i32),
    Label(&'a str),
    String(String),
}

impl<'a> std::fmt::Display for Operand<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Register(reg) => write!(f, "{reg}"),
            Operand::Number(n) => write!(f, "#{n}"),
            Operand::Label(label) => write!(f, "{label}"),
            Operand::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// Holds the content of a line
#[derive(Clone, Debug, PartialEq)]
pub enum LineContent<'a> {
    /// An instruction, with its mnemonic and list of operands
    Instruction {
        mnemonic: &'a str,
        operands: Vec<Operand<'a>>,
    },

    /// A directive, with its name (without the leading dot) and operands
    Directive {
        directive: &'a str,
        operands: Vec<Operand<'a>>,
    },
}

/// Holds a whole line, with the label definition (if any), the content (if
/// any) and the comment (if any).
///
/// Note that the `Default::default()` implementation represents an empty line.
#[derive(Debug, PartialEq, Default)]
pub struct Line<'a> {
    pub label: Option<&'a str>,
    pub content: Option<LineContent<'a>>,
    pub comment: Option<&'a str>,
}

impl<'a> Line<'a> {
    #[cfg(test)]
    pub(crate) fn comment(mut self, comment: &'a str) -> Self {
        self.comment = Some(comment);
        self
    }

    #[cfg(test)]
    pub(crate) fn label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    #[cfg(test)]
    pub(crate) fn directive(mut self, directive: &'a str, operands: Vec<Operand<'a>>) -> Self {
        self.content = Some(LineContent::Directive {
            directive,
            operands,
        });
        self
    }

    #[cfg(test)]
    pub(crate) fn instruction(mut self, mnemonic: &'a str, operands: Vec<Operand<'a>>) -> Self {
        self.content = Some(LineContent::Instruction { mnemonic, operands });
        self
    }
}

/// Parses a register name
fn parse_register(input: &str) -> IResult<&str, Reg> {
    map_res(parse_identifier, str::parse::<Reg>)(input)
}

/// Parses a single operand
fn parse_operand(input: &str) -> IResult<&str, Operand> {
    alt((
        map(parse_string_literal, Operand::String),
        map(parse_number, Operand::Number),
        map(parse_register, Operand::Register),
        map(parse_identifier, Operand::Label),
    ))(input)
}

/// Parses a comma-separated list of operands
fn parse_operands(input: &str) -> IResult<&str, Vec<Operand>> {
    separated_list1(delimited(space0, char(','), space0), parse_operand)(input)
}

/// Parses a directive
fn parse_directive_line(input: &str) -> IResult<&str, LineContent> {
    let (input, _) = char('.')(input)?;
    let (input, directive) = parse_identifier(input)?;
    let (input, operands) = opt(preceded(space1, parse_operands))(input)?;
    let operands = operands.unwrap_or_default();
    Ok((
        input,
        LineContent::Directive {
            directive,
            operands,
        },
    ))
}

/// Parses an instruction
fn parse_instruction_line(input: &str) -> IResult<&str, LineContent> {
    let (input, mnemonic) = parse_identifier(input)?;
    let (input, operands) = opt(preceded(space1, parse_operands))(input)?;
    let operands = operands.unwrap_or_default();
    Ok((input, LineContent::Instruction { mnemonic, operands }))
}

/// Parses the content of a line: an instruction or a directive
fn parse_line_content(input: &str) -> IResult<&str, LineContent> {
    alt((parse_directive_line, parse_instruction_line))(input)
}

/// Parses an inline comment
fn parse_comment(input: &str) -> IResult<&str, &str> {
    let (input, _) = peek(char(';'))(input)?;
    not_line_ending(input)
}

/// Check if a word can name a label
fn is_label_name(word: &str) -> bool {
    !Mnemonic::is_mnemonic(word) && word.parse::<Reg>().is_err()
}

/// Parses an identifier that is neither a mnemonic nor a register
fn parse_label_name(input: &str) -> IResult<&str, &str> {
    verify(parse_identifier, is_label_name)(input)
}

/// Parses a label definition, with or without a trailing colon
fn parse_label(input: &str) -> IResult<&str, &str> {
    let with_colon = terminated(parse_label_name, preceded(space0, char(':')));
    let value_operand = alt((
        recognize(parse_string_literal),
        recognize(parse_number),
        recognize(parse_register),
    ));
    let without_colon = terminated(parse_label_name, not(preceded(space1, value_operand)));
    alt((with_colon, without_colon))(input)
}

/// Parses a whole line
pub(crate) fn parse_line(input: &str) -> IResult<&str, Line> {
    let (input, _) = space0(input)?;

    // Extract the label definition
    let (input, label) = opt(terminated(parse_label, space0))(input)?;

    // Extract the line content
    let (input, content) = opt(parse_line_content)(input)?;
    let (input, _) = space0(input)?;

    // Extract the comment
    let (input, comment) = opt(parse_comment)(input)?;

    Ok((
        input,
        Line {
            label,
            content,
            comment,
        },
    ))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[track_caller]
    fn fully_parsed<T>(result: IResult<&str, T>) -> T {
        let (input, result) = result.unwrap();
        assert_eq!(input, "");
        result
    }

    #[test]
    fn parse_empty_line_test() {
        let line = fully_parsed(parse_line(""));
        assert_eq!(line, Line::default());

        let line = fully_parsed(parse_line(" \t "));
        assert_eq!(line, Line::default());
    }

    #[test]
    fn parse_comment_line_test() {
        let line = fully_parsed(parse_line("; hello"));
        assert_eq!(line, Line::default().comment("; hello"));
    }

    #[test]
    fn parse_label_line_test() {
        let line = fully_parsed(parse_line("LOOP"));
        assert_eq!(line, Line::default().label("LOOP"));

        let line = fully_parsed(parse_line("done:   ; the end"));
        assert_eq!(line, Line::default().label("done").comment("; the end"));
    }

    #[test]
    fn parse_instruction_line_test() {
        let line = fully_parsed(parse_line("    ADD R1, R2, #-3 ; decrement"));
        assert_eq!(
            line,
            Line::default()
                .instruction(
                    "ADD",
                    vec![
                        Operand::Register(Reg::R1),
                        Operand::Register(Reg::R2),
                        Operand::Number(-3),
                    ]
                )
                .comment("; decrement")
        );

        let line = fully_parsed(parse_line("HALT"));
        assert_eq!(line, Line::default().instruction("HALT", vec![]));
    }

    #[test]
    fn parse_labelled_instruction_test() {
        let line = fully_parsed(parse_line("LOOP BRp LOOP"));
        assert_eq!(
            line,
            Line::default()
                .label("LOOP")
                .instruction("BRp", vec![Operand::Label("LOOP")])
        );

        let line = fully_parsed(parse_line("next: ldw r0,r6,x2"));
        assert_eq!(
            line,
            Line::default().label("next").instruction(
                "ldw",
                vec![
                    Operand::Register(Reg::R0),
                    Operand::Register(Reg::R6),
                    Operand::Number(2),
                ]
            )
        );
    }

    #[test]
    fn parse_unknown_mnemonic_test() {
        // Followed by a register, the first word is not a label
        let line = fully_parsed(parse_line("FOO R1, R2"));
        assert_eq!(
            line,
            Line::default().instruction(
                "FOO",
                vec![Operand::Register(Reg::R1), Operand::Register(Reg::R2)]
            )
        );

        // Otherwise it is, and the second word is the mnemonic
        let line = fully_parsed(parse_line("FOO BAR R1"));
        assert_eq!(
            line,
            Line::default()
                .label("FOO")
                .instruction("BAR", vec![Operand::Register(Reg::R1)])
        );
    }

    #[test]
    fn parse_directive_line_test() {
        let line = fully_parsed(parse_line(".ORIG x3000"));
        assert_eq!(
            line,
            Line::default().directive("ORIG", vec![Operand::Number(0x3000)])
        );

        let line = fully_parsed(parse_line(r#"MSG .STRINGZ "Hi; there\n" ; greeting"#));
        assert_eq!(
            line,
            Line::default()
                .label("MSG")
                .directive("STRINGZ", vec![Operand::String("Hi; there\n".into())])
                .comment("; greeting")
        );

        let line = fully_parsed(parse_line("PTR .FILL LOOP"));
        assert_eq!(
            line,
            Line::default()
                .label("PTR")
                .directive("FILL", vec![Operand::Label("LOOP")])
        );

        let line = fully_parsed(parse_line(".END"));
        assert_eq!(line, Line::default().directive("END", vec![]));
    }

    #[test]
    fn parse_leftover_test() {
        let (rest, _) = parse_line("ADD R1, R2, #5x").unwrap();
        assert_eq!(rest, ", #5x");

        let (rest, _) = parse_line("ADD R1, R2 R3").unwrap();
        assert_eq!(rest, "R3");
    }

    #[test]
    fn display_operand_test() {
        assert_eq!(Operand::Register(Reg::R4).to_string(), "R4");
        assert_eq!(Operand::Number(-1).to_string(), "#-1");
        assert_eq!(Operand::Label("LOOP").to_string(), "LOOP");
        assert_eq!(Operand::String("a\"b".into()).to_string(), r#""a\"b""#);
    }
}
