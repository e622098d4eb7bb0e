//! Instruction mnemonics and assembler directives

use std::fmt;

use parse_display::{Display, FromStr};

use crate::isa::Condition;

/// An instruction mnemonic, as written in the source
///
/// Mnemonics are case-insensitive. Branches carry their condition mask, with
/// a bare `BR` standing for `BRnzp`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mnemonic {
    Add,
    And,
    Xor,
    Not,
    Br(Condition),
    Jmp,
    Jsr,
    Jsrr,
    Ret,
    Ldb,
    Ldw,
    Ldi,
    Lea,
    Stb,
    Stw,
    Sti,
    Lshf,
    Rshfl,
    Rshfa,
    Rti,
    Trap,
    Getc,
    Out,
    Puts,
    In,
    Putsp,
    Halt,
    Nop,
}

impl Mnemonic {
    /// Check if a word is a reserved mnemonic
    #[must_use]
    pub fn is_mnemonic(word: &str) -> bool {
        word.parse::<Self>().is_ok()
    }
}

/// Parse the condition suffix of a branch: any non-empty subsequence of `NZP`,
/// in that order
fn parse_branch_condition(suffix: &str) -> Option<Condition> {
    if suffix.is_empty() {
        return Some(Condition::all());
    }

    let mut condition = Condition::empty();
    let mut rest = suffix;
    for (letter, flag) in [('N', Condition::N), ('Z', Condition::Z), ('P', Condition::P)] {
        if let Some(r) = rest.strip_prefix(letter) {
            condition |= flag;
            rest = r;
        }
    }

    rest.is_empty().then_some(condition)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownMnemonic;

impl std::str::FromStr for Mnemonic {
    type Err = UnknownMnemonic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let mnemonic = match upper.as_str() {
            "ADD" => Self::Add,
            "AND" => Self::And,
            "XOR" => Self::Xor,
            "NOT" => Self::Not,
            "JMP" => Self::Jmp,
            "JSR" => Self::Jsr,
            "JSRR" => Self::Jsrr,
            "RET" => Self::Ret,
            "LDB" => Self::Ldb,
            "LDW" => Self::Ldw,
            "LDI" => Self::Ldi,
            "LEA" => Self::Lea,
            "STB" => Self::Stb,
            "STW" => Self::Stw,
            "STI" => Self::Sti,
            "LSHF" => Self::Lshf,
            "RSHFL" => Self::Rshfl,
            "RSHFA" => Self::Rshfa,
            "RTI" => Self::Rti,
            "TRAP" => Self::Trap,
            "GETC" => Self::Getc,
            "OUT" => Self::Out,
            "PUTS" => Self::Puts,
            "IN" => Self::In,
            "PUTSP" => Self::Putsp,
            "HALT" => Self::Halt,
            "NOP" => Self::Nop,
            other => {
                let suffix = other.strip_prefix("BR").ok_or(UnknownMnemonic)?;
                Self::Br(parse_branch_condition(suffix).ok_or(UnknownMnemonic)?)
            }
        };

        Ok(mnemonic)
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "ADD",
            Self::And => "AND",
            Self::Xor => "XOR",
            Self::Not => "NOT",
            Self::Br(condition) => return write!(f, "BR{condition}"),
            Self::Jmp => "JMP",
            Self::Jsr => "JSR",
            Self::Jsrr => "JSRR",
            Self::Ret => "RET",
            Self::Ldb => "LDB",
            Self::Ldw => "LDW",
            Self::Ldi => "LDI",
            Self::Lea => "LEA",
            Self::Stb => "STB",
            Self::Stw => "STW",
            Self::Sti => "STI",
            Self::Lshf => "LSHF",
            Self::Rshfl => "RSHFL",
            Self::Rshfa => "RSHFA",
            Self::Rti => "RTI",
            Self::Trap => "TRAP",
            Self::Getc => "GETC",
            Self::Out => "OUT",
            Self::Puts => "PUTS",
            Self::In => "IN",
            Self::Putsp => "PUTSP",
            Self::Halt => "HALT",
            Self::Nop => "NOP",
        };

        write!(f, "{name}")
    }
}

/// An assembler directive, written with a leading dot
#[derive(Display, FromStr, Clone, Copy, Debug, PartialEq, Eq)]
#[display(style = "UPPERCASE")]
pub enum Directive {
    /// Set the address the program is loaded at
    ///
    /// ```asm
    /// .ORIG x3000
    /// ```
    Orig,

    /// Stop assembling, ignoring the rest of the source
    End,

    /// Store a word, given as a number or a label
    ///
    /// ```asm
    /// .FILL x00FF
    /// ```
    Fill,

    /// Reserve a number of zeroed words
    ///
    /// ```asm
    /// .BLKW 10
    /// ```
    Blkw,

    /// Store a zero-terminated string, one character per word
    ///
    /// ```asm
    /// .STRINGZ "hello"
    /// ```
    Stringz,
}

impl Directive {
    /// Parse a directive name, without its leading dot, ignoring case
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        name.to_ascii_uppercase().parse().ok()
    }
}
