//! Two-pass assembler
//!
//! The first pass ([`layout`]) walks the source once, parsing every line,
//! building the symbol table and sizing each instruction and directive. The
//! second pass ([`emit`]) resolves operands against the now complete symbol
//! table and encodes each line into words.
//!
//! Assembly is all-or-nothing: the first error aborts it.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::info;

use crate::constants::{self as C, Address, Word};
use crate::isa::{EncodeError, OFFSET6, PC_OFFSET11, PC_OFFSET9};
use crate::parser::Operand;

pub(crate) mod emit;
pub(crate) mod layout;

/// Map of labels to their addresses
pub type SymbolTable = BTreeMap<String, Address>;

/// Assembler settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Where the program is loaded when it has no `.ORIG` directive
    pub default_origin: Address,

    /// Fail if the program does not start with an `.ORIG` directive
    pub require_orig: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            default_origin: C::PROGRAM_START,
            require_orig: false,
        }
    }
}

/// An assembled program, ready to be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    origin: Address,
    words: Vec<Word>,
    symbols: SymbolTable,
}

impl Program {
    /// Address the program is loaded at
    #[must_use]
    pub fn origin(&self) -> Address {
        self.origin
    }

    /// The assembled words, instructions and data
    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// First address after the program
    ///
    /// This is `0x10000` for a program ending at the very top of memory,
    /// hence the wider type.
    #[must_use]
    pub fn end(&self) -> u32 {
        u32::from(self.origin) + u32::from(C::WORD_SIZE) * self.len()
    }

    /// Number of words in the program
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn len(&self) -> u32 {
        // Layout guarantees the program fits the address space
        self.words.len() as u32
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Iterate over the words along with their address
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter(&self) -> impl Iterator<Item = (Address, Word)> + '_ {
        self.words
            .iter()
            .enumerate()
            .map(|(index, &word)| (self.origin + C::WORD_SIZE * index as Address, word))
    }

    /// Find the label defined at an address, if any
    #[must_use]
    pub fn label_at(&self, address: Address) -> Option<&str> {
        self.symbols
            .iter()
            .find(|(_, &a)| a == address)
            .map(|(label, _)| label.as_str())
    }
}

#[derive(Debug, Error, miette::Diagnostic, Clone, PartialEq, Eq)]
pub enum AssemblyErrorKind {
    #[error("undefined label `{0}`")]
    #[diagnostic(code(asm::undefined_label))]
    UndefinedLabel(String),

    #[error("label `{0}` is already defined")]
    #[diagnostic(code(asm::duplicate_label), help("labels must be unique"))]
    DuplicateLabel(String),

    #[error("offset {offset} does not fit in a {bits}-bit field")]
    #[diagnostic(
        code(asm::offset_out_of_range),
        help("the target is too far, or not word-aligned")
    )]
    OffsetOutOfRange { offset: i32, bits: u32 },

    #[error("immediate {value} is out of range ({min} to {max})")]
    #[diagnostic(code(asm::immediate_out_of_range))]
    ImmediateOutOfRange { value: i32, min: i32, max: i32 },

    #[error("unknown mnemonic `{0}`")]
    #[diagnostic(code(asm::unknown_mnemonic))]
    UnknownMnemonic(String),

    #[error("unknown directive `.{0}`")]
    #[diagnostic(
        code(asm::unknown_directive),
        help("supported directives are .ORIG, .END, .FILL, .BLKW and .STRINGZ")
    )]
    UnknownDirective(String),

    #[error("missing .ORIG directive")]
    #[diagnostic(
        code(asm::missing_orig),
        help("start the program with `.ORIG x3000`")
    )]
    MissingOrig,

    #[error(".ORIG must be the first directive, and appear only once")]
    #[diagnostic(code(asm::misplaced_orig))]
    MisplacedOrig,

    #[error("origin {0:#06x} is not word-aligned")]
    #[diagnostic(code(asm::unaligned_origin))]
    UnalignedOrigin(Address),

    #[error("malformed operand `{0}`")]
    #[diagnostic(code(asm::malformed_operand))]
    MalformedOperand(String),

    #[error("`{mnemonic}` expects {expected} operand(s), got {got}")]
    #[diagnostic(code(asm::wrong_operand_count))]
    WrongOperandCount {
        mnemonic: String,
        expected: usize,
        got: usize,
    },

    #[error("program does not fit in memory")]
    #[diagnostic(code(asm::address_overflow))]
    AddressOverflow,
}

impl From<EncodeError> for AssemblyErrorKind {
    fn from(error: EncodeError) -> Self {
        match error {
            EncodeError::FieldOutOfRange {
                field,
                value,
                min,
                max,
            } => match [OFFSET6, PC_OFFSET9, PC_OFFSET11]
                .into_iter()
                .find(|offset| offset.name == field)
            {
                Some(offset) => Self::OffsetOutOfRange {
                    offset: value,
                    bits: offset.bits,
                },
                None => Self::ImmediateOutOfRange { value, min, max },
            },
            EncodeError::Aliased(instruction) => Self::MalformedOperand(instruction.to_string()),
        }
    }
}

/// An assembly error, along with the line it happened on
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("line {line}: {kind}")]
pub struct AssemblyError {
    /// Line number, starting at 1
    pub line: usize,
    pub kind: AssemblyErrorKind,
}

impl AssemblyError {
    pub(crate) fn new(line: usize, kind: AssemblyErrorKind) -> Self {
        Self { line, kind }
    }
}

/// Check the number of operands of an instruction or directive
pub(crate) fn take_operands<'o, 'a, const N: usize>(
    name: &str,
    operands: &'o [Operand<'a>],
) -> Result<&'o [Operand<'a>; N], AssemblyErrorKind> {
    operands
        .try_into()
        .map_err(|_| AssemblyErrorKind::WrongOperandCount {
            mnemonic: name.to_owned(),
            expected: N,
            got: operands.len(),
        })
}

/// Assemble a program with the default options
///
/// # Errors
///
/// Returns the first error found in the source
pub fn assemble(source: &str) -> Result<Program, AssemblyError> {
    assemble_with(source, &Options::default())
}

/// Assemble a program
///
/// # Errors
///
/// Returns the first error found in the source
#[tracing::instrument(skip(source))]
pub fn assemble_with(source: &str, options: &Options) -> Result<Program, AssemblyError> {
    let layout = self::layout::layout(source, options)?;
    let words = self::emit::emit(&layout)?;
    let program = Program {
        origin: layout.origin,
        words,
        symbols: layout.symbols,
    };

    info!(
        origin = program.origin,
        words = program.words.len(),
        labels = program.symbols.len(),
        "Assembled program"
    );

    Ok(program)
}
