//! First pass: place every line in memory and collect the labels

use std::ops::ControlFlow;

use tracing::{debug, trace};

use super::{take_operands, AssemblyError, AssemblyErrorKind, Options, SymbolTable};
use crate::constants::{self as C, Address};
use crate::parser::{parse_line, Directive, Line, LineContent, Operand};

/// Number of addressable bytes
const ADDRESS_SPACE: u32 = 0x1_0000;

/// Something that takes space in memory
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Item<'a> {
    /// An instruction, not yet resolved
    Instruction {
        mnemonic: &'a str,
        operands: Vec<Operand<'a>>,
    },

    /// A word filled by `.FILL`, with a number or a label
    Fill(Operand<'a>),

    /// Zeroed words reserved by `.BLKW`
    Block(u32),

    /// A zero-terminated string from `.STRINGZ`
    String(String),
}

impl<'a> Item<'a> {
    /// Number of words taken by the item
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn size(&self) -> u32 {
        match self {
            Item::Instruction { .. } | Item::Fill(_) => 1,
            Item::Block(size) => *size,
            // Strings are ASCII, so this counts characters. Layout rejects
            // anything that would not fit the address space anyway.
            Item::String(string) => string.len() as u32 + 1,
        }
    }
}

/// An item placed at an address, along with the line it comes from
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Placement<'a> {
    pub line: usize,
    pub address: Address,
    pub item: Item<'a>,
}

#[derive(Debug, Default)]
pub(crate) struct Layout<'a> {
    pub origin: Address,
    pub symbols: SymbolTable,
    pub placements: Vec<Placement<'a>>,
}

struct Builder<'a, 'o> {
    options: &'o Options,
    layout: Layout<'a>,

    /// Current address. This can reach one past the end of memory.
    address: u32,

    /// Whether anything but blank lines and comments was seen
    started: bool,
}

impl<'a, 'o> Builder<'a, 'o> {
    fn new(options: &'o Options) -> Self {
        Self {
            options,
            layout: Layout {
                origin: options.default_origin,
                ..Layout::default()
            },
            address: options.default_origin.into(),
            started: false,
        }
    }

    /// Mark the beginning of the program
    fn begin(&mut self) -> Result<(), AssemblyErrorKind> {
        if !self.started && self.options.require_orig {
            return Err(AssemblyErrorKind::MissingOrig);
        }

        self.started = true;
        Ok(())
    }

    fn set_origin(&mut self, operands: &[Operand]) -> Result<(), AssemblyErrorKind> {
        if self.started {
            return Err(AssemblyErrorKind::MisplacedOrig);
        }

        let [operand] = take_operands::<1>("ORIG", operands)?;
        let origin = match *operand {
            Operand::Number(value) => {
                Address::try_from(value).map_err(|_| AssemblyErrorKind::ImmediateOutOfRange {
                    value,
                    min: 0,
                    max: Address::MAX.into(),
                })?
            }
            ref other => return Err(AssemblyErrorKind::MalformedOperand(other.to_string())),
        };

        if origin % C::WORD_SIZE != 0 {
            return Err(AssemblyErrorKind::UnalignedOrigin(origin));
        }

        debug!(origin, "Program origin");
        self.layout.origin = origin;
        self.address = origin.into();
        self.started = true;
        Ok(())
    }

    fn define(&mut self, label: &str) -> Result<(), AssemblyErrorKind> {
        let address =
            Address::try_from(self.address).map_err(|_| AssemblyErrorKind::AddressOverflow)?;

        if self.layout.symbols.contains_key(label) {
            return Err(AssemblyErrorKind::DuplicateLabel(label.to_owned()));
        }

        debug!(label, address, "Defined label");
        self.layout.symbols.insert(label.to_owned(), address);
        Ok(())
    }

    fn place(&mut self, line: usize, item: Item<'a>) -> Result<(), AssemblyErrorKind> {
        let size = item.size();
        let end = size
            .checked_mul(C::WORD_SIZE.into())
            .and_then(|bytes| self.address.checked_add(bytes))
            .filter(|&end| end <= ADDRESS_SPACE)
            .ok_or(AssemblyErrorKind::AddressOverflow)?;

        let address =
            Address::try_from(self.address).map_err(|_| AssemblyErrorKind::AddressOverflow)?;
        trace!(line, address, size, "Placed item");
        self.layout.placements.push(Placement {
            line,
            address,
            item,
        });
        self.address = end;
        Ok(())
    }

    /// Process a parsed line, telling if assembly should stop there
    fn process(
        &mut self,
        number: usize,
        line: Line<'a>,
    ) -> Result<ControlFlow<()>, AssemblyErrorKind> {
        let Line { label, content, .. } = line;

        let Some(content) = content else {
            if let Some(label) = label {
                self.begin()?;
                self.define(label)?;
            }
            return Ok(ControlFlow::Continue(()));
        };

        let item = match content {
            LineContent::Instruction { mnemonic, operands } => {
                Item::Instruction { mnemonic, operands }
            }

            LineContent::Directive {
                directive: name,
                operands,
            } => {
                let directive = Directive::from_name(name)
                    .ok_or_else(|| AssemblyErrorKind::UnknownDirective(name.to_owned()))?;

                match directive {
                    Directive::Orig => {
                        self.set_origin(&operands)?;
                        if let Some(label) = label {
                            self.define(label)?;
                        }
                        return Ok(ControlFlow::Continue(()));
                    }

                    Directive::End => {
                        take_operands::<0>(name, &operands)?;
                        self.begin()?;
                        if let Some(label) = label {
                            self.define(label)?;
                        }
                        return Ok(ControlFlow::Break(()));
                    }

                    Directive::Fill => {
                        let [value] = take_operands::<1>(name, &operands)?;
                        Item::Fill(value.clone())
                    }

                    Directive::Blkw => {
                        let [count] = take_operands::<1>(name, &operands)?;
                        match *count {
                            Operand::Number(value) => Item::Block(u32::try_from(value).map_err(
                                |_| AssemblyErrorKind::ImmediateOutOfRange {
                                    value,
                                    min: 0,
                                    max: Address::MAX.into(),
                                },
                            )?),
                            ref other => {
                                return Err(AssemblyErrorKind::MalformedOperand(other.to_string()))
                            }
                        }
                    }

                    Directive::Stringz => {
                        let [string] = take_operands::<1>(name, &operands)?;
                        match string {
                            Operand::String(string) if string.is_ascii() => {
                                Item::String(string.clone())
                            }
                            other => {
                                return Err(AssemblyErrorKind::MalformedOperand(other.to_string()))
                            }
                        }
                    }
                }
            }
        };

        self.begin()?;
        if let Some(label) = label {
            self.define(label)?;
        }
        self.place(number, item)?;
        Ok(ControlFlow::Continue(()))
    }
}

/// Lays out the program
///
/// It collects the labels and places every instruction and directive, up to
/// the `.END` directive.
pub(crate) fn layout<'a>(source: &'a str, options: &Options) -> Result<Layout<'a>, AssemblyError> {
    let mut builder = Builder::new(options);

    for (index, text) in source.lines().enumerate() {
        let number = index + 1;
        let line = parse_line(text).map_err(|token| {
            AssemblyError::new(number, AssemblyErrorKind::MalformedOperand(token.to_owned()))
        })?;
        trace!(number, ?line, "Parsed line");

        let flow = builder
            .process(number, line)
            .map_err(|kind| AssemblyError::new(number, kind))?;
        if flow.is_break() {
            break;
        }
    }

    if !builder.started && options.require_orig {
        return Err(AssemblyError::new(1, AssemblyErrorKind::MissingOrig));
    }

    Ok(builder.layout)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn place_labels_test() {
        let layout = layout(
            indoc! {r#"
                .ORIG x3000
                main:   ADD R1, R1, #1
                loop    BR main
                text    .STRINGZ "ab"
                buffer  .BLKW 3
                after
            "#},
            &Options::default(),
        )
        .unwrap();

        let expected: SymbolTable = [
            ("main".to_owned(), 0x3000),
            ("loop".to_owned(), 0x3002),
            ("text".to_owned(), 0x3004),
            ("buffer".to_owned(), 0x300A),
            ("after".to_owned(), 0x3010),
        ]
        .into_iter()
        .collect();
        assert_eq!(layout.symbols, expected);
        assert_eq!(layout.placements.len(), 4);
        assert_eq!(
            layout.placements[2],
            Placement {
                line: 4,
                address: 0x3004,
                item: Item::String("ab".into()),
            }
        );
    }

    #[test]
    fn default_origin_test() {
        let options = Options {
            default_origin: 0x0200,
            require_orig: false,
        };
        let layout = layout("start HALT", &options).unwrap();
        assert_eq!(layout.origin, 0x0200);
        assert_eq!(layout.symbols.get("start"), Some(&0x0200));
    }

    #[test]
    fn label_on_end_test() {
        let layout = layout("HALT\ndone .END\nafter HALT", &Options::default()).unwrap();
        assert_eq!(layout.symbols.get("done"), Some(&0x3002));
        assert_eq!(layout.symbols.get("after"), None);
        assert_eq!(layout.placements.len(), 1);
    }

    #[test]
    fn directive_errors_test() {
        let error = |source| layout(source, &Options::default()).unwrap_err().kind;

        assert_eq!(
            error(".BLKW #-1"),
            AssemblyErrorKind::ImmediateOutOfRange {
                value: -1,
                min: 0,
                max: 0xFFFF,
            }
        );
        assert_eq!(
            error(".ORIG x10000"),
            AssemblyErrorKind::ImmediateOutOfRange {
                value: 0x10000,
                min: 0,
                max: 0xFFFF,
            }
        );
        assert_eq!(
            error(".STRINGZ R1"),
            AssemblyErrorKind::MalformedOperand("R1".into())
        );
        assert_eq!(
            error(".STRINGZ \"caf\u{e9}\""),
            AssemblyErrorKind::MalformedOperand("\"caf\u{e9}\"".into())
        );
        assert_eq!(
            error(".FILL 1, 2"),
            AssemblyErrorKind::WrongOperandCount {
                mnemonic: "FILL".into(),
                expected: 1,
                got: 2,
            }
        );
        assert_eq!(
            error(".ORIG x3000\n.BLKW 32768"),
            AssemblyErrorKind::AddressOverflow
        );
    }

    #[test]
    fn empty_program_test() {
        let layout = layout("; nothing here\n", &Options::default()).unwrap();
        assert!(layout.placements.is_empty());

        let options = Options {
            require_orig: true,
            ..Options::default()
        };
        assert_eq!(
            super::layout("", &options).unwrap_err(),
            AssemblyError::new(1, AssemblyErrorKind::MissingOrig)
        );
    }
}
