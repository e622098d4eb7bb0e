//! Second pass: resolve operands and encode every placed item

use tracing::trace;

use super::layout::{Item, Layout};
use super::{take_operands, AssemblyError, AssemblyErrorKind, SymbolTable};
use crate::constants::{self as C, Address, Word};
use crate::isa::{
    Condition, Field, Instruction, Reg, AMOUNT4, IMM5, OFFSET6, PC_OFFSET11, PC_OFFSET9,
    TRAP_VECTOR8,
};
use crate::parser::{Mnemonic, Operand};

type Result<T> = std::result::Result<T, AssemblyErrorKind>;

/// Resolves the operands of an item placed at a given address
struct Emitter<'s> {
    symbols: &'s SymbolTable,
    address: Address,
}

impl<'s> Emitter<'s> {
    fn register(operand: &Operand) -> Result<Reg> {
        match *operand {
            Operand::Register(reg) => Ok(reg),
            ref other => Err(AssemblyErrorKind::MalformedOperand(other.to_string())),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn immediate(operand: &Operand, field: Field) -> Result<i16> {
        match *operand {
            Operand::Number(value) if field.contains(value) => Ok(value as i16),
            Operand::Number(value) => Err(AssemblyErrorKind::ImmediateOutOfRange {
                value,
                min: field.min(),
                max: field.max(),
            }),
            ref other => Err(AssemblyErrorKind::MalformedOperand(other.to_string())),
        }
    }

    /// A base+offset displacement, which only accepts numbers
    #[allow(clippy::cast_possible_truncation)]
    fn displacement(operand: &Operand, field: Field) -> Result<i16> {
        match *operand {
            Operand::Number(offset) if field.contains(offset) => Ok(offset as i16),
            Operand::Number(offset) => Err(AssemblyErrorKind::OffsetOutOfRange {
                offset,
                bits: field.bits,
            }),
            ref other => Err(AssemblyErrorKind::MalformedOperand(other.to_string())),
        }
    }

    fn label(&self, label: &str) -> Result<Address> {
        self.symbols
            .get(label)
            .copied()
            .ok_or_else(|| AssemblyErrorKind::UndefinedLabel(label.to_owned()))
    }

    /// Resolve a PC-relative operand into a word offset
    ///
    /// Labels are relative to the address of the next instruction, numbers
    /// are taken as the raw offset.
    #[allow(clippy::cast_possible_truncation)]
    fn pc_offset(&self, operand: &Operand, field: Field) -> Result<i16> {
        let offset = match *operand {
            Operand::Number(offset) => offset,
            Operand::Label(label) => {
                let target = i32::from(self.label(label)?);
                let next = i32::from(self.address) + i32::from(C::WORD_SIZE);
                let bytes = target - next;
                if bytes % i32::from(C::WORD_SIZE) != 0 {
                    return Err(AssemblyErrorKind::OffsetOutOfRange {
                        offset: bytes,
                        bits: field.bits,
                    });
                }
                bytes / i32::from(C::WORD_SIZE)
            }
            ref other => return Err(AssemblyErrorKind::MalformedOperand(other.to_string())),
        };

        if field.contains(offset) {
            Ok(offset as i16)
        } else {
            Err(AssemblyErrorKind::OffsetOutOfRange {
                offset,
                bits: field.bits,
            })
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn instruction(&self, name: &str, operands: &[Operand]) -> Result<Instruction> {
        use Instruction as I;
        use Mnemonic as M;

        let mnemonic: Mnemonic = name
            .parse()
            .map_err(|_| AssemblyErrorKind::UnknownMnemonic(name.to_owned()))?;

        let instruction = match mnemonic {
            M::Add | M::And | M::Xor => {
                let [dr, sr1, source] = take_operands::<3>(name, operands)?;
                let dr = Self::register(dr)?;
                let sr1 = Self::register(sr1)?;

                if let Operand::Register(sr2) = *source {
                    match mnemonic {
                        M::Add => I::AddReg { dr, sr1, sr2 },
                        M::And => I::AndReg { dr, sr1, sr2 },
                        _ => I::XorReg { dr, sr1, sr2 },
                    }
                } else {
                    let imm5 = Self::immediate(source, IMM5)?;
                    match mnemonic {
                        M::Add => I::AddImm { dr, sr1, imm5 },
                        M::And => I::AndImm { dr, sr1, imm5 },
                        _ if imm5 == -1 => I::Not { dr, sr: sr1 },
                        _ => I::XorImm { dr, sr1, imm5 },
                    }
                }
            }

            M::Not => {
                let [dr, sr] = take_operands::<2>(name, operands)?;
                I::Not {
                    dr: Self::register(dr)?,
                    sr: Self::register(sr)?,
                }
            }

            M::Br(condition) => {
                let [target] = take_operands::<1>(name, operands)?;
                I::Branch {
                    condition,
                    offset9: self.pc_offset(target, PC_OFFSET9)?,
                }
            }

            M::Nop => {
                take_operands::<0>(name, operands)?;
                I::Branch {
                    condition: Condition::empty(),
                    offset9: 0,
                }
            }

            M::Jmp => {
                let [base] = take_operands::<1>(name, operands)?;
                match Self::register(base)? {
                    Reg::R7 => I::Ret,
                    base => I::Jmp { base },
                }
            }

            M::Ret => {
                take_operands::<0>(name, operands)?;
                I::Ret
            }

            M::Jsr => {
                let [target] = take_operands::<1>(name, operands)?;
                I::Jsr {
                    offset11: self.pc_offset(target, PC_OFFSET11)?,
                }
            }

            M::Jsrr => {
                let [base] = take_operands::<1>(name, operands)?;
                I::Jsrr {
                    base: Self::register(base)?,
                }
            }

            M::Ldb | M::Ldw | M::Ldi | M::Stb | M::Stw | M::Sti => {
                let [reg, base, offset6] = take_operands::<3>(name, operands)?;
                let reg = Self::register(reg)?;
                let base = Self::register(base)?;
                let offset6 = Self::displacement(offset6, OFFSET6)?;
                match mnemonic {
                    M::Ldb => I::LoadByte { dr: reg, base, offset6 },
                    M::Ldw => I::LoadWord { dr: reg, base, offset6 },
                    M::Ldi => I::LoadIndirect { dr: reg, base, offset6 },
                    M::Stb => I::StoreByte { sr: reg, base, offset6 },
                    M::Stw => I::StoreWord { sr: reg, base, offset6 },
                    _ => I::StoreIndirect { sr: reg, base, offset6 },
                }
            }

            M::Lea => {
                let [dr, target] = take_operands::<2>(name, operands)?;
                I::LeaEffectiveAddr {
                    dr: Self::register(dr)?,
                    offset9: self.pc_offset(target, PC_OFFSET9)?,
                }
            }

            M::Lshf | M::Rshfl | M::Rshfa => {
                let [dr, sr, amount4] = take_operands::<3>(name, operands)?;
                let dr = Self::register(dr)?;
                let sr = Self::register(sr)?;
                let amount4 = Self::immediate(amount4, AMOUNT4)? as u8;
                match mnemonic {
                    M::Lshf => I::ShiftLeft { dr, sr, amount4 },
                    M::Rshfl => I::ShiftRightLogical { dr, sr, amount4 },
                    _ => I::ShiftRightArithmetic { dr, sr, amount4 },
                }
            }

            M::Rti => {
                take_operands::<0>(name, operands)?;
                I::ReturnFromInterrupt
            }

            M::Trap => {
                let [vector] = take_operands::<1>(name, operands)?;
                I::Trap {
                    vector: Self::immediate(vector, TRAP_VECTOR8)? as u8,
                }
            }

            M::Getc | M::Out | M::Puts | M::In | M::Putsp | M::Halt => {
                take_operands::<0>(name, operands)?;
                let vector = match mnemonic {
                    M::Getc => C::TRAP_GETC,
                    M::Out => C::TRAP_OUT,
                    M::Puts => C::TRAP_PUTS,
                    M::In => C::TRAP_IN,
                    M::Putsp => C::TRAP_PUTSP,
                    _ => C::TRAP_HALT,
                };
                I::Trap { vector }
            }
        };

        Ok(instruction)
    }

    /// Resolve a `.FILL` value
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn fill(&self, operand: &Operand) -> Result<Word> {
        match *operand {
            Operand::Number(value) if (i32::from(i16::MIN)..=i32::from(u16::MAX)).contains(&value) => {
                Ok(value as Word)
            }
            Operand::Number(value) => Err(AssemblyErrorKind::ImmediateOutOfRange {
                value,
                min: i16::MIN.into(),
                max: u16::MAX.into(),
            }),
            Operand::Label(label) => self.label(label),
            ref other => Err(AssemblyErrorKind::MalformedOperand(other.to_string())),
        }
    }

    fn emit(&self, item: &Item, words: &mut Vec<Word>) -> Result<()> {
        match item {
            Item::Instruction { mnemonic, operands } => {
                let instruction = self.instruction(mnemonic, operands)?;
                let word = instruction.encode()?;
                trace!(address = self.address, word, %instruction, "Encoded instruction");
                words.push(word);
            }

            Item::Fill(operand) => words.push(self.fill(operand)?),

            Item::Block(size) => {
                words.extend(std::iter::repeat(0).take(*size as usize));
            }

            Item::String(string) => {
                words.extend(string.bytes().map(Word::from));
                words.push(0);
            }
        }

        Ok(())
    }
}

/// Encodes every placed item into words
pub(crate) fn emit(layout: &Layout) -> std::result::Result<Vec<Word>, AssemblyError> {
    let mut words = Vec::new();

    for placement in &layout.placements {
        let emitter = Emitter {
            symbols: &layout.symbols,
            address: placement.address,
        };

        emitter
            .emit(&placement.item, &mut words)
            .map_err(|kind| AssemblyError::new(placement.line, kind))?;
    }

    Ok(words)
}
