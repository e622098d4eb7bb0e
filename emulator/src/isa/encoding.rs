use thiserror::Error;

use super::{Condition, Instruction, Reg};
use crate::constants::Word;

const OP_BR: u16 = 0b0000;
const OP_ADD: u16 = 0b0001;
const OP_LDB: u16 = 0b0010;
const OP_STB: u16 = 0b0011;
const OP_JSR: u16 = 0b0100;
const OP_AND: u16 = 0b0101;
const OP_LDW: u16 = 0b0110;
const OP_STW: u16 = 0b0111;
const OP_RTI: u16 = 0b1000;
const OP_XOR: u16 = 0b1001;
const OP_LDI: u16 = 0b1010;
const OP_STI: u16 = 0b1011;
const OP_JMP: u16 = 0b1100;
const OP_SHF: u16 = 0b1101;
const OP_LEA: u16 = 0b1110;
const OP_TRAP: u16 = 0b1111;

const SHF_LEFT: u16 = 0b00;
const SHF_RIGHT_LOGICAL: u16 = 0b01;
const SHF_RIGHT_ARITHMETIC: u16 = 0b11;

/// Selects the immediate form of `ADD`, `AND` and `XOR`
const IMMEDIATE_FLAG: u16 = 1 << 5;

/// Selects the PC-relative form of `JSR`
const JSR_FLAG: u16 = 1 << 11;

/// A numeric field in the low bits of an instruction word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub bits: u32,
    pub signed: bool,
}

pub const IMM5: Field = Field::signed("imm5", 5);
pub const OFFSET6: Field = Field::signed("offset6", 6);
pub const PC_OFFSET9: Field = Field::signed("PCoffset9", 9);
pub const PC_OFFSET11: Field = Field::signed("PCoffset11", 11);
pub const AMOUNT4: Field = Field::unsigned("amount4", 4);
pub const TRAP_VECTOR8: Field = Field::unsigned("trapvect8", 8);

impl Field {
    const fn signed(name: &'static str, bits: u32) -> Self {
        Self {
            name,
            bits,
            signed: true,
        }
    }

    const fn unsigned(name: &'static str, bits: u32) -> Self {
        Self {
            name,
            bits,
            signed: false,
        }
    }

    /// Smallest value the field can hold
    #[must_use]
    pub const fn min(self) -> i32 {
        if self.signed {
            -(1 << (self.bits - 1))
        } else {
            0
        }
    }

    /// Largest value the field can hold
    #[must_use]
    pub const fn max(self) -> i32 {
        if self.signed {
            (1 << (self.bits - 1)) - 1
        } else {
            (1 << self.bits) - 1
        }
    }

    #[must_use]
    pub const fn contains(self, value: i32) -> bool {
        value >= self.min() && value <= self.max()
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn mask(self) -> u16 {
        ((1_u32 << self.bits) - 1) as u16
    }

    /// Read the field from the low bits of a word, sign-extending it if needed
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn extract(self, word: Word) -> i16 {
        let raw = word & self.mask();
        if self.signed && raw & (1 << (self.bits - 1)) != 0 {
            (raw | !self.mask()) as i16
        } else {
            raw as i16
        }
    }

    /// Truncate a value to the width of the field, failing if it does not fit
    ///
    /// # Errors
    ///
    /// Returns an error if the value is outside of `min()..=max()`
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn insert(self, value: i32) -> Result<Word, EncodeError> {
        if self.contains(value) {
            Ok((value as u16) & self.mask())
        } else {
            Err(EncodeError::FieldOutOfRange {
                field: self.name,
                value,
                min: self.min(),
                max: self.max(),
            })
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{field} value {value} does not fit (expected {min} to {max})")]
    FieldOutOfRange {
        field: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },

    #[error("`{0}` is encoded as a different instruction")]
    Aliased(Instruction),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("word {0:#06x} does not encode any instruction")]
    UnknownOpcode(Word),
}

fn register_form(opcode: u16, dr: Reg, sr1: Reg, sr2: Reg) -> Word {
    opcode << 12 | dr.to_field(9) | sr1.to_field(6) | sr2.to_field(0)
}

fn immediate_form(opcode: u16, dr: Reg, sr1: Reg, imm5: i16) -> Result<Word, EncodeError> {
    Ok(opcode << 12
        | dr.to_field(9)
        | sr1.to_field(6)
        | IMMEDIATE_FLAG
        | IMM5.insert(imm5.into())?)
}

fn base_offset_form(opcode: u16, reg: Reg, base: Reg, offset6: i16) -> Result<Word, EncodeError> {
    Ok(opcode << 12 | reg.to_field(9) | base.to_field(6) | OFFSET6.insert(offset6.into())?)
}

fn shift_form(mode: u16, dr: Reg, sr: Reg, amount4: u8) -> Result<Word, EncodeError> {
    Ok(OP_SHF << 12
        | dr.to_field(9)
        | sr.to_field(6)
        | mode << 4
        | AMOUNT4.insert(amount4.into())?)
}

impl Instruction {
    /// Encode the instruction into a 16-bit word
    ///
    /// # Errors
    ///
    /// Returns an error if an immediate or offset does not fit its field, or
    /// if the instruction has a canonical spelling with a different variant
    /// (`XOR DR, SR, #-1` is `NOT`, `JMP R7` is `RET`)
    pub fn encode(&self) -> Result<Word, EncodeError> {
        use Instruction::*;

        let word = match *self {
            AddReg { dr, sr1, sr2 } => register_form(OP_ADD, dr, sr1, sr2),
            AddImm { dr, sr1, imm5 } => immediate_form(OP_ADD, dr, sr1, imm5)?,
            AndReg { dr, sr1, sr2 } => register_form(OP_AND, dr, sr1, sr2),
            AndImm { dr, sr1, imm5 } => immediate_form(OP_AND, dr, sr1, imm5)?,
            XorReg { dr, sr1, sr2 } => register_form(OP_XOR, dr, sr1, sr2),
            XorImm { imm5: -1, .. } => return Err(EncodeError::Aliased(*self)),
            XorImm { dr, sr1, imm5 } => immediate_form(OP_XOR, dr, sr1, imm5)?,
            Not { dr, sr } => immediate_form(OP_XOR, dr, sr, -1)?,
            Branch { condition, offset9 } => {
                OP_BR << 12
                    | u16::from(condition.bits()) << 9
                    | PC_OFFSET9.insert(offset9.into())?
            }
            Jmp { base: Reg::R7 } => return Err(EncodeError::Aliased(*self)),
            Jmp { base } => OP_JMP << 12 | base.to_field(6),
            Ret => OP_JMP << 12 | Reg::R7.to_field(6),
            Jsr { offset11 } => OP_JSR << 12 | JSR_FLAG | PC_OFFSET11.insert(offset11.into())?,
            Jsrr { base } => OP_JSR << 12 | base.to_field(6),
            LoadByte { dr, base, offset6 } => base_offset_form(OP_LDB, dr, base, offset6)?,
            LoadWord { dr, base, offset6 } => base_offset_form(OP_LDW, dr, base, offset6)?,
            LoadIndirect { dr, base, offset6 } => base_offset_form(OP_LDI, dr, base, offset6)?,
            LeaEffectiveAddr { dr, offset9 } => {
                OP_LEA << 12 | dr.to_field(9) | PC_OFFSET9.insert(offset9.into())?
            }
            StoreByte { sr, base, offset6 } => base_offset_form(OP_STB, sr, base, offset6)?,
            StoreWord { sr, base, offset6 } => base_offset_form(OP_STW, sr, base, offset6)?,
            StoreIndirect { sr, base, offset6 } => base_offset_form(OP_STI, sr, base, offset6)?,
            ShiftLeft { dr, sr, amount4 } => shift_form(SHF_LEFT, dr, sr, amount4)?,
            ShiftRightLogical { dr, sr, amount4 } => {
                shift_form(SHF_RIGHT_LOGICAL, dr, sr, amount4)?
            }
            ShiftRightArithmetic { dr, sr, amount4 } => {
                shift_form(SHF_RIGHT_ARITHMETIC, dr, sr, amount4)?
            }
            ReturnFromInterrupt => OP_RTI << 12,
            Trap { vector } => OP_TRAP << 12 | TRAP_VECTOR8.insert(vector.into())?,
        };

        Ok(word)
    }

    /// Decode a 16-bit word into an instruction
    ///
    /// Reserved bits must be zero, which makes `decode` the exact inverse of
    /// [`Instruction::encode`] on every word it accepts.
    ///
    /// # Errors
    ///
    /// Returns an error if the word does not encode any instruction
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn decode(word: Word) -> Result<Self, DecodeError> {
        use Instruction::*;

        let unknown = DecodeError::UnknownOpcode(word);
        let opcode = word >> 12;
        let dr = Reg::from_field(word, 9);
        let sr1 = Reg::from_field(word, 6);
        let immediate = word & IMMEDIATE_FLAG != 0;

        let instruction = match opcode {
            OP_ADD | OP_AND | OP_XOR if immediate => {
                let imm5 = IMM5.extract(word);
                match opcode {
                    OP_ADD => AddImm { dr, sr1, imm5 },
                    OP_AND => AndImm { dr, sr1, imm5 },
                    _ if imm5 == -1 => Not { dr, sr: sr1 },
                    _ => XorImm { dr, sr1, imm5 },
                }
            }

            OP_ADD | OP_AND | OP_XOR => {
                if word & 0b1_1000 != 0 {
                    return Err(unknown);
                }

                let sr2 = Reg::from_field(word, 0);
                match opcode {
                    OP_ADD => AddReg { dr, sr1, sr2 },
                    OP_AND => AndReg { dr, sr1, sr2 },
                    _ => XorReg { dr, sr1, sr2 },
                }
            }

            OP_BR => Branch {
                condition: Condition::from_bits_truncate((word >> 9) as u8),
                offset9: PC_OFFSET9.extract(word),
            },

            OP_JMP => {
                if word & 0x0E3F != 0 {
                    return Err(unknown);
                }

                match sr1 {
                    Reg::R7 => Ret,
                    base => Jmp { base },
                }
            }

            OP_JSR if word & JSR_FLAG != 0 => Jsr {
                offset11: PC_OFFSET11.extract(word),
            },

            OP_JSR => {
                if word & 0x063F != 0 {
                    return Err(unknown);
                }

                Jsrr { base: sr1 }
            }

            OP_LDB => LoadByte {
                dr,
                base: sr1,
                offset6: OFFSET6.extract(word),
            },

            OP_LDW => LoadWord {
                dr,
                base: sr1,
                offset6: OFFSET6.extract(word),
            },

            OP_LDI => LoadIndirect {
                dr,
                base: sr1,
                offset6: OFFSET6.extract(word),
            },

            OP_LEA => LeaEffectiveAddr {
                dr,
                offset9: PC_OFFSET9.extract(word),
            },

            OP_STB => StoreByte {
                sr: dr,
                base: sr1,
                offset6: OFFSET6.extract(word),
            },

            OP_STW => StoreWord {
                sr: dr,
                base: sr1,
                offset6: OFFSET6.extract(word),
            },

            OP_STI => StoreIndirect {
                sr: dr,
                base: sr1,
                offset6: OFFSET6.extract(word),
            },

            OP_SHF => {
                let amount4 = AMOUNT4.extract(word) as u8;
                match (word >> 4) & 0b11 {
                    SHF_LEFT => ShiftLeft {
                        dr,
                        sr: sr1,
                        amount4,
                    },
                    SHF_RIGHT_LOGICAL => ShiftRightLogical {
                        dr,
                        sr: sr1,
                        amount4,
                    },
                    SHF_RIGHT_ARITHMETIC => ShiftRightArithmetic {
                        dr,
                        sr: sr1,
                        amount4,
                    },
                    _ => return Err(unknown),
                }
            }

            OP_RTI => {
                if word & 0x0FFF != 0 {
                    return Err(unknown);
                }

                ReturnFromInterrupt
            }

            OP_TRAP => {
                if word & 0x0F00 != 0 {
                    return Err(unknown);
                }

                Trap {
                    vector: TRAP_VECTOR8.extract(word) as u8,
                }
            }

            _ => return Err(unknown),
        };

        Ok(instruction)
    }
}

impl TryFrom<Word> for Instruction {
    type Error = DecodeError;

    fn try_from(word: Word) -> Result<Self, Self::Error> {
        Self::decode(word)
    }
}

impl TryFrom<&Instruction> for Word {
    type Error = EncodeError;

    fn try_from(instruction: &Instruction) -> Result<Self, Self::Error> {
        instruction.encode()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn field_range_test() {
        assert_eq!((IMM5.min(), IMM5.max()), (-16, 15));
        assert_eq!((OFFSET6.min(), OFFSET6.max()), (-32, 31));
        assert_eq!((PC_OFFSET9.min(), PC_OFFSET9.max()), (-256, 255));
        assert_eq!((PC_OFFSET11.min(), PC_OFFSET11.max()), (-1024, 1023));
        assert_eq!((AMOUNT4.min(), AMOUNT4.max()), (0, 15));
        assert_eq!((TRAP_VECTOR8.min(), TRAP_VECTOR8.max()), (0, 255));
    }

    #[test]
    fn field_extract_test() {
        assert_eq!(IMM5.extract(0b1_1111), -1);
        assert_eq!(IMM5.extract(0b1_0000), -16);
        assert_eq!(IMM5.extract(0b0_1111), 15);
        // Bits above the field are ignored
        assert_eq!(IMM5.extract(0xFFE0 | 0b0_0011), 3);
        assert_eq!(AMOUNT4.extract(0b1111), 15);
    }

    #[test]
    fn field_insert_test() {
        assert_eq!(IMM5.insert(-1), Ok(0b1_1111));
        assert_eq!(PC_OFFSET9.insert(-2), Ok(0x1FE));
        assert_eq!(
            IMM5.insert(16),
            Err(EncodeError::FieldOutOfRange {
                field: "imm5",
                value: 16,
                min: -16,
                max: 15,
            })
        );
        assert!(AMOUNT4.insert(-1).is_err());
    }

    #[test]
    fn encode_test() {
        use Instruction::*;

        let cases = [
            (
                AddImm {
                    dr: Reg::R1,
                    sr1: Reg::R1,
                    imm5: 5,
                },
                0x1265,
            ),
            (
                AddReg {
                    dr: Reg::R3,
                    sr1: Reg::R1,
                    sr2: Reg::R2,
                },
                0x1642,
            ),
            (
                AndImm {
                    dr: Reg::R0,
                    sr1: Reg::R0,
                    imm5: 0,
                },
                0x5020,
            ),
            (
                Not {
                    dr: Reg::R2,
                    sr: Reg::R3,
                },
                0x94FF,
            ),
            (
                Branch {
                    condition: Condition::P,
                    offset9: -2,
                },
                0x03FE,
            ),
            (
                Branch {
                    condition: Condition::empty(),
                    offset9: 0,
                },
                0x0000,
            ),
            (Ret, 0xC1C0),
            (Jmp { base: Reg::R2 }, 0xC080),
            (Jsr { offset11: -1 }, 0x4FFF),
            (Jsrr { base: Reg::R3 }, 0x40C0),
            (
                LoadByte {
                    dr: Reg::R1,
                    base: Reg::R2,
                    offset6: -1,
                },
                0x22BF,
            ),
            (
                StoreWord {
                    sr: Reg::R4,
                    base: Reg::R6,
                    offset6: 2,
                },
                0x7982,
            ),
            (
                LeaEffectiveAddr {
                    dr: Reg::R0,
                    offset9: 3,
                },
                0xE003,
            ),
            (
                ShiftLeft {
                    dr: Reg::R1,
                    sr: Reg::R1,
                    amount4: 3,
                },
                0xD243,
            ),
            (
                ShiftRightLogical {
                    dr: Reg::R1,
                    sr: Reg::R1,
                    amount4: 3,
                },
                0xD253,
            ),
            (
                ShiftRightArithmetic {
                    dr: Reg::R1,
                    sr: Reg::R1,
                    amount4: 3,
                },
                0xD273,
            ),
            (ReturnFromInterrupt, 0x8000),
            (Trap { vector: 0x25 }, 0xF025),
        ];

        for (instruction, word) in cases {
            assert_eq!(instruction.encode(), Ok(word), "encoding {instruction}");
            assert_eq!(
                Instruction::decode(word),
                Ok(instruction),
                "decoding {word:#06x}"
            );
        }
    }

    #[test]
    fn encode_out_of_range_test() {
        let instruction = Instruction::Branch {
            condition: Condition::all(),
            offset9: 256,
        };
        assert_eq!(
            instruction.encode(),
            Err(EncodeError::FieldOutOfRange {
                field: "PCoffset9",
                value: 256,
                min: -256,
                max: 255,
            })
        );

        let instruction = Instruction::ShiftLeft {
            dr: Reg::R0,
            sr: Reg::R0,
            amount4: 16,
        };
        assert!(instruction.encode().is_err());
    }

    #[test]
    fn encode_aliased_test() {
        let xor = Instruction::XorImm {
            dr: Reg::R0,
            sr1: Reg::R1,
            imm5: -1,
        };
        assert_eq!(xor.encode(), Err(EncodeError::Aliased(xor)));

        let jmp = Instruction::Jmp { base: Reg::R7 };
        assert_eq!(jmp.encode(), Err(EncodeError::Aliased(jmp)));
    }

    #[test]
    fn decode_reserved_bits_test() {
        let reserved = [
            0x1648, // ADD register form with bit 3 set
            0xC280, // JMP with a non-zero DR field
            0x42C0, // JSRR with bit 9 set
            0x8001, // RTI with trailing bits
            0xF125, // TRAP with bits [11:8] set
            0xD223, // SHF with the reserved 10 mode
        ];

        for word in reserved {
            assert_eq!(
                Instruction::decode(word),
                Err(DecodeError::UnknownOpcode(word))
            );
        }
    }

    #[test]
    fn decode_sign_extends_test() {
        assert_eq!(
            Instruction::decode(0x0FFF),
            Ok(Instruction::Branch {
                condition: Condition::all(),
                offset9: -1,
            })
        );
        assert_eq!(
            Instruction::decode(0x1E30),
            Ok(Instruction::AddImm {
                dr: Reg::R7,
                sr1: Reg::R0,
                imm5: -16,
            })
        );
    }

    #[test]
    fn round_trip_every_word_test() {
        let mut decodable = 0;
        for word in 0..=u16::MAX {
            if let Ok(instruction) = Instruction::decode(word) {
                decodable += 1;
                assert_eq!(instruction.encode(), Ok(word), "re-encoding {instruction}");
            }
        }

        assert_eq!(decodable, 45_841);
    }
}
