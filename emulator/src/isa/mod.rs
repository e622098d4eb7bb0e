//! The LC-3b instruction set
//!
//! This module holds the structured representation of instructions, along with
//! the bidirectional mapping between that representation and 16-bit words
//! (see [`Instruction::encode`] and [`Instruction::decode`]).
//!
//! Every immediate and offset field is held sign-extended in a native integer.
//! PC-relative and word offsets are in words, except for `LDB`/`STB` which use
//! byte offsets.

use std::fmt;

use bitflags::bitflags;

use crate::constants as C;

mod encoding;
mod registers;

pub use self::encoding::{
    DecodeError, EncodeError, Field, AMOUNT4, IMM5, OFFSET6, PC_OFFSET11, PC_OFFSET9,
    TRAP_VECTOR8,
};
pub use self::registers::{Reg, RegisterParseError};

bitflags! {
    /// Condition codes, or the condition mask of a branch
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Condition: u8 {
        const N = 0b100;
        const Z = 0b010;
        const P = 0b001;
    }
}

impl Condition {
    /// The condition codes reflecting the sign of a value
    #[must_use]
    pub fn from_value(value: i16) -> Self {
        match value.cmp(&0) {
            std::cmp::Ordering::Less => Condition::N,
            std::cmp::Ordering::Equal => Condition::Z,
            std::cmp::Ordering::Greater => Condition::P,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.contains(Condition::N) {
            write!(f, "n")?;
        }
        if self.contains(Condition::Z) {
            write!(f, "z")?;
        }
        if self.contains(Condition::P) {
            write!(f, "p")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `DR = SR1 + SR2`
    AddReg { dr: Reg, sr1: Reg, sr2: Reg },

    /// `DR = SR1 + SEXT(imm5)`
    AddImm { dr: Reg, sr1: Reg, imm5: i16 },

    /// `DR = SR1 & SR2`
    AndReg { dr: Reg, sr1: Reg, sr2: Reg },

    /// `DR = SR1 & SEXT(imm5)`
    AndImm { dr: Reg, sr1: Reg, imm5: i16 },

    /// `DR = SR1 ^ SR2`
    XorReg { dr: Reg, sr1: Reg, sr2: Reg },

    /// `DR = SR1 ^ SEXT(imm5)`, for any immediate but -1
    XorImm { dr: Reg, sr1: Reg, imm5: i16 },

    /// `DR = !SR`, encoded as a `XOR` with an all-ones immediate
    Not { dr: Reg, sr: Reg },

    /// Conditional PC-relative branch
    Branch { condition: Condition, offset9: i16 },

    /// `PC = BaseR`
    Jmp { base: Reg },

    /// `R7 = PC; PC = PC + offset11 * 2`
    Jsr { offset11: i16 },

    /// `R7 = PC; PC = BaseR`
    Jsrr { base: Reg },

    /// `PC = R7`
    Ret,

    /// `DR = SEXT(mem8[BaseR + offset6])`
    LoadByte { dr: Reg, base: Reg, offset6: i16 },

    /// `DR = mem16[BaseR + offset6 * 2]`
    LoadWord { dr: Reg, base: Reg, offset6: i16 },

    /// `DR = mem16[mem16[BaseR + offset6 * 2]]`
    LoadIndirect { dr: Reg, base: Reg, offset6: i16 },

    /// `DR = PC + offset9 * 2`
    LeaEffectiveAddr { dr: Reg, offset9: i16 },

    /// `mem8[BaseR + offset6] = SR[7:0]`
    StoreByte { sr: Reg, base: Reg, offset6: i16 },

    /// `mem16[BaseR + offset6 * 2] = SR`
    StoreWord { sr: Reg, base: Reg, offset6: i16 },

    /// `mem16[mem16[BaseR + offset6 * 2]] = SR`
    StoreIndirect { sr: Reg, base: Reg, offset6: i16 },

    /// `DR = SR << amount4`
    ShiftLeft { dr: Reg, sr: Reg, amount4: u8 },

    /// `DR = SR >> amount4`, zero-filled
    ShiftRightLogical { dr: Reg, sr: Reg, amount4: u8 },

    /// `DR = SR >> amount4`, sign-filled
    ShiftRightArithmetic { dr: Reg, sr: Reg, amount4: u8 },

    /// Return from an interrupt
    ReturnFromInterrupt,

    /// Call a system service routine
    Trap { vector: u8 },
}

impl Instruction {
    /// Whether executing this instruction updates the condition codes
    #[must_use]
    pub const fn sets_condition_codes(&self) -> bool {
        matches!(
            self,
            Self::AddReg { .. }
                | Self::AddImm { .. }
                | Self::AndReg { .. }
                | Self::AndImm { .. }
                | Self::XorReg { .. }
                | Self::XorImm { .. }
                | Self::Not { .. }
                | Self::LoadByte { .. }
                | Self::LoadWord { .. }
                | Self::LoadIndirect { .. }
                | Self::LeaEffectiveAddr { .. }
                | Self::ShiftLeft { .. }
                | Self::ShiftRightLogical { .. }
                | Self::ShiftRightArithmetic { .. }
        )
    }
}

/// Name of the service routine behind a trap vector, if it is a known one
#[must_use]
pub const fn trap_alias(vector: u8) -> Option<&'static str> {
    match vector {
        C::TRAP_GETC => Some("GETC"),
        C::TRAP_OUT => Some("OUT"),
        C::TRAP_PUTS => Some("PUTS"),
        C::TRAP_IN => Some("IN"),
        C::TRAP_PUTSP => Some("PUTSP"),
        C::TRAP_HALT => Some("HALT"),
        _ => None,
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match *self {
            AddReg { dr, sr1, sr2 } => write!(f, "ADD {dr}, {sr1}, {sr2}"),
            AddImm { dr, sr1, imm5 } => write!(f, "ADD {dr}, {sr1}, #{imm5}"),
            AndReg { dr, sr1, sr2 } => write!(f, "AND {dr}, {sr1}, {sr2}"),
            AndImm { dr, sr1, imm5 } => write!(f, "AND {dr}, {sr1}, #{imm5}"),
            XorReg { dr, sr1, sr2 } => write!(f, "XOR {dr}, {sr1}, {sr2}"),
            XorImm { dr, sr1, imm5 } => write!(f, "XOR {dr}, {sr1}, #{imm5}"),
            Not { dr, sr } => write!(f, "NOT {dr}, {sr}"),
            Branch { condition, offset9: 0 } if condition.is_empty() => write!(f, "NOP"),
            // No mnemonic keeps the offset of a never-taken branch
            #[allow(clippy::cast_sign_loss)]
            Branch { condition, offset9 } if condition.is_empty() => {
                write!(f, ".FILL x{:04X}", offset9 as u16 & 0x01FF)
            }
            Branch { condition, offset9 } => write!(f, "BR{condition} #{offset9}"),
            Jmp { base } => write!(f, "JMP {base}"),
            Jsr { offset11 } => write!(f, "JSR #{offset11}"),
            Jsrr { base } => write!(f, "JSRR {base}"),
            Ret => write!(f, "RET"),
            LoadByte { dr, base, offset6 } => write!(f, "LDB {dr}, {base}, #{offset6}"),
            LoadWord { dr, base, offset6 } => write!(f, "LDW {dr}, {base}, #{offset6}"),
            LoadIndirect { dr, base, offset6 } => write!(f, "LDI {dr}, {base}, #{offset6}"),
            LeaEffectiveAddr { dr, offset9 } => write!(f, "LEA {dr}, #{offset9}"),
            StoreByte { sr, base, offset6 } => write!(f, "STB {sr}, {base}, #{offset6}"),
            StoreWord { sr, base, offset6 } => write!(f, "STW {sr}, {base}, #{offset6}"),
            StoreIndirect { sr, base, offset6 } => write!(f, "STI {sr}, {base}, #{offset6}"),
            ShiftLeft { dr, sr, amount4 } => write!(f, "LSHF {dr}, {sr}, #{amount4}"),
            ShiftRightLogical { dr, sr, amount4 } => write!(f, "RSHFL {dr}, {sr}, #{amount4}"),
            ShiftRightArithmetic { dr, sr, amount4 } => {
                write!(f, "RSHFA {dr}, {sr}, #{amount4}")
            }
            ReturnFromInterrupt => write!(f, "RTI"),
            Trap { vector } => match trap_alias(vector) {
                Some(alias) => write!(f, "{alias}"),
                None => write!(f, "TRAP x{vector:02X}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn condition_from_value_test() {
        assert_eq!(Condition::from_value(-42), Condition::N);
        assert_eq!(Condition::from_value(0), Condition::Z);
        assert_eq!(Condition::from_value(i16::MAX), Condition::P);
    }

    #[test]
    fn condition_display_test() {
        assert_eq!(Condition::all().to_string(), "nzp");
        assert_eq!((Condition::Z | Condition::P).to_string(), "zp");
        assert_eq!(Condition::empty().to_string(), "");
    }

    #[test]
    fn display_test() {
        let program = [
            Instruction::AddImm {
                dr: Reg::R1,
                sr1: Reg::R2,
                imm5: -3,
            },
            Instruction::Branch {
                condition: Condition::N | Condition::P,
                offset9: -2,
            },
            Instruction::Branch {
                condition: Condition::empty(),
                offset9: 0,
            },
            Instruction::Branch {
                condition: Condition::empty(),
                offset9: 5,
            },
            Instruction::Branch {
                condition: Condition::empty(),
                offset9: -1,
            },
            Instruction::LoadByte {
                dr: Reg::R4,
                base: Reg::R2,
                offset6: 10,
            },
            Instruction::ShiftRightArithmetic {
                dr: Reg::R2,
                sr: Reg::R3,
                amount4: 7,
            },
            Instruction::Trap { vector: 0x25 },
            Instruction::Trap { vector: 0x30 },
        ];

        let listing: Vec<String> = program.iter().map(ToString::to_string).collect();
        assert_snapshot!(listing.join("\n"), @r"
        ADD R1, R2, #-3
        BRnp #-2
        NOP
        .FILL x0005
        .FILL x01FF
        LDB R4, R2, #10
        RSHFA R2, R3, #7
        HALT
        TRAP x30
        ");

        let never_taken = Instruction::decode(0x0005).unwrap();
        assert_eq!(never_taken.to_string(), ".FILL x0005");
        assert_eq!(Instruction::decode(0x0000).unwrap().to_string(), "NOP");
    }

    #[test]
    fn sets_condition_codes_test() {
        assert!(Instruction::LeaEffectiveAddr {
            dr: Reg::R0,
            offset9: 0
        }
        .sets_condition_codes());
        assert!(!Instruction::StoreWord {
            sr: Reg::R0,
            base: Reg::R1,
            offset6: 0
        }
        .sets_condition_codes());
        assert!(!Instruction::Trap { vector: 0x25 }.sets_condition_codes());
    }
}
