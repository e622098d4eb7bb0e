use parse_display::Display;
use thiserror::Error;

/// One of the eight general purpose registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(style = "UPPERCASE")]
pub enum Reg {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
}

impl Reg {
    pub const ALL: [Reg; 8] = [
        Reg::R0,
        Reg::R1,
        Reg::R2,
        Reg::R3,
        Reg::R4,
        Reg::R5,
        Reg::R6,
        Reg::R7,
    ];

    /// Index of the register in the register file, from 0 to 7
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Get a register from its index
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Extract a register from a 3-bit field of an instruction word
    pub(crate) const fn from_field(word: u16, shift: u32) -> Self {
        match (word >> shift) & 0b111 {
            0 => Reg::R0,
            1 => Reg::R1,
            2 => Reg::R2,
            3 => Reg::R3,
            4 => Reg::R4,
            5 => Reg::R5,
            6 => Reg::R6,
            _ => Reg::R7,
        }
    }

    /// Place the register in a 3-bit field of an instruction word
    pub(crate) const fn to_field(self, shift: u32) -> u16 {
        (self as u16) << shift
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("could not parse register")]
pub struct RegisterParseError;

impl std::str::FromStr for Reg {
    type Err = RegisterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "r0" => Ok(Reg::R0),
            "r1" => Ok(Reg::R1),
            "r2" => Ok(Reg::R2),
            "r3" => Ok(Reg::R3),
            "r4" => Ok(Reg::R4),
            "r5" => Ok(Reg::R5),
            "r6" => Ok(Reg::R6),
            "r7" => Ok(Reg::R7),
            _ => Err(RegisterParseError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_register_test() {
        assert_eq!("R3".parse::<Reg>(), Ok(Reg::R3));
        assert_eq!("r7".parse::<Reg>(), Ok(Reg::R7));
        assert_eq!("R8".parse::<Reg>(), Err(RegisterParseError));
        assert_eq!("%a".parse::<Reg>(), Err(RegisterParseError));
    }

    #[test]
    fn display_register_test() {
        assert_eq!(Reg::R0.to_string(), "R0");
        assert_eq!(Reg::R6.to_string(), "R6");
    }

    #[test]
    fn field_test() {
        assert_eq!(Reg::from_field(0b1110_0000_0000, 9), Reg::R7);
        assert_eq!(Reg::R5.to_field(6), 0b101_000_000);
        assert_eq!(Reg::from_index(4), Some(Reg::R4));
        assert_eq!(Reg::from_index(8), None);
    }
}
