use crate::constants as C;
use crate::isa::{Condition, Reg};

/// Architectural registers of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    /// General purpose registers, `R0` to `R7`
    pub(crate) gpr: [i16; 8],

    /// Program counter
    pub pc: C::Address,

    /// Condition codes, exactly one of N, Z or P once set
    pub cc: Condition,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            gpr: [0; 8],
            pc: C::PROGRAM_START,
            // The machine starts as if the last value written was zero
            cc: Condition::Z,
        }
    }
}

impl Registers {
    #[must_use]
    pub fn get(&self, reg: Reg) -> i16 {
        self.gpr[reg.index()]
    }

    /// Value of a register, as an unsigned word or address
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn get_word(&self, reg: Reg) -> C::Word {
        self.get(reg) as C::Word
    }

    pub fn set(&mut self, reg: Reg, value: i16) {
        self.gpr[reg.index()] = value;
    }

    /// Set a register and update the condition codes from its new value
    pub(crate) fn set_with_cc(&mut self, reg: Reg, value: i16) {
        self.set(reg, value);
        self.cc = Condition::from_value(value);
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for reg in Reg::ALL {
            write!(f, "{reg} = x{:04X} | ", self.get_word(reg))?;
        }

        write!(f, "PC = x{:04X} | CC = {}", self.pc, self.cc)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_test() {
        let registers = Registers::default();
        assert!(Reg::ALL.iter().all(|&reg| registers.get(reg) == 0));
        assert_eq!(registers.cc, Condition::Z);
    }

    #[test]
    fn set_with_cc_test() {
        let mut registers = Registers::default();

        registers.set_with_cc(Reg::R3, -5);
        assert_eq!(registers.get(Reg::R3), -5);
        assert_eq!(registers.get_word(Reg::R3), 0xFFFB);
        assert_eq!(registers.cc, Condition::N);

        registers.set_with_cc(Reg::R3, 7);
        assert_eq!(registers.cc, Condition::P);

        // Plain writes leave the condition codes alone
        registers.set(Reg::R3, 0);
        assert_eq!(registers.cc, Condition::P);
    }

    #[test]
    fn display_test() {
        let mut registers = Registers::default();
        registers.set(Reg::R1, -1);
        registers.pc = 0x3002;
        assert_eq!(
            registers.to_string(),
            "R0 = x0000 | R1 = xFFFF | R2 = x0000 | R3 = x0000 | R4 = x0000 | R5 = x0000 \
             | R6 = x0000 | R7 = x0000 | PC = x3002 | CC = z"
        );
    }
}
