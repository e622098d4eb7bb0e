//! Trap service routines
//!
//! There is no operating system image in memory: the routines run natively,
//! as part of the `TRAP` instruction.

use tracing::{debug, info, warn};

use super::{offset_address, Computer, ExecutionError, Registers, Result};
use crate::constants::{self as C, Address};
use crate::isa::{trap_alias, Reg};

impl Computer {
    /// Read a zero-terminated string from memory
    ///
    /// With `packed`, each word holds two characters, low byte first.
    fn read_string(&self, start: Address, packed: bool) -> Result<String> {
        let mut text = String::new();
        let mut address = start;

        loop {
            let word = self.memory.read_word(address)?;
            if word == 0 {
                return Ok(text);
            }

            let [low, high] = word.to_le_bytes();
            if packed && low == 0 {
                return Ok(text);
            }
            text.push(char::from(low));
            if packed {
                if high == 0 {
                    return Ok(text);
                }
                text.push(char::from(high));
            }

            address = offset_address(address, C::WORD_SIZE.into())?;
        }
    }

    /// Pop a character from the input queue into `R0`
    fn read_input(&mut self, registers: &mut Registers, echo: bool) -> Option<Reg> {
        let Some(byte) = self.input.pop_front() else {
            warn!("No input available, R0 left unchanged");
            return None;
        };

        registers.set(Reg::R0, byte.into());
        if echo {
            self.console_output.push(char::from(byte));
        }
        Some(Reg::R0)
    }

    /// Run a trap service routine, returning the register written
    pub(super) fn trap(&mut self, vector: u8, registers: &mut Registers) -> Result<Option<Reg>> {
        let name = trap_alias(vector).ok_or(ExecutionError::UnknownTrapVector(vector))?;
        debug!(vector, name, "Trap");

        // Read strings first: it is the only part that can fail
        let text = match vector {
            C::TRAP_PUTS => Some(self.read_string(registers.get_word(Reg::R0), false)?),
            C::TRAP_PUTSP => Some(self.read_string(registers.get_word(Reg::R0), true)?),
            _ => None,
        };

        #[allow(clippy::cast_possible_wrap)]
        let return_address = registers.pc as i16;
        registers.set(Reg::R7, return_address);

        let modified = match vector {
            C::TRAP_GETC => self.read_input(registers, false),
            C::TRAP_IN => self.read_input(registers, true),

            C::TRAP_OUT => {
                let [low, _] = registers.get_word(Reg::R0).to_le_bytes();
                self.console_output.push(char::from(low));
                None
            }

            C::TRAP_HALT => {
                info!("HALT");
                self.halted = true;
                None
            }

            _ => None,
        };

        if let Some(text) = text {
            self.console_output.push_str(&text);
        }

        Ok(modified.or(Some(Reg::R7)))
    }
}
