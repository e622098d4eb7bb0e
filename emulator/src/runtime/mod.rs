//! The execution engine
//!
//! A [`Computer`] owns the whole machine state and executes one instruction
//! per call to [`Computer::step`]. Nothing runs in the background: hosts drive
//! the machine, and decide how many steps a program may take.
//!
//! Addresses never wrap. An effective address outside of memory, a word access
//! on the last byte, or a program counter running past the end of memory fail
//! the step with [`ExecutionError::AddressOutOfRange`]. A failed step leaves
//! the machine exactly as it was before.

use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, info};

use crate::assembler::{assemble, AssemblyError, Program};
use crate::constants::{self as C, Address, Word};
use crate::isa::{Condition, DecodeError, Instruction, Reg};

mod instructions;
mod memory;
mod registers;
mod traps;

pub use self::memory::{Memory, MemoryError};
pub use self::registers::Registers;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("could not decode instruction at {address:#06x}")]
    Decode {
        address: Address,
        #[source]
        source: DecodeError,
    },

    #[error("address {0:#x} is out of range")]
    AddressOutOfRange(i32),

    #[error("the machine is halted")]
    StepAfterHalt,

    #[error("unknown trap vector {0:#04x}")]
    UnknownTrapVector(u8),
}

impl From<MemoryError> for ExecutionError {
    fn from(error: MemoryError) -> Self {
        match error {
            MemoryError::OutOfRange(address) => Self::AddressOutOfRange(address),
        }
    }
}

type Result<T> = std::result::Result<T, ExecutionError>;

/// Add a byte offset to an address, failing if it leaves memory
fn offset_address(base: Address, offset: i32) -> Result<Address> {
    let address = i32::from(base) + offset;
    Address::try_from(address).map_err(|_| ExecutionError::AddressOutOfRange(address))
}

#[derive(Debug, Clone, Default)]
pub struct Computer {
    registers: Registers,
    memory: Memory,
    halted: bool,
    console_output: String,
    input: VecDeque<u8>,
    last_modified_register: Option<Reg>,
    steps: usize,
}

impl Computer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a program and load it in a fresh computer
    ///
    /// # Errors
    ///
    /// Returns the first assembly error of the source
    pub fn load_assembly(source: &str) -> std::result::Result<Self, AssemblyError> {
        let program = assemble(source)?;
        let mut computer = Self::new();
        computer.load(&program);
        Ok(computer)
    }

    /// Load an assembled program, resetting the machine
    pub fn load(&mut self, program: &Program) {
        // The assembler only produces programs that fit in memory
        let fits = self.load_program(program.words(), program.origin());
        debug_assert!(fits.is_ok(), "assembled program does not fit in memory");
    }

    /// Reset the machine and copy words in memory, starting at `base`
    ///
    /// Registers are cleared, condition codes are set to Z and the program
    /// counter points to `base`. Memory, console output and pending input are
    /// cleared as well.
    ///
    /// # Errors
    ///
    /// Fails if the words do not fit in memory, leaving the machine untouched
    pub fn load_program(&mut self, words: &[Word], base: Address) -> Result<()> {
        let mut memory = Memory::default();
        memory.load(base, words)?;

        *self = Self {
            registers: Registers {
                pc: base,
                ..Registers::default()
            },
            memory,
            ..Self::default()
        };

        debug!(base, words = words.len(), "Loaded program");
        Ok(())
    }

    #[must_use]
    pub fn program_counter(&self) -> Address {
        self.registers.pc
    }

    pub fn set_program_counter(&mut self, address: Address) {
        self.registers.pc = address;
    }

    #[must_use]
    pub fn register(&self, reg: Reg) -> i16 {
        self.registers.get(reg)
    }

    /// Overwrite a register, leaving the condition codes alone
    pub fn set_register(&mut self, reg: Reg, value: i16) {
        self.registers.set(reg, value);
    }

    #[must_use]
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    #[must_use]
    pub fn condition(&self) -> Condition {
        self.registers.cc
    }

    #[must_use]
    pub fn condition_n(&self) -> bool {
        self.registers.cc.contains(Condition::N)
    }

    #[must_use]
    pub fn condition_z(&self) -> bool {
        self.registers.cc.contains(Condition::Z)
    }

    #[must_use]
    pub fn condition_p(&self) -> bool {
        self.registers.cc.contains(Condition::P)
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Everything written to the console so far
    #[must_use]
    pub fn console_output(&self) -> &str {
        &self.console_output
    }

    /// Queue characters for the `GETC` and `IN` traps
    pub fn push_input(&mut self, input: &str) {
        self.input.extend(input.bytes());
    }

    /// The register written by the last instruction, if any
    #[must_use]
    pub fn last_modified_register(&self) -> Option<Reg> {
        self.last_modified_register
    }

    /// Number of instructions executed since the program was loaded
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Read the word at an address, for inspection
    ///
    /// On the last address, the missing high byte reads as zero.
    #[must_use]
    pub fn read_memory(&self, address: Address) -> Word {
        self.memory
            .read_word(address)
            .unwrap_or_else(|_| Word::from(self.memory.read_byte(address)))
    }

    #[must_use]
    pub fn read_byte(&self, address: Address) -> u8 {
        self.memory.read_byte(address)
    }

    /// Write a word in memory
    ///
    /// # Errors
    ///
    /// Fails on the last address, whose high byte would be out of memory
    pub fn write_word(&mut self, address: Address, value: Word) -> Result<()> {
        self.memory.write_word(address, value)?;
        Ok(())
    }

    pub fn write_byte(&mut self, address: Address, value: u8) {
        self.memory.write_byte(address, value);
    }

    /// Decode the instruction the program counter points to
    ///
    /// # Errors
    ///
    /// Fails if the word can't be read or does not encode an instruction
    pub fn current_instruction(&self) -> Result<Instruction> {
        let address = self.registers.pc;
        let word = self.memory.read_word(address)?;
        Instruction::decode(word).map_err(|source| ExecutionError::Decode { address, source })
    }

    /// Execute the next instruction
    ///
    /// This is an alias of [`Computer::step`].
    ///
    /// # Errors
    ///
    /// See [`Computer::step`]
    pub fn next_instruction(&mut self) -> Result<()> {
        self.step()
    }

    /// Fetch, decode and execute one instruction
    ///
    /// # Errors
    ///
    /// Fails if the machine is halted, if the instruction can't be decoded,
    /// or if it accesses memory out of range. The machine is left untouched.
    #[tracing::instrument(skip(self), fields(pc = self.registers.pc), level = "debug")]
    pub fn step(&mut self) -> Result<()> {
        if self.halted {
            return Err(ExecutionError::StepAfterHalt);
        }

        let instruction = self.current_instruction()?;

        // Execute on a copy of the registers, committed only on success.
        // Memory is written last by the instructions that write to it, so a
        // failure never leaves a partial write behind.
        let mut registers = self.registers;
        registers.pc = offset_address(registers.pc, C::WORD_SIZE.into())?;

        let output = self.console_output.len();
        let input = self.input.len();
        debug!(%instruction, "Executing instruction");

        match self.execute(instruction, &mut registers) {
            Ok(modified) => {
                if instruction.sets_condition_codes() {
                    debug_assert_eq!(
                        registers.cc.bits().count_ones(),
                        1,
                        "exactly one of N, Z, P"
                    );
                } else if instruction != Instruction::ReturnFromInterrupt {
                    debug_assert_eq!(registers.cc, self.registers.cc, "{instruction} changed CC");
                }

                self.registers = registers;
                self.last_modified_register = modified;
                self.steps += 1;
                if self.halted {
                    info!(steps = self.steps, "Machine halted");
                }
                Ok(())
            }

            Err(error) => {
                debug_assert_eq!(self.input.len(), input, "input consumed by a failed step");
                self.console_output.truncate(output);
                Err(error)
            }
        }
    }

    /// Step until the machine halts, or `limit` instructions were executed
    ///
    /// Returns the number of instructions executed.
    ///
    /// # Errors
    ///
    /// Stops at the first failed step
    #[tracing::instrument(skip(self))]
    pub fn run(&mut self, limit: usize) -> Result<usize> {
        let mut count = 0;
        while !self.halted && count < limit {
            self.step()?;
            count += 1;
        }

        Ok(count)
    }
}
