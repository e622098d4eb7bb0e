use tracing::debug;

use super::{offset_address, Computer, Registers, Result};
use crate::constants::{self as C, Address, Word};
use crate::isa::{Condition, Instruction, Reg};

/// Address of a PC-relative target, the offset being in words
fn pc_relative(registers: &Registers, offset: i16) -> Result<Address> {
    offset_address(registers.pc, i32::from(offset) * i32::from(C::WORD_SIZE))
}

/// Address of a base register plus a byte offset
fn base_byte_offset(registers: &Registers, base: Reg, offset: i16) -> Result<Address> {
    offset_address(registers.get_word(base), offset.into())
}

/// Address of a base register plus a word offset
fn base_offset(registers: &Registers, base: Reg, offset: i16) -> Result<Address> {
    offset_address(
        registers.get_word(base),
        i32::from(offset) * i32::from(C::WORD_SIZE),
    )
}

#[allow(clippy::cast_possible_wrap)]
const fn signed(word: Word) -> i16 {
    word as i16
}

impl Computer {
    /// Execute a decoded instruction against a copy of the registers
    ///
    /// The program counter in `registers` was already incremented. Memory is
    /// only written once nothing else can fail. Returns the register written,
    /// if any.
    #[tracing::instrument(skip(self, registers), level = "trace")]
    pub(super) fn execute(
        &mut self,
        instruction: Instruction,
        registers: &mut Registers,
    ) -> Result<Option<Reg>> {
        use Instruction::*;

        let modified = match instruction {
            AddReg { dr, sr1, sr2 } => {
                let value = registers.get(sr1).wrapping_add(registers.get(sr2));
                registers.set_with_cc(dr, value);
                Some(dr)
            }

            AddImm { dr, sr1, imm5 } => {
                registers.set_with_cc(dr, registers.get(sr1).wrapping_add(imm5));
                Some(dr)
            }

            AndReg { dr, sr1, sr2 } => {
                registers.set_with_cc(dr, registers.get(sr1) & registers.get(sr2));
                Some(dr)
            }

            AndImm { dr, sr1, imm5 } => {
                registers.set_with_cc(dr, registers.get(sr1) & imm5);
                Some(dr)
            }

            XorReg { dr, sr1, sr2 } => {
                registers.set_with_cc(dr, registers.get(sr1) ^ registers.get(sr2));
                Some(dr)
            }

            XorImm { dr, sr1, imm5 } => {
                registers.set_with_cc(dr, registers.get(sr1) ^ imm5);
                Some(dr)
            }

            Not { dr, sr } => {
                registers.set_with_cc(dr, !registers.get(sr));
                Some(dr)
            }

            Branch { condition, offset9 } => {
                if condition.intersects(registers.cc) {
                    let target = pc_relative(registers, offset9)?;
                    debug!(target, "Branch taken");
                    registers.pc = target;
                }
                None
            }

            Jmp { base } => {
                registers.pc = registers.get_word(base);
                None
            }

            Ret => {
                registers.pc = registers.get_word(Reg::R7);
                None
            }

            Jsr { offset11 } => {
                let target = pc_relative(registers, offset11)?;
                registers.set(Reg::R7, signed(registers.pc));
                registers.pc = target;
                Some(Reg::R7)
            }

            Jsrr { base } => {
                // Read the base first, it may be R7
                let target = registers.get_word(base);
                registers.set(Reg::R7, signed(registers.pc));
                registers.pc = target;
                Some(Reg::R7)
            }

            LoadByte { dr, base, offset6 } => {
                let address = base_byte_offset(registers, base, offset6)?;
                let byte = self.memory.read_byte(address);
                registers.set_with_cc(dr, i16::from(i8::from_le_bytes([byte])));
                Some(dr)
            }

            LoadWord { dr, base, offset6 } => {
                let address = base_offset(registers, base, offset6)?;
                let word = self.memory.read_word(address)?;
                registers.set_with_cc(dr, signed(word));
                Some(dr)
            }

            LoadIndirect { dr, base, offset6 } => {
                let pointer = base_offset(registers, base, offset6)?;
                let address = self.memory.read_word(pointer)?;
                let word = self.memory.read_word(address)?;
                registers.set_with_cc(dr, signed(word));
                Some(dr)
            }

            LeaEffectiveAddr { dr, offset9 } => {
                let address = pc_relative(registers, offset9)?;
                registers.set_with_cc(dr, signed(address));
                Some(dr)
            }

            StoreByte { sr, base, offset6 } => {
                let address = base_byte_offset(registers, base, offset6)?;
                let [low, _] = registers.get_word(sr).to_le_bytes();
                self.memory.write_byte(address, low);
                None
            }

            StoreWord { sr, base, offset6 } => {
                let address = base_offset(registers, base, offset6)?;
                self.memory.write_word(address, registers.get_word(sr))?;
                None
            }

            StoreIndirect { sr, base, offset6 } => {
                let pointer = base_offset(registers, base, offset6)?;
                let address = self.memory.read_word(pointer)?;
                self.memory.write_word(address, registers.get_word(sr))?;
                None
            }

            ShiftLeft { dr, sr, amount4 } => {
                let value = registers.get_word(sr) << amount4;
                registers.set_with_cc(dr, signed(value));
                Some(dr)
            }

            ShiftRightLogical { dr, sr, amount4 } => {
                let value = registers.get_word(sr) >> amount4;
                registers.set_with_cc(dr, signed(value));
                Some(dr)
            }

            ShiftRightArithmetic { dr, sr, amount4 } => {
                registers.set_with_cc(dr, registers.get(sr) >> amount4);
                Some(dr)
            }

            // No supervisor stack is ever set up, so this only pops what the
            // program itself pushed
            ReturnFromInterrupt => {
                let sp = registers.get_word(Reg::R6);
                let pc = self.memory.read_word(sp)?;
                let sp = offset_address(sp, C::WORD_SIZE.into())?;
                let psr = self.memory.read_word(sp)?;
                let sp = offset_address(sp, C::WORD_SIZE.into())?;

                #[allow(clippy::cast_possible_truncation)]
                let cc = Condition::from_bits_truncate(psr as u8);
                registers.pc = pc;
                registers.cc = cc;
                registers.set(Reg::R6, signed(sp));
                Some(Reg::R6)
            }

            Trap { vector } => self.trap(vector, registers)?,
        };

        Ok(modified)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::runtime::ExecutionError;

    fn run(source: &str) -> Computer {
        let mut computer = Computer::load_assembly(source).unwrap();
        computer.run(1000).unwrap();
        assert!(computer.is_halted());
        computer
    }

    #[test]
    fn arithmetic_test() {
        let computer = run(indoc! {"
            .ORIG x3000
            ADD R1, R1, #15
            ADD R2, R1, #-16
            AND R3, R1, #6
            XOR R4, R1, R2
            NOT R5, R1
            ADD R6, R1, R5
            HALT
            .END
        "});

        assert_eq!(computer.register(Reg::R1), 15);
        assert_eq!(computer.register(Reg::R2), -1);
        assert_eq!(computer.register(Reg::R3), 6);
        assert_eq!(computer.register(Reg::R4), !15);
        assert_eq!(computer.register(Reg::R5), -16);
        assert_eq!(computer.register(Reg::R6), -1);
        assert!(computer.condition_n());
    }

    #[test]
    fn add_wraps_test() {
        let mut computer = Computer::load_assembly("ADD R1, R1, #1\nHALT").unwrap();
        computer.set_register(Reg::R1, i16::MAX);
        computer.step().unwrap();
        assert_eq!(computer.register(Reg::R1), i16::MIN);
        assert!(computer.condition_n());
    }

    #[test]
    fn condition_codes_are_exclusive_test() {
        let mut computer = Computer::load_assembly(indoc! {"
            ADD R0, R0, #-3
            ADD R0, R0, #3
            ADD R0, R0, #3
            LSHF R1, R0, #15
            RSHFL R2, R1, #15
            RSHFA R3, R1, #15
            LEA R4, DATA
            LDW R5, R4, #0
            LDB R6, R4, #1
            HALT
            DATA .FILL x80FF
        "})
        .unwrap();

        let mut signs = Vec::new();
        while !computer.is_halted() {
            computer.step().unwrap();
            let set = [
                computer.condition_n(),
                computer.condition_z(),
                computer.condition_p(),
            ];
            assert_eq!(set.iter().filter(|&&flag| flag).count(), 1);
            if let Some(reg) = computer.last_modified_register() {
                if reg != Reg::R7 {
                    assert_eq!(computer.condition(), Condition::from_value(computer.register(reg)));
                    signs.push(computer.condition());
                }
            }
        }

        assert_eq!(
            signs,
            vec![
                Condition::N,
                Condition::Z,
                Condition::P,
                Condition::N,
                Condition::P,
                Condition::N,
                Condition::P,
                Condition::N,
                Condition::N,
            ]
        );
        assert_eq!(computer.register(Reg::R1), i16::MIN);
        assert_eq!(computer.register(Reg::R2), 1);
        assert_eq!(computer.register(Reg::R3), -1);
        assert_eq!(computer.register(Reg::R4), 0x3014);
        assert_eq!(computer.register(Reg::R5), signed(0x80FF));
        assert_eq!(computer.register(Reg::R6), -128);
    }

    #[test]
    fn loads_and_stores_test() {
        let computer = run(indoc! {"
            .ORIG x3000
                    LEA R0, DATA
                    LDW R1, R0, #0
                    STB R1, R0, #5
                    STW R1, R0, #3
                    LDI R2, R0, #1
                    LDB R3, R0, #1
                    STI R3, R0, #1
                    HALT
            DATA    .FILL x1234
            PTR     .FILL DATA
            SLOT    .BLKW 4
            .END
        "});

        assert_eq!(computer.register(Reg::R1), 0x1234);
        assert_eq!(computer.register(Reg::R2), 0x1234);
        assert_eq!(computer.register(Reg::R3), 0x12);
        assert_eq!(computer.read_byte(0x3015), 0x34);
        assert_eq!(computer.read_memory(0x3016), 0x1234);
        assert_eq!(computer.read_memory(0x3010), 0x0012);
        assert!(computer.condition_p());
    }

    #[test]
    fn stores_do_not_set_condition_codes_test() {
        let mut computer =
            Computer::load_assembly("ADD R1, R1, #-1\nLEA R2, #8\nAND R3, R3, #0\nSTW R1, R2, #0")
                .unwrap();
        computer.run(4).unwrap();
        assert!(computer.condition_z());
        assert_eq!(computer.read_memory(0x3014), 0xFFFF);
        assert_eq!(computer.last_modified_register(), None);
    }

    #[test]
    fn only_cc_instructions_change_condition_test() {
        let mut computer = Computer::load_assembly(indoc! {"
                    ADD R1, R1, #-1
                    LEA R2, DATA
                    ADD R1, R1, #0
                    STW R1, R2, #0
                    BRn NEXT
            NEXT    JSR SUB
                    HALT
            SUB     RET
            DATA    .FILL x0000
        "})
        .unwrap();

        let mut setters = Vec::new();
        while !computer.is_halted() {
            let instruction = computer.current_instruction().unwrap();
            let before = computer.condition();
            computer.step().unwrap();
            if instruction.sets_condition_codes() {
                setters.push(computer.condition());
            } else {
                assert_eq!(computer.condition(), before, "{instruction} changed CC");
            }
        }

        assert_eq!(setters, [Condition::N, Condition::P, Condition::N]);
        assert_eq!(computer.read_memory(0x3010), 0xFFFF);
    }

    #[test]
    fn subroutine_test() {
        let computer = run(indoc! {"
            .ORIG x3000
                    JSR DOUBLE
                    LEA R3, DOUBLE
                    JSRR R3
                    HALT
            DOUBLE  ADD R1, R1, R1
                    ADD R1, R1, #1
                    RET
            .END
        "});

        assert_eq!(computer.register(Reg::R1), 3);
        assert_eq!(computer.register(Reg::R7), 0x3008);
    }

    #[test]
    fn jmp_test() {
        let mut computer = Computer::load_assembly("LEA R2, #3\nJMP R2").unwrap();
        computer.step().unwrap();
        computer.step().unwrap();
        assert_eq!(computer.program_counter(), 0x3008);

        // RET goes wherever R7 points
        let mut computer = Computer::load_assembly("RET").unwrap();
        computer.set_register(Reg::R7, -2);
        computer.step().unwrap();
        assert_eq!(computer.program_counter(), 0xFFFE);
    }

    #[test]
    fn rti_test() {
        let mut computer = Computer::load_assembly(indoc! {"
            LEA R6, FRAME
            RTI
            HALT
            FRAME   .FILL x4000
                    .FILL x0004
        "})
        .unwrap();
        computer.run(2).unwrap();

        assert_eq!(computer.program_counter(), 0x4000);
        assert_eq!(computer.register(Reg::R6), 0x300A);
        assert!(computer.condition_n());
        assert_eq!(computer.last_modified_register(), Some(Reg::R6));
    }

    #[test]
    fn out_of_range_rolls_back_test() {
        let mut computer = Computer::load_assembly("ADD R1, R1, #5\nLDW R0, R2, #-1").unwrap();
        computer.step().unwrap();
        let before = computer.clone();

        assert_eq!(
            computer.step(),
            Err(ExecutionError::AddressOutOfRange(-2))
        );
        assert_eq!(computer.registers(), before.registers());
        assert_eq!(computer.last_modified_register(), Some(Reg::R1));
        assert_eq!(computer.steps(), 1);

        // The second byte of the word is out of memory
        let mut computer = Computer::load_assembly("LDW R0, R2, #0").unwrap();
        computer.set_register(Reg::R2, -1);
        assert_eq!(
            computer.step(),
            Err(ExecutionError::AddressOutOfRange(0x1_0000))
        );
        assert_eq!(computer.program_counter(), 0x3000);
    }

    #[test]
    fn branch_out_of_range_test() {
        let mut computer = Computer::new();
        // BRnzp #-4 at address 0
        computer.load_program(&[0x0FFC], 0).unwrap();
        assert_eq!(computer.step(), Err(ExecutionError::AddressOutOfRange(-6)));
        assert_eq!(computer.program_counter(), 0);
    }
}
