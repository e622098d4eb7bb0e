pub type Address = u16;
pub type Word = u16;

/// Total size of the computer memory, in bytes
pub const MEMORY_SIZE: usize = 0x1_0000;

/// Size of a word, in bytes
pub const WORD_SIZE: Address = 2;

/// Default place to store the beginning of the program
pub const PROGRAM_START: Address = 0x3000;

/// Read a character from the console into `R0`
pub const TRAP_GETC: u8 = 0x20;

/// Write the character in `R0` to the console
pub const TRAP_OUT: u8 = 0x21;

/// Write the string pointed by `R0`, one character per word
pub const TRAP_PUTS: u8 = 0x22;

/// Read a character from the console into `R0`, with echo
pub const TRAP_IN: u8 = 0x23;

/// Write the string pointed by `R0`, two characters per word
pub const TRAP_PUTSP: u8 = 0x24;

/// Stop the machine
pub const TRAP_HALT: u8 = 0x25;
