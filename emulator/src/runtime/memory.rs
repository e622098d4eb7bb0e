use thiserror::Error;

use crate::constants::{Address, Word, MEMORY_SIZE};

/// Represents errors related to memory manipulations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The access reaches past the end of memory
    #[error("address {0:#x} is out of range")]
    OutOfRange(i32),
}

/// Holds the memory of the computer, one byte per address
///
/// Words are little-endian: the low byte lives at the lower address. Word
/// accesses need not be aligned, but both bytes must be in range.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Box<[u8]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            bytes: vec![0; MEMORY_SIZE].into_boxed_slice(),
        }
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.bytes.iter().filter(|&&b| b != 0).count();
        write!(f, "Memory {{ non_zero_bytes: {used}, .. }}")
    }
}

impl Memory {
    #[must_use]
    pub fn read_byte(&self, address: Address) -> u8 {
        self.bytes[usize::from(address)]
    }

    pub fn write_byte(&mut self, address: Address, value: u8) {
        self.bytes[usize::from(address)] = value;
    }

    /// Index of the low byte of the word at an address
    fn word_index(address: Address) -> Result<usize, MemoryError> {
        let index = usize::from(address);
        if index + 1 < MEMORY_SIZE {
            Ok(index)
        } else {
            Err(MemoryError::OutOfRange(i32::from(address) + 1))
        }
    }

    /// Read a word
    ///
    /// # Errors
    ///
    /// Fails on the last address, whose high byte would be out of memory
    pub fn read_word(&self, address: Address) -> Result<Word, MemoryError> {
        let index = Self::word_index(address)?;
        Ok(Word::from_le_bytes([self.bytes[index], self.bytes[index + 1]]))
    }

    /// Write a word
    ///
    /// # Errors
    ///
    /// Fails on the last address, whose high byte would be out of memory.
    /// Nothing is written then.
    pub fn write_word(&mut self, address: Address, value: Word) -> Result<(), MemoryError> {
        let index = Self::word_index(address)?;
        self.bytes[index..index + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Copy a sequence of words, starting at an address
    ///
    /// # Errors
    ///
    /// Fails if the words do not fit, in which case nothing is written
    pub fn load(&mut self, base: Address, words: &[Word]) -> Result<(), MemoryError> {
        let start = usize::from(base);
        let end = words.len().saturating_mul(2).saturating_add(start);
        if end > MEMORY_SIZE {
            return Err(MemoryError::OutOfRange(
                i32::try_from(end - 1).unwrap_or(i32::MAX),
            ));
        }

        for (chunk, word) in self.bytes[start..end].chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }

        Ok(())
    }
}
