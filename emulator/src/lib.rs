//! An LC-3b toolchain: instruction set model, assembler and emulator

pub mod assembler;
pub mod constants;
pub mod isa;
pub mod parser;
pub mod runtime;

pub use self::assembler::{assemble, assemble_with, AssemblyError, Program};
pub use self::runtime::{Computer, ExecutionError};
