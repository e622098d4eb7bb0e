use std::fmt::Write;

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueHint};
use lc3b_emulator::isa::Instruction;
use lc3b_emulator::Program;
use tracing::info;

#[derive(Parser, Debug)]
pub struct AssembleOpt {
    /// Input file
    #[arg(value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Require the program to start with an `.ORIG` directive
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Also show the symbol table
    #[arg(short, long, action = ArgAction::SetTrue)]
    symbols: bool,
}

/// Render the address, word and disassembly of every word in the program
fn listing(program: &Program) -> String {
    let mut output = String::new();
    for (address, word) in program.iter() {
        let label = program.label_at(address).unwrap_or_default();
        let text = Instruction::decode(word)
            .map_or_else(|_| format!(".FILL x{word:04X}"), |i| i.to_string());
        let _ = writeln!(output, "x{address:04X}  x{word:04X}  {label:<10} {text}");
    }
    output
}

fn symbols(program: &Program) -> String {
    let mut output = String::new();
    for (label, address) in program.symbols() {
        let _ = writeln!(output, "{label:<10} x{address:04X}");
    }
    output
}

impl AssembleOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        let program = super::assemble_file(&self.input, self.strict)?;
        info!(
            origin = program.origin(),
            words = program.len(),
            "Assembled program"
        );

        print!("{}", listing(&program));
        if self.symbols {
            println!();
            print!("{}", symbols(&program));
        }

        Ok(())
    }
}
