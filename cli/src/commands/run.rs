use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueHint};
use lc3b_emulator::Computer;
use tracing::{debug, info, warn};

use crate::interactive::run_interactive;

#[derive(Parser, Debug)]
pub struct RunOpt {
    /// Input file
    #[arg(value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Require the program to start with an `.ORIG` directive
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Maximum number of instructions to execute
    #[arg(long, default_value_t = 100_000)]
    max_steps: usize,

    /// Characters to feed to the `GETC` and `IN` traps
    #[arg(long = "input", value_name = "TEXT")]
    input_text: Option<String>,

    /// Run the program in interactive mode
    #[arg(short, long, action = ArgAction::SetTrue)]
    interactive: bool,
}

impl RunOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        let program = super::assemble_file(&self.input, self.strict)?;

        debug!(origin = program.origin(), "Loading program");
        let mut computer = Computer::new();
        computer.load(&program);
        if let Some(input) = &self.input_text {
            computer.push_input(input);
        }

        info!("Running program");
        if self.interactive {
            run_interactive(&mut computer, &program)?;
        } else {
            let steps = computer.run(self.max_steps)?;
            if !computer.is_halted() {
                warn!(steps, "Step limit reached before the program halted");
            }
        }

        let output = computer.console_output();
        if !output.is_empty() {
            print!("{output}");
            if !output.ends_with('\n') {
                println!();
            }
        }

        info!(registers = %computer.registers(), steps = computer.steps(), "End of program");

        Ok(())
    }
}
