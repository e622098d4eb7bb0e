//! This module implements the TTY interactive interface.
//!
//! It is mainly based on two crates:
//!   - rustyline, to handle the line-editting logic
//!   - clap, to handle the parsing of those interactive commands
//!
//! Using Parser to do this is a bit of a hack, and requires some weird options
//! to have it working but works nonetheless.

use std::collections::BTreeSet;

use clap::Parser;
use lc3b_emulator::assembler::SymbolTable;
use lc3b_emulator::constants as C;
use lc3b_emulator::isa::{Instruction, Reg};
use lc3b_emulator::{Computer, Program};
use rustyline::{Behavior, CompletionType, Config, EditMode, Editor};
use tracing::{debug, info, warn};

mod helper;
mod parse;
use self::helper::RunHelper;
use self::parse::Location;

static HELP: &str = r#"
Run "help [command]" for command-specific help.
An empty line re-runs the last valid command."#;

#[derive(Parser, Clone, Debug)]
#[command(
    help_template = "{about}\n\nCOMMANDS:\n{subcommands}\n{after-help}",
    after_help = HELP,
    disable_version_flag = true,
    infer_subcommands = true,
    no_binary_name = true,
    allow_negative_numbers = true,
)]
/// Interactive mode commands
enum Command {
    /// Execute the next instructions
    #[command(alias = "s")]
    Step {
        /// Number of steps to execute
        #[arg(default_value = "1")]
        number: u64,
    },

    /// Exit the emulator
    Exit,

    /// Show the state of registers
    Registers {
        register: Option<Reg>,
    },

    /// Show the content of a block in memory
    Memory {
        /// The address to show. Can be a number literal, a label, or a
        /// register with an optional offset.
        location: Location,

        /// Number of words to show. Negative numbers go backwards.
        #[arg(default_value = "1", allow_negative_numbers = true)]
        number: i32,
    },

    /// Show the next few instructions
    List {
        /// Number of instructions to show.
        #[arg(default_value = "10")]
        number: u16,
    },

    /// Set a breakpoint
    Break {
        /// The address where to set the breakpoint
        location: Location,
    },

    /// Remove a breakpoint
    Unbreak {
        /// The address of the breakpoint to remove
        location: Location,
    },

    /// Continue the program until the next breakpoint or halt
    Continue,

    /// Show what the program wrote to the console
    Output,

    /// Show informations about the current debugging session
    Info {
        #[command(subcommand)]
        sub: Option<InfoCommand>,
    },
}

#[derive(Parser, Clone, Debug)]
enum InfoCommand {
    /// List active breakpoints
    Breakpoints,

    /// List program labels
    Labels,

    /// Show the number of instructions executed since the beginning of the program
    Steps,
}

/// Holds informations about a interactive session
#[derive(Debug, Default)]
struct Session {
    /// List of active breakpoints
    breakpoints: BTreeSet<C::Address>,

    /// Map of labels in program
    labels: SymbolTable,

    /// Current address for the `list` command
    list_address: Option<C::Address>,
}

impl Session {
    fn from_program(program: &Program) -> Session {
        Session {
            labels: program.symbols().clone(),
            ..Default::default()
        }
    }

    /// Add a breakpoint
    fn add_breakpoint(&mut self, address: C::Address) {
        if self.breakpoints.insert(address) {
            info!(address, "Setting a breakpoint");
        } else {
            warn!(address, "A breakpoint was already set");
        }
    }

    /// Remove a breakpoint
    fn remove_breakpoint(&mut self, address: C::Address) {
        if self.breakpoints.remove(&address) {
            info!(address, "Removing breakpoint");
        } else {
            warn!(address, "No breakpoint was set here");
        }
    }

    /// Checks if the given address has a breakpoint
    fn has_breakpoint(&self, address: C::Address) -> bool {
        self.breakpoints.contains(&address)
    }

    /// Reset the `list` command (after running an instruction)
    fn reset_list(&mut self) {
        self.list_address = None;
    }

    /// Advance the `list` command by a number of instructions, returns the
    /// address to show
    fn offset_list(&mut self, computer: &Computer, count: u16) -> C::Address {
        let address = self.list_address.unwrap_or(computer.program_counter());
        self.list_address = Some(address.wrapping_add(count.wrapping_mul(C::WORD_SIZE)));
        address
    }

    /// Display the list of breakpoints
    fn display_breakpoints(&self, computer: &Computer) {
        match self.breakpoints.len() {
            0 => info!("No breakpoints"),
            1 => info!("1 breakpoint:"),
            x => info!("{} breakpoints:", x),
        }

        for &address in &self.breakpoints {
            self.display_instruction(computer, address);
        }
    }

    /// Display an instruction at specified address
    fn display_instruction(&self, computer: &Computer, address: C::Address) {
        // First, display the labels on the line if any
        self.labels
            .iter()
            .filter(|(_, &a)| a == address)
            .for_each(|(label, _)| info!("          {}:", label));

        // Then compute what is supposed to show in the gutter
        let is_current_line = computer.program_counter() == address;
        let has_breakpoint = self.has_breakpoint(address);

        let gutter = match (has_breakpoint, is_current_line) {
            (true, true) => "B>",
            (true, false) => "B ",
            (false, true) => " >",
            (false, false) => "  ",
        };

        let word = computer.read_memory(address);
        if let Ok(instruction) = Instruction::decode(word) {
            info!("{gutter:<2} x{address:04X}  x{word:04X}    {instruction}");
        } else {
            info!("{gutter:<2} x{address:04X}  x{word:04X}    –");
        }
    }

    /// Display the list of labels
    fn display_labels(&self) {
        match self.labels.len() {
            0 => info!("No labels"),
            1 => info!("1 label:"),
            x => info!("{} labels:", x),
        }

        for (label, &address) in &self.labels {
            info!("  {label} => x{address:04X}");
        }
    }

    /// Display the number of instructions executed
    fn display_steps(computer: &Computer) {
        info!("Steps: {}", computer.steps());
    }
}

/// Display a register, or all of them
fn display_registers(computer: &Computer, register: Option<Reg>) {
    if let Some(reg) = register {
        let value = computer.register(reg);
        info!("Register {reg} = x{:04X} ({value})", computer.registers().get_word(reg));
    } else {
        info!("Registers: {}", computer.registers());
    }
}

/// Display a block of memory, going backwards for a negative count
#[allow(clippy::cast_possible_wrap)]
fn display_memory(computer: &Computer, start: C::Address, number: i32) {
    let step = if number.is_negative() {
        -i32::from(C::WORD_SIZE)
    } else {
        i32::from(C::WORD_SIZE)
    };

    let addresses = (0..number.unsigned_abs())
        .map_while(|i| i32::try_from(i).ok())
        .map_while(|i| C::Address::try_from(i32::from(start) + i * step).ok());

    for address in addresses {
        let value = computer.read_memory(address);
        info!("x{address:04X}: x{value:04X} ({})", value as i16);
    }
}

/// Step the computer, reporting whether it can go on
fn step(computer: &mut Computer) -> bool {
    match computer.step() {
        Ok(()) if computer.is_halted() => {
            info!("Program halted");
            false
        }
        Ok(()) => true,
        Err(e) => {
            warn!(error = &e as &dyn std::error::Error, "Could not step");
            false
        }
    }
}

#[allow(clippy::too_many_lines)]
pub(crate) fn run_interactive(computer: &mut Computer, program: &Program) -> anyhow::Result<()> {
    info!("Running in interactive mode. Type \"help\" to list available commands.");
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .behavior(Behavior::PreferTerm)
        .auto_add_history(true)
        .build();

    let mut session = Session::from_program(program);

    let h: RunHelper<Command> = RunHelper::new(session.labels.keys());
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(h));

    let mut last_command: Option<Command> = None;

    'read: loop {
        // A macro to unwrap an error, log it and continue the loop
        macro_rules! warn_and_continue {
            ($e:expr) => {
                match $e {
                    Ok(o) => o,
                    Err(e) => {
                        tracing::warn!(error = %e);
                        continue 'read;
                    }
                }
            };
        }

        let Ok(readline) = rl.readline(">> ") else {
            info!("EOF, exiting");
            return Ok(());
        };

        let command = if readline.is_empty() {
            if let Some(command) = &last_command {
                command.clone()
            } else {
                info!("Type \"help\" to get the list of available commands");
                continue 'read;
            }
        } else {
            let Ok(words) = shell_words::split(readline.as_str()) else {
                warn!("Invalid input");
                continue 'read;
            };

            let command = warn_and_continue!(Command::try_parse_from(words));
            last_command = Some(command.clone());
            command
        };

        debug!("Executing command: {:?}", command);

        match (command, computer.is_halted()) {
            (Command::Exit, _) => break,
            (Command::Step { number }, false) => {
                session.reset_list();

                for _ in 0..number {
                    if !step(computer) {
                        continue 'read;
                    }
                }

                session.display_instruction(computer, computer.program_counter());
            }

            (Command::Registers { register }, _) => display_registers(computer, register),

            (Command::Memory { location, number }, _) => {
                let address = warn_and_continue!(location.evaluate(computer, &session.labels));
                display_memory(computer, address, number);
            }

            (Command::List { number }, _) => {
                let address = session.offset_list(computer, number);
                for i in 0..number {
                    let Some(address) = i
                        .checked_mul(C::WORD_SIZE)
                        .and_then(|offset| address.checked_add(offset))
                    else {
                        break;
                    };
                    session.display_instruction(computer, address);
                }
            }

            (Command::Break { location }, _) => {
                let address = warn_and_continue!(location.evaluate(computer, &session.labels));
                session.add_breakpoint(address);
            }

            (Command::Unbreak { location }, _) => {
                let address = warn_and_continue!(location.evaluate(computer, &session.labels));
                session.remove_breakpoint(address);
            }

            (Command::Continue, false) => {
                session.reset_list();

                while step(computer) {
                    if session.has_breakpoint(computer.program_counter()) {
                        info!(
                            address = computer.program_counter(),
                            "Stopped at a breakpoint"
                        );
                        break;
                    }
                }
            }

            (Command::Output, _) => {
                info!("Console output: {:?}", computer.console_output());
            }

            (Command::Info { sub }, _) => match sub {
                Some(InfoCommand::Breakpoints) => {
                    session.display_breakpoints(computer);
                }
                Some(InfoCommand::Labels) => {
                    session.display_labels();
                }
                Some(InfoCommand::Steps) => {
                    Session::display_steps(computer);
                }
                None => {
                    session.display_breakpoints(computer);
                    info!("–");
                    session.display_labels();
                    info!("–");
                    Session::display_steps(computer);
                }
            },

            (_, true) => {
                // Computer is halted but the user asked to continue, we just warn
                warn!("Computer is halted. Use \"exit\" to quit");
            }
        }
    }

    Ok(())
}
