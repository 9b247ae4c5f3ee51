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
use rustyline::{Behavior, CompletionType, Config, EditMode, Editor};
use tracing::{debug, info, warn};

use c6461_emulator::constants::Address;
use c6461_emulator::runtime::Register;
use c6461_emulator::{decode, Computer, Console, LoadFile, RunState};

mod helper;
mod parse;
use self::helper::RunHelper;

static HELP: &str = r#"
Numbers are octal, unless prefixed by 0x or 0d. Registers can be used as values, with an optional
offset like "PC+2".

Run "help [command]" for command-specific help.
An empty line re-runs the last valid command."#;

#[derive(Parser, Clone, Debug)]
#[clap(
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
        #[clap(value_parser, default_value = "1")]
        number: u64,
    },

    /// Exit the emulator
    Exit,

    /// Show the state of registers
    Registers {
        #[clap(value_parser)]
        register: Option<Register>,
    },

    /// Show the content of a block in memory
    Memory {
        /// The address to show
        #[clap(value_parser)]
        address: parse::Argument,

        /// Number of memory words to show
        #[clap(value_parser, default_value = "1")]
        number: u16,
    },

    /// Set a value in memory or in a register
    Set {
        /// The address or register to set
        #[clap(value_parser)]
        target: parse::AssignmentTarget,

        /// The value to set
        #[clap(value_parser)]
        value: parse::Argument,
    },

    /// Show the cache lines
    Cache,

    /// Type characters on the keyboard. A newline is added at the end.
    Input {
        #[clap(value_parser)]
        text: String,
    },

    /// Show the next few instructions
    List {
        /// Number of instructions to show
        #[clap(value_parser, default_value = "10")]
        number: u16,
    },

    /// Set a breakpoint
    Break {
        /// The address where to set the breakpoint
        #[clap(value_parser)]
        address: parse::Argument,
    },

    /// Remove a breakpoint
    Unbreak {
        /// The address of the breakpoint to remove
        #[clap(value_parser)]
        address: parse::Argument,
    },

    /// Continue the program until the next breakpoint, a halt or a fault
    Continue,

    /// Reload the program and start over
    Reset,

    /// Show informations about the current debugging session
    Info {
        #[clap(subcommand)]
        sub: Option<InfoCommand>,
    },
}

#[derive(Parser, Clone, Debug)]
enum InfoCommand {
    /// List active breakpoints
    Breakpoints,

    /// Show the number of steps executed since the program was loaded
    Cycles,
}

/// Holds informations about a interactive session
#[derive(Debug, Default)]
struct Session {
    /// List of active breakpoints
    breakpoints: BTreeSet<Address>,

    /// Current address for the `list` command
    list_address: Option<Address>,

    /// `continue` stopped to wait for the keyboard, and should go on once input arrives
    resume_after_input: bool,
}

impl Session {
    /// Add a breakpoint
    fn add_breakpoint(&mut self, address: Address) {
        if self.breakpoints.insert(address) {
            info!("Setting a breakpoint at {address:04o}");
        } else {
            warn!("A breakpoint was already set at {address:04o}");
        }
    }

    /// Remove a breakpoint
    fn remove_breakpoint(&mut self, address: Address) {
        if self.breakpoints.remove(&address) {
            info!("Removing breakpoint at {address:04o}");
        } else {
            warn!("No breakpoint was set at {address:04o}");
        }
    }

    /// Checks if the given address has a breakpoint
    fn has_breakpoint(&self, address: Address) -> bool {
        self.breakpoints.contains(&address)
    }

    /// Reset the `list` command (after running an instruction)
    fn reset_list(&mut self) {
        self.list_address = None;
    }

    /// Offset the `list` command, returns the address to show
    fn offset_list<C>(&mut self, computer: &Computer<C>, offset: Address) -> Address {
        let addr = self.list_address.unwrap_or(computer.registers.pc);
        self.list_address = Some(addr.wrapping_add(offset));
        addr
    }

    fn display_breakpoints<C: Console>(&self, computer: &Computer<C>) {
        match self.breakpoints.len() {
            0 => info!("No breakpoints"),
            1 => info!("1 breakpoint:"),
            x => info!("{} breakpoints:", x),
        }

        for &addr in &self.breakpoints {
            self.display_instruction(computer, addr);
        }
    }

    /// Display an instruction at specified address
    fn display_instruction<C: Console>(&self, computer: &Computer<C>, address: Address) {
        let is_current_line = computer.registers.pc == address;
        let has_breakpoint = self.has_breakpoint(address);

        let gutter = match (has_breakpoint, is_current_line) {
            (true, true) => "B>",
            (true, false) => "B ",
            (false, true) => " >",
            (false, false) => "  ",
        };

        // Any word decodes to something unless its opcode is unknown, data included
        match computer.peek(address) {
            Ok(word) => match decode(word) {
                Ok(instruction) => info!("{gutter:<2} {address:04o}  {word:06o}    {instruction}"),
                Err(_) => info!("{gutter:<2} {address:04o}  {word:06o}    –"),
            },
            Err(_) => info!("{gutter:<2} {address:04o}  ------    –"),
        }
    }

    fn display_cycles<C>(computer: &Computer<C>) {
        info!("Cycles: {}", computer.cycles);
    }

    /// Execute up to `number` instructions. Stepping by hand cancels any pending `continue`.
    fn step<C: Console>(&mut self, computer: &mut Computer<C>, number: u64) {
        self.resume_after_input = false;
        if !can_step(computer) {
            return;
        }
        self.reset_list();

        for _ in 0..number {
            if !report_state(computer.step()) {
                break;
            }
        }
        self.display_instruction(computer, computer.registers.pc);
    }

    /// Step until a breakpoint, a halt, a fault, or until the program waits for input
    fn run_continuously<C: Console>(&mut self, computer: &mut Computer<C>) {
        self.reset_list();

        loop {
            let state = computer.step();
            if !report_state(state) {
                self.resume_after_input = state == RunState::WaitingForInput;
                return;
            }

            if self.has_breakpoint(computer.registers.pc) {
                info!("Stopped at a breakpoint at {:04o}", computer.registers.pc);
                self.display_instruction(computer, computer.registers.pc);
                self.resume_after_input = false;
                return;
            }
        }
    }

    /// Type on the keyboard, resuming a `continue` that was waiting for it
    fn deliver_input<C: Console>(&mut self, computer: &mut Computer<C>, text: &str) {
        if !computer.push_input(text) {
            info!(pending = computer.keyboard.len(), "Input queued");
            return;
        }

        if self.resume_after_input {
            info!("Input received, resuming");
            self.run_continuously(computer);
        } else {
            info!("Input received, the program can continue");
        }
    }

    /// Forget everything tied to the previous run
    fn restart(&mut self) {
        self.reset_list();
        self.resume_after_input = false;
    }
}

/// Log what happened after running some steps. Returns whether the computer can keep going.
fn report_state(state: RunState) -> bool {
    match state {
        RunState::Running => true,
        RunState::Halted => {
            info!("Program halted");
            false
        }
        RunState::WaitingForInput => {
            info!("Waiting for input. Use \"input <text>\" to type on the keyboard");
            false
        }
        RunState::Faulted(fault) => {
            warn!(%fault, "Machine fault. Use \"reset\" to start over");
            false
        }
    }
}

/// Whether the program can be stepped, warns if it cannot
fn can_step<C: Console>(computer: &Computer<C>) -> bool {
    match computer.state() {
        RunState::Running => true,
        RunState::Halted => {
            warn!("Computer is halted. Use \"reset\" or \"exit\"");
            false
        }
        RunState::WaitingForInput => {
            warn!("Computer is waiting for input. Use \"input <text>\"");
            false
        }
        RunState::Faulted(_) => {
            warn!("Computer faulted. Use \"reset\" or \"exit\"");
            false
        }
    }
}

#[allow(clippy::too_many_lines)]
pub(crate) fn run_interactive<C: Console>(computer: &mut Computer<C>, file: &LoadFile) {
    info!("Running in interactive mode. Type \"help\" to list available commands.");
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .behavior(Behavior::PreferTerm)
        .auto_add_history(true)
        .build();

    let mut session = Session::default();

    let h: RunHelper<Command> = RunHelper::new();
    let mut rl = match Editor::with_config(config) {
        Ok(rl) => rl,
        Err(e) => {
            warn!(error = &e as &dyn std::error::Error, "Could not initialize terminal input");
            return;
        }
    };
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
            info!("EOF, exitting");
            return;
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

        match command {
            Command::Exit => break,

            Command::Step { number } => session.step(computer, number),

            Command::Continue => {
                if can_step(computer) {
                    session.run_continuously(computer);
                }
            }

            Command::Registers { register } => {
                if let Some(reg) = register {
                    let value = computer.registers.get(reg);
                    info!("Register {reg} = {value:06o} ({value})");
                } else {
                    info!("Registers: {}", computer.registers);
                }
            }

            Command::Memory { address, number } => {
                let start = warn_and_continue!(address.evaluate(computer));
                warn_and_continue!(computer.peek(start));
                for (address, word) in computer.memory.block(start, usize::from(number)) {
                    info!("{address:04o}: {word:06o} ({word})");
                }
            }

            Command::Set { target, value } => {
                let value = warn_and_continue!(value.evaluate(computer));
                match target {
                    parse::AssignmentTarget::Address(address) => {
                        info!("Setting memory at address {address:04o} to {value:06o}");
                        warn_and_continue!(computer.cache.write(
                            &mut computer.memory,
                            address,
                            value
                        ));
                    }

                    parse::AssignmentTarget::Register(reg) => {
                        info!("Setting register {reg} to {value:06o}");
                        computer.registers.set(reg, value);
                    }
                }
                session.reset_list();
            }

            Command::Cache => {
                for line in computer.cache.to_string().lines() {
                    info!("{line}");
                }
                info!(
                    hits = computer.cache.hits(),
                    misses = computer.cache.misses(),
                    "Cache statistics"
                );
            }

            Command::Input { text } => session.deliver_input(computer, &format!("{text}\n")),

            Command::List { number } => {
                let addr = session.offset_list(computer, number);
                for i in 0..number {
                    session.display_instruction(computer, addr.wrapping_add(i));
                }
            }

            Command::Break { address } => {
                let address = warn_and_continue!(address.evaluate(computer));
                session.add_breakpoint(address);
            }

            Command::Unbreak { address } => {
                let address = warn_and_continue!(address.evaluate(computer));
                session.remove_breakpoint(address);
            }

            Command::Reset => {
                warn_and_continue!(computer.ipl(file));
                session.restart();
                info!("Program reloaded, starting at {:04o}", computer.registers.pc);
            }

            Command::Info { sub } => match sub {
                Some(InfoCommand::Breakpoints) => {
                    session.display_breakpoints(computer);
                }
                Some(InfoCommand::Cycles) => {
                    Session::display_cycles(computer);
                }
                None => {
                    session.display_breakpoints(computer);
                    info!("–");
                    Session::display_cycles(computer);
                }
            },
        }
    }
}
