use std::io::BufRead;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueHint};
use tracing::{debug, info, warn};

use c6461_emulator::{Computer, RunState};

use crate::console::Terminal;
use crate::interactive::run_interactive;

#[derive(Parser, Debug)]
pub struct RunOpt {
    /// Load file, with one octal `<address> <value>` pair per line
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    load_file: Utf8PathBuf,

    /// Text file searched by the paragraph search trap
    #[clap(short, long, value_parser, value_hint = ValueHint::FilePath)]
    paragraph: Option<Utf8PathBuf>,

    /// Characters to queue on the keyboard before starting
    #[clap(long, value_parser)]
    input: Option<String>,

    /// Run the program in interactive mode
    #[clap(short, long, action = ArgAction::SetTrue)]
    interactive: bool,

    /// Stop after this many steps
    #[clap(long, value_parser)]
    max_steps: Option<usize>,
}

impl RunOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        let file = super::read_load_file(&self.load_file)?;

        debug!("Building computer");
        let mut computer = Computer::with_console(Terminal);
        computer.ipl(&file)?;

        if let Some(path) = &self.paragraph {
            info!(%path, "Reading paragraph");
            let text = std::fs::read(path).with_context(|| format!("could not read {path}"))?;
            computer.set_paragraph(text);
        }

        if let Some(input) = &self.input {
            computer.push_input(input);
        }

        info!("Running program");
        if self.interactive {
            run_interactive(&mut computer, &file);
            return Ok(());
        }

        let mut budget = self.max_steps;
        let stdin = std::io::stdin();
        loop {
            let before = computer.cycles;
            let state = computer.run_until_halt_or_wait(budget);
            if let Some(budget) = budget.as_mut() {
                *budget = budget.saturating_sub(computer.cycles - before);
            }

            match state {
                RunState::Halted => {
                    info!(registers = %computer.registers, "End of program");
                    return Ok(());
                }
                RunState::Faulted(fault) => {
                    info!(registers = %computer.registers, "Registers at fault");
                    anyhow::bail!("machine fault at {:04o}: {fault}", computer.registers.pc);
                }
                RunState::WaitingForInput => {
                    let mut line = String::new();
                    let read = stdin
                        .lock()
                        .read_line(&mut line)
                        .context("could not read from stdin")?;
                    if read == 0 {
                        anyhow::bail!("end of input while the program is waiting for a character");
                    }
                    if !line.ends_with('\n') {
                        line.push('\n');
                    }
                    computer.push_input(&line);
                }
                RunState::Running => {
                    warn!(steps = computer.cycles, "Step limit reached, stopping");
                    info!(registers = %computer.registers, "Registers at stop");
                    return Ok(());
                }
            }
        }
    }
}
