use tracing::{debug, info, warn};

use super::encoding::decode;
use super::fault::Fault;
use super::{Computer, Console, Flow};
use crate::constants::Address;

/// Whether the computer can make progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,

    /// A `HLT` was executed. PC points at it.
    Halted,

    /// An instruction needs a keyboard character. PC points at it.
    WaitingForInput,

    /// The last instruction faulted. Registers are as they were before it, with MFR set.
    Faulted(Fault),
}

impl<C: Console> Computer<C> {
    #[must_use]
    pub const fn state(&self) -> &RunState {
        &self.state
    }

    #[must_use]
    pub fn is_waiting_for_input(&self) -> bool {
        self.state == RunState::WaitingForInput
    }

    /// Queue keyboard characters. Returns whether the computer was waiting for them.
    pub fn push_input(&mut self, text: &str) -> bool {
        self.keyboard.push_str(text);
        let waiting = self.is_waiting_for_input();
        if waiting {
            debug!("Input received, resuming");
            self.state = RunState::Running;
        }
        waiting
    }

    /// Leave the halted state, so that running again restarts at PC. Faults are not cleared.
    pub fn resume(&mut self) -> bool {
        if self.state == RunState::Halted {
            self.state = RunState::Running;
            true
        } else {
            false
        }
    }

    /// Fetch, decode and execute the instruction at `start`
    fn cycle(&mut self, start: Address) -> Result<Flow, Fault> {
        let word = self.load(start)?;
        self.registers.ir = word;
        self.registers.pc = start.wrapping_add(1);
        let instruction = decode(word)?;
        info!("Executing instruction \"{}\"", instruction);
        instruction.execute(self)
    }

    /// Run a single instruction, or a single phase of a trap service.
    ///
    /// Does nothing when the computer is halted, faulted, or waiting for input that did not come
    /// yet.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn step(&mut self) -> RunState {
        match self.state {
            RunState::Halted | RunState::Faulted(_) => return self.state,
            RunState::WaitingForInput if !self.keyboard.is_ready() => return self.state,
            RunState::WaitingForInput | RunState::Running => {}
        }

        self.state = RunState::Running;
        let snapshot = self.registers.clone();
        let start = self.registers.pc;

        match self.cycle(start) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Yield) => self.registers.pc = start,
            Ok(Flow::Halt) => {
                info!(address = start, "Halted");
                self.registers.pc = start;
                self.state = RunState::Halted;
            }
            Ok(Flow::Suspend) => {
                debug!(address = start, "Waiting for input");
                self.registers.pc = start;
                self.state = RunState::WaitingForInput;
            }
            Err(fault) => {
                warn!(address = start, %fault, "Machine fault");
                // IR keeps the faulting word so it can be inspected
                let ir = self.registers.ir;
                self.registers = snapshot;
                self.registers.ir = ir;
                self.registers.mfr = fault.code().word();
                self.traps.cancel();
                self.console
                    .log(&format!("-> FAULT {fault} @ {start:04o}"));
                self.state = RunState::Faulted(fault);
            }
        }

        self.cycles += 1;
        debug!("Register state {}", self.registers);
        self.console.refresh();
        self.state
    }

    /// Step until the computer stops running, or until `limit` steps were made
    #[tracing::instrument(skip(self))]
    pub fn run_until_halt_or_wait(&mut self, limit: Option<usize>) -> RunState {
        let mut steps = 0;
        while self.state == RunState::Running {
            if limit == Some(steps) {
                debug!(steps, "Step limit reached");
                break;
            }
            self.step();
            steps += 1;
        }
        self.state
    }
}
