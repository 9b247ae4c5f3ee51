use std::collections::VecDeque;

use parse_display::Display;
use tracing::debug;

use super::fault::{Fault, IllegalOperation};
use super::registers::Reg;
use super::{Computer, Console, Flow};
use crate::constants::{Word, KEYBOARD, PRINTER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "lowercase")]
pub enum Device {
    Keyboard,
    Printer,
}

impl TryFrom<u8> for Device {
    type Error = IllegalOperation;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            KEYBOARD => Ok(Self::Keyboard),
            PRINTER => Ok(Self::Printer),
            other => Err(IllegalOperation::UnknownDevice(other)),
        }
    }
}

/// Characters typed by the user, waiting to be read
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Keyboard {
    pending: VecDeque<u8>,
}

impl Keyboard {
    /// Queue characters. Only the low byte of each character is kept.
    pub fn push_str(&mut self, text: &str) {
        #[allow(clippy::cast_possible_truncation)]
        self.pending.extend(text.chars().map(|c| u32::from(c) as u8));
    }

    pub fn pop(&mut self) -> Option<u8> {
        self.pending.pop_front()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.pending.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl<C: Console> Computer<C> {
    /// `IN`: read a character, suspending when none is buffered
    pub(crate) fn device_input(&mut self, reg: Reg, device: u8) -> Result<Flow, Fault> {
        match Device::try_from(device)? {
            Device::Keyboard => {
                let Some(ch) = self.keyboard.pop() else {
                    debug!("Keyboard empty, waiting for input");
                    return Ok(Flow::Suspend);
                };
                self.registers.set_gpr(reg, Word::from(ch));
                Ok(Flow::Continue)
            }
            Device::Printer => Err(IllegalOperation::UnsupportedDeviceOperation {
                device,
                operation: "input",
            }
            .into()),
        }
    }

    /// `OUT`: print the low byte of a register
    pub(crate) fn device_output(&mut self, reg: Reg, device: u8) -> Result<(), Fault> {
        match Device::try_from(device)? {
            Device::Printer => {
                let [_, low] = self.registers.gpr(reg).to_be_bytes();
                self.console.emit(char::from(low));
                Ok(())
            }
            Device::Keyboard => Err(IllegalOperation::UnsupportedDeviceOperation {
                device,
                operation: "output",
            }
            .into()),
        }
    }

    /// `CHK`: 1 if the device is ready, without consuming anything
    pub(crate) fn device_status(&mut self, reg: Reg, device: u8) -> Result<(), Fault> {
        let ready = match Device::try_from(device)? {
            Device::Keyboard => self.keyboard.is_ready(),
            Device::Printer => true,
        };
        self.registers.set_gpr(reg, Word::from(ready));
        Ok(())
    }
}
