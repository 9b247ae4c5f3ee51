//! Parse load files and run the initial program load.
//!
//! A load file has one `<address> <value>` pair per line, both in octal:
//!
//! ```text
//! 000006 002437
//! 000007 000000
//! ```
//!
//! Blank lines are ignored. Lines that can not be loaded are skipped and reported, the rest of
//! the file is still loaded.

use nom::{
    character::complete::{oct_digit1, space0, space1},
    combinator::{all_consuming, map_res},
    sequence::{delimited, separated_pair},
    Finish, IResult,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::{Address, Word, MEMORY_SIZE};
use crate::runtime::{Computer, Console, Memory, MemoryError};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    #[error("expected two octal numbers")]
    Syntax,

    #[error("address {0:#o} is outside of the memory")]
    AddressOutOfRange(u32),

    #[error("value {0:#o} does not fit in a word")]
    ValueTooWide(u32),
}

/// A line that was not loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// Line number, starting at 1
    pub line: usize,
    pub content: String,
    pub reason: LoadError,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadFile {
    pub words: Vec<(Address, Word)>,
    pub skipped: Vec<SkippedLine>,
}

impl LoadFile {
    /// Address of the first word loaded, where execution starts
    #[must_use]
    pub fn entry(&self) -> Option<Address> {
        self.words.first().map(|(address, _)| *address)
    }
}

fn parse_octal(input: &str) -> IResult<&str, u32> {
    map_res(oct_digit1, |digits| u32::from_str_radix(digits, 8))(input)
}

fn parse_pair(input: &str) -> IResult<&str, (u32, u32)> {
    all_consuming(delimited(
        space0,
        separated_pair(parse_octal, space1, parse_octal),
        space0,
    ))(input)
}

fn parse_line(line: &str) -> Result<(Address, Word), LoadError> {
    let (_, (address, value)) = parse_pair(line)
        .finish()
        .map_err(|_| LoadError::Syntax)?;

    let address = Address::try_from(address)
        .ok()
        .filter(|a| usize::from(*a) < MEMORY_SIZE)
        .ok_or(LoadError::AddressOutOfRange(address))?;
    let value = Word::try_from(value).map_err(|_| LoadError::ValueTooWide(value))?;

    Ok((address, value))
}

/// Parse a whole load file. This never fails: bad lines are collected in
/// [`LoadFile::skipped`].
#[must_use]
pub fn parse_load_file(input: &str) -> LoadFile {
    let mut file = LoadFile::default();

    for (index, content) in input.lines().enumerate() {
        if content.trim().is_empty() {
            continue;
        }

        match parse_line(content) {
            Ok(word) => file.words.push(word),
            Err(reason) => {
                warn!(line = index + 1, %reason, "Skipping load file line");
                file.skipped.push(SkippedLine {
                    line: index + 1,
                    content: content.to_owned(),
                    reason,
                });
            }
        }
    }

    debug!(
        words = file.words.len(),
        skipped = file.skipped.len(),
        "Parsed load file"
    );
    file
}

impl<C: Console> Computer<C> {
    /// Initial program load: reset the computer, write every word of the file in memory and
    /// point PC at the first one.
    ///
    /// # Errors
    ///
    /// Fails if a word is outside of the memory, which [`parse_load_file`] never produces.
    pub fn ipl(&mut self, file: &LoadFile) -> Result<(), MemoryError> {
        self.reset();

        for skipped in &file.skipped {
            self.console_mut().log(&format!(
                "-> WARNING skipped line {}: {} ({:?})",
                skipped.line, skipped.reason, skipped.content
            ));
        }

        for &(address, value) in &file.words {
            if Memory::is_reserved(address) {
                warn!(address, "Loading a reserved address");
                self.console_mut()
                    .log(&format!("-> WARNING reserved address @ {address:04o}"));
            }
            self.memory.set(address, value)?;
        }
        self.cache.invalidate();

        if let Some(entry) = file.entry() {
            self.registers.pc = entry;
        }
        debug!(words = file.words.len(), pc = self.registers.pc, "Program loaded");
        Ok(())
    }
}
