//! Trap services.
//!
//! Services that need keyboard input keep their progress in a [`Session`] between steps. While a
//! session is in progress the scheduler rewinds PC after each step, so the same `TRAP` word is
//! decoded again and picks up where the session left.
//!
//! Register conventions:
//!
//! | Service | Inputs                                         | Outputs               |
//! |---------|------------------------------------------------|-----------------------|
//! | 0       | R0 paragraph, R1 paragraph length               | R0 sentence, R1 word  |
//! | 1       | R0 address, R1 length                           |                       |
//! | 2       | R0 buffer, R1 capacity                          | R0 length             |
//! | 3       | R0 paragraph, R1 paragraph length, R2 word      | R0 sentence, R1 word  |
//! | 4       | R0 destination, R1 capacity                     | R0 length             |

use std::ops::Range;

use parse_display::Display;
use tracing::{debug, warn};

use super::fault::{Fault, IllegalOperation};
use super::memory::offset_address;
use super::registers::Reg;
use super::search::find_word;
use super::{Computer, Console, Flow};
use crate::constants::{Address, Word, SEARCH_PROMPT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "kebab-case")]
pub enum Service {
    /// Print a paragraph, read a word and search it
    ParagraphSearch,
    /// Print a block of characters
    Print,
    /// Read a line from the keyboard
    ReadLine,
    /// Search a word in a paragraph
    Search,
    /// Write the paragraph configured by the host in memory
    LoadParagraph,
}

impl TryFrom<u8> for Service {
    type Error = IllegalOperation;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        match number {
            0 => Ok(Self::ParagraphSearch),
            1 => Ok(Self::Print),
            2 => Ok(Self::ReadLine),
            3 => Ok(Self::Search),
            4 => Ok(Self::LoadParagraph),
            other => Err(IllegalOperation::UnknownTrapService(other)),
        }
    }
}

/// Progress of the paragraph search service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPhase {
    PrintParagraph {
        paragraph: Range<Address>,
    },
    ReadWord {
        paragraph: Range<Address>,
        word: Vec<u8>,
    },
    Search {
        paragraph: Range<Address>,
        word: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    ParagraphSearch(SearchPhase),
    ReadLine {
        buffer: Address,
        capacity: usize,
        line: Vec<u8>,
    },
}

#[derive(Debug, Default)]
pub(crate) struct TrapController {
    session: Option<Session>,
    paragraph: Option<Vec<u8>>,
}

impl TrapController {
    pub(crate) fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn take(&mut self) -> Option<Session> {
        self.session.take()
    }

    fn park(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(?session, "Trap session cancelled");
        }
    }

    pub(crate) fn set_paragraph(&mut self, text: Vec<u8>) {
        self.paragraph = Some(text);
    }
}

const fn is_newline(ch: u8) -> bool {
    ch == b'\n' || ch == b'\r'
}

impl<C: Console> Computer<C> {
    pub(crate) fn trap(&mut self, number: u8) -> Result<Flow, Fault> {
        let service = Service::try_from(number)?;
        debug!(%service, "Trap");

        match service {
            Service::ParagraphSearch => self.paragraph_search(),
            Service::Print => {
                let start = self.registers.gpr(Reg::R0);
                let len = usize::from(self.registers.gpr(Reg::R1));
                for offset in 0..len {
                    let word = self.load(offset_address(start, offset)?)?;
                    self.emit_byte(word);
                }
                Ok(Flow::Continue)
            }
            Service::ReadLine => self.read_line(),
            Service::Search => {
                let paragraph = self.paragraph_range();
                let text = self.read_text(paragraph)?;
                // The word is zero-terminated, reading past the memory faults
                let word = self.read_text(self.registers.gpr(Reg::R2)..Address::MAX)?;
                self.report_search(&text, &word);
                Ok(Flow::Continue)
            }
            Service::LoadParagraph => {
                self.load_paragraph()?;
                Ok(Flow::Continue)
            }
        }
    }

    /// `R0..R0 + R1`
    fn paragraph_range(&self) -> Range<Address> {
        let start = self.registers.gpr(Reg::R0);
        start..start.saturating_add(self.registers.gpr(Reg::R1))
    }

    /// Read one byte per word through the cache, stopping at a zero word
    fn read_text(&mut self, range: Range<Address>) -> Result<Vec<u8>, Fault> {
        let mut text = Vec::new();
        for address in range {
            let [_, byte] = self.load(address)?.to_be_bytes();
            if byte == 0 {
                break;
            }
            text.push(byte);
        }
        Ok(text)
    }

    /// Write bytes through the cache, followed by a zero if there is room left
    fn write_text(&mut self, start: Address, capacity: usize, text: &[u8]) -> Result<usize, Fault> {
        let count = text.len().min(capacity);
        for (offset, byte) in text.iter().take(count).enumerate() {
            self.store(offset_address(start, offset)?, Word::from(*byte))?;
        }
        if count < capacity {
            self.store(offset_address(start, count)?, 0)?;
        }
        Ok(count)
    }

    fn emit_byte(&mut self, word: Word) {
        let [_, byte] = word.to_be_bytes();
        self.console.emit(char::from(byte));
    }

    fn emit_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.console.emit(ch);
        }
    }

    fn report_search(&mut self, paragraph: &[u8], word: &[u8]) {
        if let Some(location) = find_word(paragraph, word) {
            self.registers.set_gpr(Reg::R0, location.sentence);
            self.registers.set_gpr(Reg::R1, location.word);
            self.emit_str(&format!("{location}\n"));
        } else {
            self.registers.set_gpr(Reg::R0, 0);
            self.registers.set_gpr(Reg::R1, 0);
            self.emit_str("NOTFOUND\n");
        }
    }

    fn paragraph_search(&mut self) -> Result<Flow, Fault> {
        let Some(Session::ParagraphSearch(phase)) = self.traps.take() else {
            let paragraph = self.paragraph_range();
            self.traps
                .park(Session::ParagraphSearch(SearchPhase::PrintParagraph { paragraph }));
            return Ok(Flow::Yield);
        };

        match phase {
            SearchPhase::PrintParagraph { paragraph } => {
                let text = self.read_text(paragraph.clone())?;
                for byte in text {
                    self.console.emit(char::from(byte));
                }
                self.emit_str("\n");
                self.emit_str(SEARCH_PROMPT);
                self.traps
                    .park(Session::ParagraphSearch(SearchPhase::ReadWord {
                        paragraph,
                        word: Vec::new(),
                    }));
                Ok(Flow::Yield)
            }

            SearchPhase::ReadWord {
                paragraph,
                mut word,
            } => {
                let Some(ch) = self.keyboard.pop() else {
                    self.traps
                        .park(Session::ParagraphSearch(SearchPhase::ReadWord { paragraph, word }));
                    return Ok(Flow::Suspend);
                };

                let next = if is_newline(ch) {
                    SearchPhase::Search { paragraph, word }
                } else {
                    word.push(ch);
                    SearchPhase::ReadWord { paragraph, word }
                };
                self.traps.park(Session::ParagraphSearch(next));
                Ok(Flow::Yield)
            }

            SearchPhase::Search { paragraph, word } => {
                let text = self.read_text(paragraph)?;
                self.report_search(&text, &word);
                Ok(Flow::Continue)
            }
        }
    }

    fn read_line(&mut self) -> Result<Flow, Fault> {
        let (buffer, capacity, mut line) = match self.traps.take() {
            Some(Session::ReadLine {
                buffer,
                capacity,
                line,
            }) => (buffer, capacity, line),
            _ => (
                self.registers.gpr(Reg::R0),
                usize::from(self.registers.gpr(Reg::R1)),
                Vec::new(),
            ),
        };

        let Some(ch) = self.keyboard.pop() else {
            self.traps.park(Session::ReadLine {
                buffer,
                capacity,
                line,
            });
            return Ok(Flow::Suspend);
        };

        if is_newline(ch) {
            let count = self.write_text(buffer, capacity, &line)?;
            self.registers
                .set_gpr(Reg::R0, Word::try_from(count).unwrap_or(Word::MAX));
            return Ok(Flow::Continue);
        }

        if line.len() < capacity {
            line.push(ch);
        }
        self.traps.park(Session::ReadLine {
            buffer,
            capacity,
            line,
        });
        Ok(Flow::Yield)
    }

    fn load_paragraph(&mut self) -> Result<(), Fault> {
        let Some(text) = self.traps.paragraph.clone() else {
            warn!("No paragraph configured");
            self.console.log("-> WARNING no paragraph to load");
            self.registers.set_gpr(Reg::R0, 0);
            return Ok(());
        };

        let start = self.registers.gpr(Reg::R0);
        let capacity = usize::from(self.registers.gpr(Reg::R1));
        let count = self.write_text(start, capacity, &text)?;
        self.registers
            .set_gpr(Reg::R0, Word::try_from(count).unwrap_or(Word::MAX));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::runtime::memory::MemoryError;

    const PARAGRAPH: &[u8] = b"the cat sat. the dog ran.";

    fn computer_with_paragraph() -> Computer {
        let mut computer = Computer::default();
        computer.load_text(100, PARAGRAPH).unwrap();
        computer.registers.set_gpr(Reg::R0, 100);
        #[allow(clippy::cast_possible_truncation)]
        computer
            .registers
            .set_gpr(Reg::R1, PARAGRAPH.len() as Word);
        computer
    }

    #[test]
    fn service_test() {
        assert_eq!(Service::try_from(0), Ok(Service::ParagraphSearch));
        assert_eq!(Service::try_from(4), Ok(Service::LoadParagraph));
        assert_eq!(
            Service::try_from(9),
            Err(IllegalOperation::UnknownTrapService(9))
        );
        assert_eq!(Service::ReadLine.to_string(), "read-line");
    }

    #[test]
    fn print_test() {
        let mut computer = Computer::default();
        computer.load_text(200, b"hey").unwrap();
        computer.registers.set_gpr(Reg::R0, 200);
        computer.registers.set_gpr(Reg::R1, 2);
        assert_eq!(computer.trap(1), Ok(Flow::Continue));
        assert_eq!(computer.console().output(), "he");
    }

    #[test]
    fn print_out_of_range_test() {
        let mut computer = Computer::default();
        computer.registers.set_gpr(Reg::R0, 2046);
        computer.registers.set_gpr(Reg::R1, 4);
        assert_eq!(
            computer.trap(1),
            Err(Fault::IllegalMemoryAddress(MemoryError::InvalidAddress(
                2048
            )))
        );
    }

    #[test]
    fn search_test() {
        let mut computer = computer_with_paragraph();
        computer.load_text(300, b"dog").unwrap();
        computer.registers.set_gpr(Reg::R2, 300);
        assert_eq!(computer.trap(3), Ok(Flow::Continue));
        assert_eq!(computer.registers.gpr(Reg::R0), 2);
        assert_eq!(computer.registers.gpr(Reg::R1), 2);
        assert_eq!(computer.console().output(), "Sentence 2, word 2\n");

        let mut computer = computer_with_paragraph();
        computer.load_text(300, b"fox").unwrap();
        computer.registers.set_gpr(Reg::R2, 300);
        assert_eq!(computer.trap(3), Ok(Flow::Continue));
        assert_eq!(computer.registers.gpr(Reg::R0), 0);
        assert_eq!(computer.registers.gpr(Reg::R1), 0);
        assert_eq!(computer.console().output(), "NOTFOUND\n");
    }

    #[test]
    fn paragraph_search_phases_test() {
        let mut computer = computer_with_paragraph();

        // Idle -> PrintParagraph
        assert_eq!(computer.trap(0), Ok(Flow::Yield));
        assert_eq!(
            computer.trap_session(),
            Some(&Session::ParagraphSearch(SearchPhase::PrintParagraph {
                paragraph: 100..125
            }))
        );

        // PrintParagraph -> ReadWord
        assert_eq!(computer.trap(0), Ok(Flow::Yield));
        assert_eq!(
            computer.console().output(),
            "the cat sat. the dog ran.\nEnter a word: "
        );

        // Nothing typed yet
        assert_eq!(computer.trap(0), Ok(Flow::Suspend));

        computer.keyboard.push_str("do");
        assert_eq!(computer.trap(0), Ok(Flow::Yield));
        assert_eq!(computer.trap(0), Ok(Flow::Yield));
        assert_eq!(computer.trap(0), Ok(Flow::Suspend));
        computer.keyboard.push_str("g\r");
        assert_eq!(computer.trap(0), Ok(Flow::Yield));
        assert_eq!(computer.trap(0), Ok(Flow::Yield));
        assert_eq!(
            computer.trap_session(),
            Some(&Session::ParagraphSearch(SearchPhase::Search {
                paragraph: 100..125,
                word: b"dog".to_vec()
            }))
        );

        assert_eq!(computer.trap(0), Ok(Flow::Continue));
        assert_eq!(computer.trap_session(), None);
        assert_eq!(computer.registers.gpr(Reg::R0), 2);
        assert_eq!(computer.registers.gpr(Reg::R1), 2);
        assert!(computer
            .console()
            .output()
            .ends_with("Enter a word: Sentence 2, word 2\n"));
    }

    #[test]
    fn read_line_test() {
        let mut computer = Computer::default();
        computer.memory.set(403, 0o777).unwrap();
        computer.registers.set_gpr(Reg::R0, 400);
        computer.registers.set_gpr(Reg::R1, 3);

        assert_eq!(computer.trap(2), Ok(Flow::Suspend));
        computer.keyboard.push_str("ab\n");
        assert_eq!(computer.trap(2), Ok(Flow::Yield));
        assert_eq!(computer.trap(2), Ok(Flow::Yield));
        assert_eq!(computer.trap(2), Ok(Flow::Continue));

        assert_eq!(computer.registers.gpr(Reg::R0), 2);
        assert_eq!(computer.peek(400), Ok(Word::from(b'a')));
        assert_eq!(computer.peek(401), Ok(Word::from(b'b')));
        assert_eq!(computer.peek(402), Ok(0));
        assert_eq!(computer.peek(403), Ok(0o777));
        assert_eq!(computer.trap_session(), None);
    }

    #[test]
    fn read_line_truncate_test() {
        let mut computer = Computer::default();
        computer.memory.set(402, 0o777).unwrap();
        computer.registers.set_gpr(Reg::R0, 400);
        computer.registers.set_gpr(Reg::R1, 2);
        computer.keyboard.push_str("abcd\n");

        let mut flow = Flow::Yield;
        while flow == Flow::Yield {
            flow = computer.trap(2).unwrap();
        }
        assert_eq!(flow, Flow::Continue);
        assert_eq!(computer.registers.gpr(Reg::R0), 2);
        assert_eq!(computer.peek(401), Ok(Word::from(b'b')));
        // No room for the sentinel
        assert_eq!(computer.peek(402), Ok(0o777));
        assert!(computer.keyboard.is_empty());
    }

    #[test]
    fn load_paragraph_test() {
        let mut computer = Computer::default();
        computer.registers.set_gpr(Reg::R0, 500);
        computer.registers.set_gpr(Reg::R1, 10);
        assert_eq!(computer.trap(4), Ok(Flow::Continue));
        assert_eq!(computer.registers.gpr(Reg::R0), 0);

        computer.set_paragraph("Hi there.");
        computer.registers.set_gpr(Reg::R0, 500);
        assert_eq!(computer.trap(4), Ok(Flow::Continue));
        assert_eq!(computer.registers.gpr(Reg::R0), 9);
        assert_eq!(computer.peek(500), Ok(Word::from(b'H')));
        assert_eq!(computer.peek(508), Ok(Word::from(b'.')));
        assert_eq!(computer.peek(509), Ok(0));
    }

    #[test]
    fn unknown_service_test() {
        let mut computer = Computer::default();
        assert_eq!(
            computer.trap(15),
            Err(Fault::IllegalOperation(
                IllegalOperation::UnknownTrapService(15)
            ))
        );
    }
}
