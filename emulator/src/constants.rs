pub type Address = u16;
pub type Word = u16;

/// Total size of the computer memory, in words
pub const MEMORY_SIZE: usize = 2048;

/// First address after the reserved block. Addresses below it can be accessed, but it logs a
/// warning.
pub const RESERVED_END: Address = 6;

/// Default place where the assembler starts laying out programs
pub const PROGRAM_START: Address = RESERVED_END;

/// Number of lines in the cache
pub const CACHE_LINES: usize = 16;

/// Device number of the keyboard
pub const KEYBOARD: u8 = 0;

/// Device number of the printer
pub const PRINTER: u8 = 1;

/// Prompt printed by the paragraph search trap before reading a word
pub const SEARCH_PROMPT: &str = "Enter a word: ";
