pub mod constants;
pub mod loader;
pub mod runtime;

pub use self::loader::{parse_load_file, LoadFile};
pub use self::runtime::{decode, Computer, Console, Instruction, Printer, RunState};
