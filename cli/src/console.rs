use std::io::Write;

use c6461_emulator::Console;
use tracing::{debug, warn};

/// Prints the printer output on stdout. Diagnostics go to the log.
#[derive(Debug, Default)]
pub struct Terminal;

impl Console for Terminal {
    fn emit(&mut self, ch: char) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = write!(stdout, "{ch}").and_then(|()| stdout.flush()) {
            warn!(error = %e, "Could not write to stdout");
        }
    }

    fn log(&mut self, line: &str) {
        debug!(target: "c6461_cli::console", "{line}");
    }
}
