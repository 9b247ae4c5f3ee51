use std::collections::VecDeque;

/// Side effects the computer pushes to whoever presents it.
///
/// Calls are fire-and-forget: implementations must not block.
pub trait Console {
    /// A printable character was sent to the printer
    fn emit(&mut self, ch: char);

    /// A diagnostic line (cache accesses, warnings, faults)
    fn log(&mut self, line: &str);

    /// The machine state changed and views of it should be refreshed
    fn refresh(&mut self) {}
}

impl<T: Console + ?Sized> Console for &mut T {
    fn emit(&mut self, ch: char) {
        (**self).emit(ch);
    }

    fn log(&mut self, line: &str) {
        (**self).log(line);
    }

    fn refresh(&mut self) {
        (**self).refresh();
    }
}

/// Keep at most this many diagnostic lines
const LOG_CAPACITY: usize = 1024;

/// In-memory console: collects the printer output and the most recent log lines
#[derive(Debug, Default, Clone)]
pub struct Printer {
    output: String,
    log: VecDeque<String>,
}

impl Printer {
    /// Everything printed so far
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Take the printed text, leaving the printer empty
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Most recent diagnostic lines, oldest first
    pub fn log_lines(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.output.clear();
        self.log.clear();
    }
}

impl Console for Printer {
    fn emit(&mut self, ch: char) {
        self.output.push(ch);
    }

    fn log(&mut self, line: &str) {
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(line.to_owned());
    }
}
