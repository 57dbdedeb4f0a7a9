//! Line-oriented output channel used by `Print` and stack-trace dumps.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

pub trait PrintSink {
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

pub type SharedPrintSink = Rc<RefCell<dyn PrintSink>>;

pub fn shared<S: PrintSink + 'static>(sink: S) -> SharedPrintSink {
    Rc::new(RefCell::new(sink))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl PrintSink for StdoutSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", line)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl PrintSink for StderrSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut out = io::stderr().lock();
        writeln!(out, "{}", line)
    }
}

/// In-memory sink. Clones share the same buffer, so a test can keep one
/// handle and give the other to an interpreter.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    buffer: Rc<RefCell<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        BufferSink::default()
    }

    pub fn contents(&self) -> String {
        self.buffer.borrow().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.buffer.borrow().lines().map(str::to_string).collect()
    }
}

impl PrintSink for BufferSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut buffer = self.buffer.borrow_mut();
        buffer.push_str(line);
        buffer.push('\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_clones_share_output() {
        let handle = BufferSink::new();
        let sink = shared(handle.clone());
        sink.borrow_mut().write_line("one").unwrap();
        sink.borrow_mut().write_line("two").unwrap();
        assert_eq!(handle.lines(), vec!["one", "two"]);
        assert_eq!(handle.contents(), "one\ntwo\n");
    }
}
