use std::io::Write;
use tracing::warn;

/// Receives every streamed line in arrival order, then at most one completion.
pub trait LineSink {
    fn line(&mut self, line: &str);

    /// Called once after the process exits with a status code. Never called on cancellation.
    fn finished(&mut self, code: i32);
}

pub fn completion_marker(code: i32) -> String {
    format!("Process finished with code {}", code)
}

/// In-memory sink; the completion marker is appended as a final line.
impl LineSink for Vec<String> {
    fn line(&mut self, line: &str) {
        self.push(line.to_string());
    }

    fn finished(&mut self, code: i32) {
        self.push(completion_marker(code));
    }
}

/// Writes lines to any `io::Write`, e.g. stdout. A failed write is logged once and later lines are dropped.
pub struct WriterSink<W: Write> {
    inner: W,
    broken: bool,
}

impl<W: Write> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        WriterSink { inner, broken: false }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn emit(&mut self, text: &str) {
        if self.broken {
            return;
        }
        if let Err(e) = writeln!(self.inner, "{}", text).and_then(|_| self.inner.flush()) {
            warn!(error = %e, "line sink write failed, dropping further output");
            self.broken = true;
        }
    }
}

impl<W: Write> LineSink for WriterSink<W> {
    fn line(&mut self, line: &str) {
        self.emit(line);
    }

    fn finished(&mut self, code: i32) {
        self.emit("");
        self.emit(&completion_marker(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_sink_writes_lines_and_marker() {
        let mut sink = WriterSink::new(Vec::new());
        sink.line("Starting Nmap");
        sink.line("");
        sink.finished(0);
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "Starting Nmap\n\n\nProcess finished with code 0\n");
    }

    struct Failing;

    impl Write for Failing {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn broken_writer_does_not_panic() {
        let mut sink = WriterSink::new(Failing);
        sink.line("a");
        sink.line("b");
        sink.finished(1);
        assert!(sink.broken);
    }
}
