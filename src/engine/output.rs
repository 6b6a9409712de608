use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Which standard stream a chunk of text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Text accumulated by one run, returned by [`OutputSink::drain`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

#[derive(Debug, Default)]
struct Buffers {
    stdout: String,
    stderr: String,
}

/// Per-run stdout/stderr capture.
///
/// The engine drains the sink before a run (discarding leftovers) and once
/// after it, so output from run N never leaks into run N+1. `drain` returns
/// the accumulated text and clears both buffers in one step.
#[derive(Debug, Default)]
pub struct OutputSink {
    buffers: Mutex<Buffers>,
}

impl OutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, stream: StreamKind, text: &str) {
        let mut buffers = self.buffers.lock();
        match stream {
            StreamKind::Stdout => buffers.stdout.push_str(text),
            StreamKind::Stderr => buffers.stderr.push_str(text),
        }
    }

    pub fn drain(&self) -> CapturedOutput {
        let mut buffers = self.buffers.lock();
        CapturedOutput {
            stdout: std::mem::take(&mut buffers.stdout),
            stderr: std::mem::take(&mut buffers.stderr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_drain_returns_and_clears() {
        let sink = OutputSink::new();
        sink.write(StreamKind::Stdout, "a");
        sink.write(StreamKind::Stderr, "b");

        let captured = sink.drain();
        assert_eq!(captured.stdout, "a");
        assert_eq!(captured.stderr, "b");

        let empty = sink.drain();
        assert_eq!(empty.stdout, "");
        assert_eq!(empty.stderr, "");
        assert!(empty.is_empty());
    }

    #[test]
    fn test_sink_appends_in_order() {
        let sink = OutputSink::new();
        sink.write(StreamKind::Stdout, "hello ");
        sink.write(StreamKind::Stdout, "world\n");
        sink.write(StreamKind::Stderr, "warn\n");

        let captured = sink.drain();
        assert_eq!(captured.stdout, "hello world\n");
        assert_eq!(captured.stderr, "warn\n");
    }
}
