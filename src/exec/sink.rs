//! Output sinks for streamed child process lines.
//!
//! A sink is the one place both drainers write to. Every implementation
//! serializes `accept` behind a mutex so lines are emitted whole, and assigns
//! the sequence number under that same lock so numbering matches emission order.

use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

use serde::Serialize;

/// Which output stream of the child a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Stdout,
    Stderr,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Stdout => write!(f, "stdout"),
            Channel::Stderr => write!(f, "stderr"),
        }
    }
}

/// A single line accepted by a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLine {
    pub channel: Channel,
    pub seq: u64,
    pub line: String,
}

/// Prefix applied to stderr lines in human-readable output.
pub const STDERR_PREFIX: &str = "err:";

/// Destination for lines drained from a child process.
///
/// Called concurrently by the stdout and stderr drainers.
pub trait OutputSink: Send + Sync {
    /// Accept one complete line. Never fails; emission errors are recorded.
    fn accept(&self, channel: Channel, line: String);

    /// Number of lines that could not be written to the underlying target.
    fn write_failures(&self) -> u64 {
        0
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &S {
    fn accept(&self, channel: Channel, line: String) {
        (**self).accept(channel, line)
    }

    fn write_failures(&self) -> u64 {
        (**self).write_failures()
    }
}

/// How a [`ConsoleSink`] renders lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineFormat {
    /// stdout verbatim, stderr with the `err:` prefix.
    #[default]
    Human,
    /// One JSON object per line.
    Json,
}

#[derive(Debug)]
struct WriterState<W> {
    writer: W,
    next_seq: u64,
    failures: u64,
}

/// Sink that renders lines onto a writer (stdout by default).
#[derive(Debug)]
pub struct ConsoleSink<W: Write + Send = io::Stdout> {
    state: Mutex<WriterState<W>>,
    format: LineFormat,
}

impl ConsoleSink<io::Stdout> {
    /// Sink writing to the process's stdout.
    pub fn stdout(format: LineFormat) -> Self {
        ConsoleSink::new(io::stdout(), format)
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Create a sink over any writer.
    pub fn new(writer: W, format: LineFormat) -> Self {
        ConsoleSink {
            state: Mutex::new(WriterState {
                writer,
                next_seq: 0,
                failures: 0,
            }),
            format,
        }
    }

    /// Consume the sink and return the writer.
    pub fn into_inner(self) -> W {
        match self.state.into_inner() {
            Ok(state) => state.writer,
            Err(poisoned) => poisoned.into_inner().writer,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WriterState<W>> {
        // A panicking writer must not silence the other channel.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn render(&self, line: &OutputLine) -> String {
        match self.format {
            LineFormat::Human => match line.channel {
                Channel::Stdout => format!("{}\n", line.line),
                Channel::Stderr => format!("{}{}\n", STDERR_PREFIX, line.line),
            },
            LineFormat::Json => {
                let event = serde_json::json!({
                    "reason": "output-line",
                    "channel": line.channel,
                    "seq": line.seq,
                    "line": line.line,
                });
                format!("{}\n", event)
            }
        }
    }
}

impl<W: Write + Send> OutputSink for ConsoleSink<W> {
    fn accept(&self, channel: Channel, line: String) {
        let mut state = self.lock();
        let line = OutputLine {
            channel,
            seq: state.next_seq,
            line,
        };
        state.next_seq += 1;

        let rendered = self.render(&line);
        let result = state
            .writer
            .write_all(rendered.as_bytes())
            .and_then(|_| state.writer.flush());
        if let Err(e) = result {
            state.failures += 1;
            tracing::trace!("dropped output line {}: {}", line.seq, e);
        }
    }

    fn write_failures(&self) -> u64 {
        self.lock().failures
    }
}

/// Sink that keeps every line in memory.
#[derive(Debug, Default)]
pub struct CaptureSink {
    lines: Mutex<Vec<OutputLine>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        CaptureSink::default()
    }

    /// Snapshot of all lines accepted so far, in sequence order.
    pub fn lines(&self) -> Vec<OutputLine> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Lines from one channel, in the order they were read.
    pub fn channel(&self, channel: Channel) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.channel == channel)
            .map(|l| l.line)
            .collect()
    }
}

impl OutputSink for CaptureSink {
    fn accept(&self, channel: Channel, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        let seq = lines.len() as u64;
        lines.push(OutputLine { channel, seq, line });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stderr_lines_are_prefixed() {
        let sink = ConsoleSink::new(Vec::new(), LineFormat::Human);
        sink.accept(Channel::Stdout, "hello".to_string());
        sink.accept(Channel::Stderr, "err1".to_string());

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "hello\nerr:err1\n");
    }

    #[test]
    fn test_json_format() {
        let sink = ConsoleSink::new(Vec::new(), LineFormat::Json);
        sink.accept(Channel::Stderr, "warning: unused".to_string());

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["reason"], "output-line");
        assert_eq!(value["channel"], "stderr");
        assert_eq!(value["seq"], 0);
        assert_eq!(value["line"], "warning: unused");
    }

    #[test]
    fn test_write_failure_is_recorded_not_raised() {
        let sink = ConsoleSink::new(BrokenPipe, LineFormat::Human);
        sink.accept(Channel::Stdout, "lost".to_string());
        sink.accept(Channel::Stderr, "also lost".to_string());

        assert_eq!(sink.write_failures(), 2);
    }

    #[test]
    fn test_capture_sequence_numbers() {
        let sink = CaptureSink::new();
        sink.accept(Channel::Stdout, "a".to_string());
        sink.accept(Channel::Stderr, "b".to_string());
        sink.accept(Channel::Stdout, "c".to_string());

        let seqs: Vec<u64> = sink.lines().iter().map(|l| l.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(sink.channel(Channel::Stdout), vec!["a", "c"]);
        assert_eq!(sink.channel(Channel::Stderr), vec!["b"]);
    }

    #[test]
    fn test_concurrent_lines_are_never_split() {
        let sink = Arc::new(ConsoleSink::new(Vec::new(), LineFormat::Human));

        let handles: Vec<_> = [Channel::Stdout, Channel::Stderr]
            .into_iter()
            .map(|channel| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for i in 0..500 {
                        sink.accept(channel, format!("{}-{:04}-{}", channel, i, "x".repeat(64)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let sink = Arc::try_unwrap(sink).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let mut stdout_seen = Vec::new();
        for line in out.lines() {
            if let Some(rest) = line.strip_prefix(STDERR_PREFIX) {
                assert!(rest.starts_with("stderr-"), "mangled line: {}", line);
            } else {
                assert!(line.starts_with("stdout-"), "mangled line: {}", line);
                stdout_seen.push(line[7..11].parse::<u32>().unwrap());
            }
            assert!(line.ends_with(&"x".repeat(64)));
        }
        assert_eq!(out.lines().count(), 1000);
        assert_eq!(stdout_seen, (0..500).collect::<Vec<_>>());
    }
}
