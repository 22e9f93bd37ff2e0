//! Line-by-line draining of one child output channel.

use std::io::{self, BufRead, BufReader, Read};

use super::sink::{Channel, OutputSink};

/// Counters for one finished drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Lines forwarded to the sink.
    pub lines: u64,
    /// Lines that contained invalid UTF-8 and were decoded lossily.
    pub lossy_lines: u64,
    /// Bytes read from the channel.
    pub bytes: u64,
}

/// Read `reader` to end-of-stream, forwarding each line to `sink`.
///
/// Lines end at `\n`; a trailing `\r` is dropped as well. A final line without
/// a terminator is still forwarded. Invalid UTF-8 is replaced with U+FFFD.
pub fn drain<R: Read>(reader: R, channel: Channel, sink: &dyn OutputSink) -> DrainStats {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    let mut stats = DrainStats::default();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(n) => {
                stats.bytes += n as u64;
                trim_line_ending(&mut buf);

                let line = match String::from_utf8(std::mem::take(&mut buf)) {
                    Ok(line) => line,
                    Err(e) => {
                        stats.lossy_lines += 1;
                        String::from_utf8_lossy(e.as_bytes()).into_owned()
                    }
                };
                sink.accept(channel, line);
                stats.lines += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("stopped reading child {}: {}", channel, e);
                break;
            }
        }
    }

    if stats.lossy_lines > 0 {
        tracing::debug!(
            "{} line(s) on child {} were not valid UTF-8",
            stats.lossy_lines,
            channel
        );
    }

    stats
}

fn trim_line_ending(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}
