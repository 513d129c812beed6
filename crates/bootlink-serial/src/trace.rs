//! Byte-level tracing of transport traffic
//!
//! Traces go to the `log` facade at `trace` level, each prefixed with the
//! milliseconds elapsed since the previous trace line.

use std::fmt::{self, Write as _};
use std::time::Instant;

/// Bytes per hex dump line
const LINE_WIDTH: usize = 16;

/// Emits timestamped trace lines when enabled
///
/// The timestamp on each line is the delta since the previous trace line
/// from this tracer (since creation for the first line), not the time
/// since the transport was created.
#[derive(Debug)]
pub struct Tracer {
    enabled: bool,
    last: Instant,
}

impl Tracer {
    /// Create a tracer; a disabled tracer discards everything
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last: Instant::now(),
        }
    }

    /// Whether trace lines are emitted
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Turn tracing on or off
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Log `message` with the time since the previous trace
    pub fn trace(&mut self, message: fmt::Arguments<'_>) {
        if !self.enabled {
            return;
        }
        let now = Instant::now();
        let delta = now.duration_since(self.last);
        self.last = now;
        log::trace!("TRACE {:.3} {}", delta.as_secs_f64() * 1000.0, message);
    }

    /// Trace a labelled buffer with its hex dump
    pub fn bytes(&mut self, label: &str, data: &[u8]) {
        if self.enabled {
            self.trace(format_args!("{} {} bytes: {}", label, data.len(), hex_dump(data)));
        }
    }
}

fn hexify(data: &[u8]) -> String {
    data.iter().fold(String::with_capacity(data.len() * 2), |mut s, b| {
        let _ = write!(s, "{:02X}", b);
        s
    })
}

/// Format `data` for a trace line
///
/// Up to 16 bytes render as contiguous uppercase hex. Longer buffers render
/// as one indented line per 16 bytes, split into two groups of eight and
/// followed by an ASCII column.
pub fn hex_dump(data: &[u8]) -> String {
    if data.len() <= LINE_WIDTH {
        return hexify(data);
    }

    let mut out = String::new();
    for line in data.chunks(LINE_WIDTH) {
        let (left, right) = line.split_at(line.len().min(LINE_WIDTH / 2));
        let ascii: String = line
            .iter()
            .map(|&b| {
                if (0x20..=0x7E).contains(&b) {
                    b as char
                } else {
                    '.'
                }
            })
            .collect();
        let _ = write!(out, "\n    {} {} | {}", hexify(left), hexify(right), ascii);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_dump() {
        assert_eq!(hex_dump(&[]), "");
        assert_eq!(hex_dump(&[0x01, 0xAB, 0xC0]), "01ABC0");
        assert_eq!(hex_dump(&[0xFF; 16]), "FF".repeat(16));
    }

    #[test]
    fn test_long_dump() {
        let mut data: Vec<u8> = (0u8..16).collect();
        data.extend_from_slice(b"OK!\x07");
        let dump = hex_dump(&data);
        assert_eq!(
            dump,
            "\n    0001020304050607 08090A0B0C0D0E0F | ................\
             \n    4F4B2107  | OK!."
        );
    }

    #[test]
    fn test_delta_restarts_each_line() {
        let mut tracer = Tracer::new(true);
        let created = tracer.last;
        std::thread::sleep(std::time::Duration::from_millis(2));
        tracer.bytes("Write", &[0x00]);
        let first = tracer.last;
        assert!(first > created);

        std::thread::sleep(std::time::Duration::from_millis(2));
        tracer.trace(format_args!("second"));
        assert!(tracer.last > first);
    }

    #[test]
    fn test_disabled_tracer_is_quiet() {
        let mut tracer = Tracer::new(false);
        let before = tracer.last;
        tracer.bytes("Write", &[0x00]);
        assert_eq!(tracer.last, before);
        assert!(!tracer.enabled());
    }
}
