//! Logging. `log::{debug,info,warn,error}!` calls go through a
//! `KernelLogger` that writes formatted lines to a `ConsoleSink` — the
//! console device itself is out of scope, so production wires the sink
//! to nothing callable without real MMIO, and tests wire it to a buffer.

use core::fmt::Write;
use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

/// Stands in for the real console subsystem. `write_str` is expected to
/// be infallible from the caller's point of view — a lost boot message
/// is not worth propagating a `Result` through every log call for.
pub trait ConsoleSink: Sync {
    fn write_str(&self, s: &str);
}

struct NullSink;
impl ConsoleSink for NullSink {
    fn write_str(&self, _s: &str) {}
}

static NULL_SINK: NullSink = NullSink;

struct KernelLogger {
    sink: Mutex<&'static dyn ConsoleSink>,
}

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), record.args());
        self.sink.lock().write_str(line.as_str());
    }

    fn flush(&self) {}
}

fn format_line(level: Level, args: &core::fmt::Arguments) -> LineBuf {
    let mut line = heapless_line();
    let _ = write!(line, "[{}] {}\n", level, args);
    line
}

/// A small stack buffer is enough for the short, single-line records
/// this kernel emits; anything longer is truncated rather than heap
/// allocated from inside the logging hot path.
struct LineBuf {
    buf: [u8; 256],
    len: usize,
}

fn heapless_line() -> LineBuf {
    LineBuf { buf: [0u8; 256], len: 0 }
}

impl LineBuf {
    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("<non-utf8 log line>")
    }
}

impl Write for LineBuf {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let n = bytes.len().min(self.buf.len() - self.len);
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        Ok(())
    }
}

static LOGGER: KernelLogger = KernelLogger { sink: Mutex::new(&NULL_SINK) };

/// Install the global logger, routed through `sink`. Idempotent beyond
/// the first call — `log::set_logger` only ever succeeds once per
/// process, matching `kmain`'s single-boot-path use.
pub fn init(sink: &'static dyn ConsoleSink) {
    *LOGGER.sink.lock() = sink;
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(LevelFilter::Info);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_line_includes_level_and_message() {
        let line = format_line(Level::Warn, &format_args!("hello {}", 42));
        assert_eq!(line.as_str(), "[WARN] hello 42\n");
    }

    #[test]
    fn format_line_truncates_past_the_buffer_cap() {
        let long = "x".repeat(300);
        let line = format_line(Level::Info, &format_args!("{}", long));
        assert_eq!(line.as_str().len(), 256);
    }

    #[test]
    fn null_sink_swallows_output_without_panicking() {
        NULL_SINK.write_str("anything");
    }
}
