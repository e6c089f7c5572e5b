//! Simple logger for the scheduler core
//!
//! Formats `[LEVEL] message` into a stack buffer and hands the line to a
//! console sink installed once at boot. Nothing is allocated on the logging
//! path, so it is safe to log with scheduler locks held.

use core::fmt::{self, Write};

use log::{Level, LevelFilter, Metadata, Record};
use spin::Once;

/// Longest line emitted; the rest is cut
const LINE_CAPACITY: usize = 256;

/// Console sink receiving formatted lines
pub type Sink = fn(&str);

static SINK: Once<Sink> = Once::new();

/// Logger writing through the installed sink
struct SimpleLogger;

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(sink) = SINK.get() else {
            return;
        };

        let mut buf = [0u8; LINE_CAPACITY];
        let len = format_line(&mut buf, record.level(), *record.args());
        sink(as_str(&buf[..len]));
    }

    fn flush(&self) {}
}

/// Buffer writer for formatting without alloc; silently truncates
pub struct BufferWriter<'a> {
    pub buffer: &'a mut [u8],
    pub pos: usize,
}

impl Write for BufferWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buffer.len() - self.pos;
        let to_write = bytes.len().min(remaining);

        if to_write > 0 {
            self.buffer[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
            self.pos += to_write;
        }

        Ok(())
    }
}

fn level_str(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// Format one `[LEVEL] message\n` line into `buf`; returns its length
pub fn format_line(buf: &mut [u8], level: Level, args: fmt::Arguments<'_>) -> usize {
    let mut writer = BufferWriter { buffer: buf, pos: 0 };
    let _ = writeln!(writer, "[{}] {}", level_str(level), args);
    writer.pos
}

/// Longest valid UTF-8 prefix (truncation may split a character)
fn as_str(bytes: &[u8]) -> &str {
    match core::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    }
}

static LOGGER: SimpleLogger = SimpleLogger;

/// Install the logger with `sink` as console.
///
/// Only the first call installs anything; later calls just adjust the level.
pub fn init(sink: Sink, level: LevelFilter) {
    SINK.call_once(|| sink);
    if log::set_logger(&LOGGER).is_err() {
        log::warn!("[LOGGER] logger already installed");
    }
    log::set_max_level(level);
}
