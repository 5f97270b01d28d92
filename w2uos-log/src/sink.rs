use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::error::SinkError;
use crate::types::{LogColor, LogLevel, LogRecord};

/// Destination for rendered records.
///
/// A sink is only ever driven from one place at a time (the caller holding
/// the logger's sink lock, or the live logger's worker), so implementations
/// need to be `Send` but not `Sync`.
pub trait LogSink: Send {
    fn name(&self) -> &str;

    fn write(&mut self, record: &LogRecord) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writes to stdout, switching to stderr from `Error` upwards.
pub struct ConsoleSink {
    stdout: StandardStream,
    stderr: StandardStream,
    colors: bool,
}

impl ConsoleSink {
    pub fn new(colors: bool) -> Self {
        let choice = if colors {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self {
            stdout: StandardStream::stdout(choice),
            stderr: StandardStream::stderr(choice),
            colors,
        }
    }
}

fn term_color(color: LogColor) -> Option<Color> {
    match color {
        LogColor::Normal => None,
        LogColor::Green => Some(Color::Green),
        LogColor::Blue => Some(Color::Blue),
        LogColor::Magenta => Some(Color::Magenta),
        LogColor::Cyan => Some(Color::Cyan),
        LogColor::Yellow => Some(Color::Yellow),
        LogColor::Red => Some(Color::Red),
    }
}

impl LogSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn write(&mut self, record: &LogRecord) -> Result<(), SinkError> {
        let stream = if record.level() >= LogLevel::Error {
            &mut self.stderr
        } else {
            &mut self.stdout
        };

        let color = if self.colors {
            term_color(record.display_color())
        } else {
            None
        };
        if let Some(color) = color {
            stream.set_color(ColorSpec::new().set_fg(Some(color)))?;
            writeln!(stream, "{record}")?;
            stream.reset()?;
        } else {
            writeln!(stream, "{record}")?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.stdout.flush()?;
        self.stderr.flush()?;
        Ok(())
    }
}

/// Appends one rendered line per record to a rolling file.
pub struct FileSink {
    writer: RollingFileAppender,
    log_dir: PathBuf,
}

impl FileSink {
    /// Daily rotation under `log_dir`, file names starting with `prefix`.
    pub fn new(log_dir: &Path, prefix: &str) -> Result<Self, SinkError> {
        Self::with_rotation(log_dir, prefix, Rotation::DAILY)
    }

    pub fn with_rotation(log_dir: &Path, prefix: &str, rotation: Rotation) -> Result<Self, SinkError> {
        std::fs::create_dir_all(log_dir)?;
        let writer = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(prefix)
            .build(log_dir)?;
        Ok(Self {
            writer,
            log_dir: log_dir.to_path_buf(),
        })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

impl LogSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn write(&mut self, record: &LogRecord) -> Result<(), SinkError> {
        writeln!(self.writer, "{record}")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Shared view over the records captured by a [`MemorySink`].
#[derive(Clone, Debug, Default)]
pub struct LogStore {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl LogStore {
    pub fn records(&self) -> Vec<LogRecord> {
        lock(&self.records).clone()
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.records)
            .iter()
            .map(|r| r.message().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.records).clear();
    }

    fn push(&self, record: LogRecord) {
        lock(&self.records).push(record);
    }
}

/// Keeps every record in memory; mostly useful in tests and for UI tails.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    store: LogStore,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> LogStore {
        self.store.clone()
    }
}

impl LogSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write(&mut self, record: &LogRecord) -> Result<(), SinkError> {
        self.store.push(record.clone());
        Ok(())
    }
}

struct SinkSlot {
    sink: Box<dyn LogSink>,
    threshold: LogLevel,
}

/// Sinks with their individual thresholds.
#[derive(Default)]
pub(crate) struct SinkSet {
    slots: Vec<SinkSlot>,
}

impl SinkSet {
    pub(crate) fn push(&mut self, sink: Box<dyn LogSink>, threshold: LogLevel) {
        self.slots.push(SinkSlot { sink, threshold });
    }

    /// Lowest threshold across all sinks; `None` when there is nowhere to write.
    pub(crate) fn min_threshold(&self) -> Option<LogLevel> {
        self.slots.iter().map(|slot| slot.threshold).min()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Writes to every sink accepting the record's level. Failures are
    /// reported through `tracing` and never escape.
    pub(crate) fn dispatch(&mut self, record: &LogRecord) {
        for slot in &mut self.slots {
            if record.level() < slot.threshold {
                continue;
            }
            if let Err(err) = slot.sink.write(record) {
                warn!(sink = slot.sink.name(), %err, "log sink write failed");
            }
        }
    }

    pub(crate) fn flush(&mut self) {
        for slot in &mut self.slots {
            if let Err(err) = slot.sink.flush() {
                warn!(sink = slot.sink.name(), %err, "log sink flush failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogColor;
    use chrono::{DateTime, Utc};

    struct BrokenSink;

    impl LogSink for BrokenSink {
        fn name(&self) -> &str {
            "broken"
        }

        fn write(&mut self, _record: &LogRecord) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }

        fn flush(&mut self) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }
    }

    fn record(level: LogLevel, message: &str) -> LogRecord {
        LogRecord::new(
            DateTime::<Utc>::UNIX_EPOCH,
            level,
            "SINK_TEST",
            message,
            LogColor::Normal,
        )
    }

    #[test]
    fn sink_set_applies_per_sink_thresholds() {
        let console = MemorySink::new();
        let file = MemorySink::new();
        let (console_store, file_store) = (console.store(), file.store());

        let mut sinks = SinkSet::default();
        sinks.push(Box::new(console), LogLevel::Info);
        sinks.push(Box::new(file), LogLevel::Debug);
        assert_eq!(sinks.min_threshold(), Some(LogLevel::Debug));

        sinks.dispatch(&record(LogLevel::Debug, "debug only"));
        sinks.dispatch(&record(LogLevel::Warning, "both"));

        assert_eq!(console_store.messages(), vec!["both"]);
        assert_eq!(file_store.messages(), vec!["debug only", "both"]);
    }

    #[test]
    fn failing_sink_does_not_block_the_others() {
        let memory = MemorySink::new();
        let store = memory.store();

        let mut sinks = SinkSet::default();
        sinks.push(Box::new(BrokenSink), LogLevel::Verbose);
        sinks.push(Box::new(memory), LogLevel::Verbose);

        sinks.dispatch(&record(LogLevel::Info, "still delivered"));
        sinks.flush();

        assert_eq!(store.messages(), vec!["still delivered"]);
    }

    #[test]
    fn empty_sink_set_has_no_threshold() {
        let sinks = SinkSet::default();
        assert_eq!(sinks.min_threshold(), None);
        assert_eq!(sinks.len(), 0);
    }

    #[test]
    fn log_store_clear_empties_shared_view() {
        let mut sink = MemorySink::new();
        let store = sink.store();
        sink.write(&record(LogLevel::Info, "one")).unwrap();
        assert_eq!(store.len(), 1);
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn file_sink_writes_rendered_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut sink = FileSink::with_rotation(dir.path(), "test.log", Rotation::NEVER).expect("file sink");

        sink.write(&record(LogLevel::Info, "event one")).expect("write1");
        sink.write(&record(LogLevel::Warning, "event two")).expect("write2");
        sink.flush().expect("flush");

        let log_file = dir
            .path()
            .read_dir()
            .expect("read dir")
            .next()
            .expect("file")
            .expect("entry")
            .path();

        let contents = std::fs::read_to_string(log_file).expect("read log file");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[INF] SINK_TEST: event one"));
        assert!(lines[1].ends_with("[WRN] SINK_TEST: event two"));
    }

    #[test]
    fn console_sink_accepts_every_level() {
        let mut sink = ConsoleSink::new(false);
        for level in LogLevel::ALL {
            sink.write(&record(level, "console smoke")).expect("console write");
        }
        sink.flush().expect("flush");
    }
}
