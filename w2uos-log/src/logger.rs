use std::sync::{Arc, Mutex};

use w2uos_clock::Clock;
use w2uos_service::ServiceId;

use crate::error::LogError;
use crate::live::LiveLogger;
use crate::sink::{lock, ConsoleSink, LogSink, SinkSet};
use crate::types::{LogColor, LogLevel, LogRecord};

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Anything a [`LoggerAdapter`](crate::LoggerAdapter) can forward to.
#[async_trait::async_trait]
pub trait LogDispatch: Send + Sync {
    /// Cheap pre-check so callers can skip building disabled messages.
    fn is_enabled(&self, level: LogLevel) -> bool;

    async fn dispatch(&self, level: LogLevel, component: &str, message: String, color: LogColor);

    /// Entry point for plain OS threads that are not running inside the async runtime.
    fn dispatch_blocking(&self, level: LogLevel, component: &str, message: String, color: LogColor);
}

/// What a live logger does with calls made before its first `start()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PreStartPolicy {
    /// Write straight to the sinks on the calling thread, like [`Logger`].
    #[default]
    DirectWrite,
    /// Drop the call without building a record.
    Discard,
}

/// Threshold check plus record construction, shared by both logger flavours.
pub(crate) struct RecordFactory {
    clock: Arc<dyn Clock>,
    min_level: Option<LogLevel>,
    colors: bool,
    log_thread: bool,
}

impl RecordFactory {
    pub(crate) fn is_enabled(&self, level: LogLevel) -> bool {
        self.min_level.is_some_and(|min| level >= min)
    }

    /// Stamps a record with the clock. Callers check `is_enabled` first.
    pub(crate) fn record(&self, level: LogLevel, component: &str, message: String, color: LogColor) -> LogRecord {
        let color = if self.colors { color } else { LogColor::Normal };
        let record = LogRecord::new(self.clock.now(), level, component, message, color);
        if !self.log_thread {
            return record;
        }
        match std::thread::current().name() {
            Some(name) => record.with_thread(name),
            None => record.with_thread(format!("{:?}", std::thread::current().id())),
        }
    }
}

/// Configures sinks and flags before producing a [`Logger`] or [`LiveLogger`].
pub struct LoggerBuilder {
    clock: Arc<dyn Clock>,
    sinks: SinkSet,
    console: Option<LogLevel>,
    colors: bool,
    log_thread: bool,
    queue_capacity: usize,
    pre_start: PreStartPolicy,
    id: ServiceId,
}

impl LoggerBuilder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            sinks: SinkSet::default(),
            console: None,
            colors: true,
            log_thread: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pre_start: PreStartPolicy::default(),
            id: "logger".to_string(),
        }
    }

    /// Adds a [`ConsoleSink`] receiving `level` and above.
    pub fn console(mut self, level: LogLevel) -> Self {
        self.console = Some(level);
        self
    }

    pub fn sink(mut self, sink: impl LogSink + 'static, threshold: LogLevel) -> Self {
        self.sinks.push(Box::new(sink), threshold);
        self
    }

    pub fn boxed_sink(mut self, sink: Box<dyn LogSink>, threshold: LogLevel) -> Self {
        self.sinks.push(sink, threshold);
        self
    }

    pub fn colors(mut self, enabled: bool) -> Self {
        self.colors = enabled;
        self
    }

    pub fn log_thread(mut self, enabled: bool) -> Self {
        self.log_thread = enabled;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn pre_start(mut self, policy: PreStartPolicy) -> Self {
        self.pre_start = policy;
        self
    }

    pub fn id(mut self, id: impl Into<ServiceId>) -> Self {
        self.id = id.into();
        self
    }

    pub(crate) fn into_parts(mut self) -> (RecordFactory, SinkSet, LiveSettings) {
        if let Some(level) = self.console {
            self.sinks.push(Box::new(ConsoleSink::new(self.colors)), level);
        }
        let factory = RecordFactory {
            clock: self.clock,
            min_level: self.sinks.min_threshold(),
            colors: self.colors,
            log_thread: self.log_thread,
        };
        let settings = LiveSettings {
            id: self.id,
            capacity: self.queue_capacity,
            pre_start: self.pre_start,
        };
        (factory, self.sinks, settings)
    }

    pub fn build(self) -> Logger {
        let (factory, sinks, _) = self.into_parts();
        Logger {
            factory,
            sinks: Mutex::new(sinks),
        }
    }

    pub fn build_live(self) -> Result<LiveLogger, LogError> {
        if self.queue_capacity == 0 {
            return Err(LogError::InvalidQueueCapacity);
        }
        let (factory, sinks, settings) = self.into_parts();
        Ok(LiveLogger::from_parts(factory, sinks, settings))
    }
}

pub(crate) struct LiveSettings {
    pub(crate) id: ServiceId,
    pub(crate) capacity: usize,
    pub(crate) pre_start: PreStartPolicy,
}

/// Synchronous logger: every accepted call is written before it returns.
pub struct Logger {
    factory: RecordFactory,
    sinks: Mutex<SinkSet>,
}

impl Logger {
    /// Console-only logger passing `level_console` and above.
    pub fn new(clock: Arc<dyn Clock>, level_console: LogLevel) -> Self {
        LoggerBuilder::new(clock).console(level_console).build()
    }

    pub fn builder(clock: Arc<dyn Clock>) -> LoggerBuilder {
        LoggerBuilder::new(clock)
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.factory.is_enabled(level)
    }

    pub fn log(&self, level: LogLevel, component: &str, message: impl Into<String>, color: LogColor) {
        if !self.is_enabled(level) {
            return;
        }
        let record = self.factory.record(level, component, message.into(), color);
        lock(&self.sinks).dispatch(&record);
    }

    pub fn flush(&self) {
        lock(&self.sinks).flush();
    }
}

#[async_trait::async_trait]
impl LogDispatch for Logger {
    fn is_enabled(&self, level: LogLevel) -> bool {
        Logger::is_enabled(self, level)
    }

    async fn dispatch(&self, level: LogLevel, component: &str, message: String, color: LogColor) {
        self.log(level, component, message, color);
    }

    fn dispatch_blocking(&self, level: LogLevel, component: &str, message: String, color: LogColor) {
        self.log(level, component, message, color);
    }
}
