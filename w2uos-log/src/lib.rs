//! Leveled logging for W2UOS components.
//!
//! Components log through a [`LoggerAdapter`] bound to a shared logger.
//! [`Logger`] writes on the calling thread; [`LiveLogger`] moves writes onto
//! a background task behind a bounded queue and applies backpressure when
//! producers outpace the sinks.

pub mod adapter;
pub mod error;
pub mod live;
pub mod logger;
pub mod sink;
pub mod types;

pub use adapter::LoggerAdapter;
pub use error::{LogError, SinkError};
pub use live::LiveLogger;
pub use logger::{LogDispatch, Logger, LoggerBuilder, PreStartPolicy, DEFAULT_QUEUE_CAPACITY};
pub use sink::{ConsoleSink, FileSink, LogSink, LogStore, MemorySink};
pub use tracing_appender::rolling::Rotation;
pub use types::{LogColor, LogLevel, LogRecord};
