use std::io;

/// Construction and parsing errors surfaced to callers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LogError {
    #[error("invalid log level code: {0:?}")]
    InvalidLevelCode(String),

    #[error("component name must not be blank")]
    InvalidComponentName,

    #[error("log queue capacity must be at least 1")]
    InvalidQueueCapacity,
}

/// A sink failed to persist or render a record.
///
/// Never reaches the code that issued the log call.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("failed to initialise sink: {0}")]
    Init(#[from] tracing_appender::rolling::InitError),

    #[error("sink closed")]
    Closed,
}
