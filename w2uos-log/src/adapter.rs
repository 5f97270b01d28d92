use std::fmt;
use std::sync::Arc;

use crate::error::LogError;
use crate::logger::LogDispatch;
use crate::types::{LogColor, LogLevel};

/// Named handle a component uses to log through a shared logger.
///
/// Cloning is cheap; all clones forward to the same logger.
#[derive(Clone)]
pub struct LoggerAdapter {
    component: String,
    logger: Arc<dyn LogDispatch>,
}

macro_rules! level_methods {
    ($($level:ident => $plain:ident, $colored:ident, $blocking:ident;)*) => {
        $(
            pub async fn $plain(&self, message: impl Into<String>) {
                self.log(LogLevel::$level, message, LogColor::Normal).await;
            }

            pub async fn $colored(&self, message: impl Into<String>, color: impl Into<LogColor>) {
                self.log(LogLevel::$level, message, color).await;
            }

            pub fn $blocking(&self, message: impl Into<String>) {
                self.log_blocking(LogLevel::$level, message, LogColor::Normal);
            }
        )*
    };
}

impl LoggerAdapter {
    pub fn new(component: impl Into<String>, logger: Arc<dyn LogDispatch>) -> Result<Self, LogError> {
        let component = component.into();
        if component.trim().is_empty() {
            return Err(LogError::InvalidComponentName);
        }
        Ok(Self { component, logger })
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.logger.is_enabled(level)
    }

    /// Forwards to the logger under this adapter's component name.
    /// Nothing is allocated when `level` is filtered out.
    pub async fn log(&self, level: LogLevel, message: impl Into<String>, color: impl Into<LogColor>) {
        if !self.logger.is_enabled(level) {
            return;
        }
        self.logger
            .dispatch(level, &self.component, message.into(), color.into())
            .await;
    }

    pub fn log_blocking(&self, level: LogLevel, message: impl Into<String>, color: impl Into<LogColor>) {
        if !self.logger.is_enabled(level) {
            return;
        }
        self.logger
            .dispatch_blocking(level, &self.component, message.into(), color.into());
    }

    level_methods! {
        Verbose => verbose, verbose_with_color, verbose_blocking;
        Debug => debug, debug_with_color, debug_blocking;
        Info => info, info_with_color, info_blocking;
        Warning => warning, warning_with_color, warning_blocking;
        Error => error, error_with_color, error_blocking;
        Critical => critical, critical_with_color, critical_blocking;
        Fatal => fatal, fatal_with_color, fatal_blocking;
    }
}

impl fmt::Debug for LoggerAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerAdapter")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Logger;
    use crate::sink::MemorySink;
    use w2uos_clock::TestClock;

    fn memory_logger(threshold: LogLevel) -> (Arc<Logger>, crate::sink::LogStore) {
        let sink = MemorySink::new();
        let store = sink.store();
        let logger = Logger::builder(Arc::new(TestClock::new()))
            .sink(sink, threshold)
            .build();
        (Arc::new(logger), store)
    }

    #[test]
    fn blank_component_names_are_rejected() {
        let (logger, _) = memory_logger(LogLevel::Verbose);
        for name in ["", "   ", "\t\n"] {
            let result = LoggerAdapter::new(name, logger.clone());
            assert!(matches!(result, Err(LogError::InvalidComponentName)));
        }
    }

    #[tokio::test]
    async fn each_level_method_tags_its_level() {
        let (logger, store) = memory_logger(LogLevel::Verbose);
        let adapter = LoggerAdapter::new("TEST_LOGGER", logger).unwrap();

        adapter.verbose("v").await;
        adapter.debug("d").await;
        adapter.info("i").await;
        adapter.warning("w").await;
        adapter.error("e").await;
        adapter.critical("c").await;
        adapter.fatal("f").await;

        let levels: Vec<LogLevel> = store.records().iter().map(|r| r.level()).collect();
        assert_eq!(levels, LogLevel::ALL.to_vec());
        assert!(store.records().iter().all(|r| r.component() == "TEST_LOGGER"));
    }

    #[tokio::test]
    async fn colored_variants_carry_the_hint() {
        let (logger, store) = memory_logger(LogLevel::Verbose);
        let adapter = LoggerAdapter::new("TEST_LOGGER", logger).unwrap();

        adapter.info_with_color("filled", LogColor::Green).await;
        adapter.debug_with_color("bad color", 30u8).await;

        let records = store.records();
        assert_eq!(records[0].color(), LogColor::Green);
        assert_eq!(records[1].color(), LogColor::Normal);
    }

    #[test]
    fn blocking_methods_write_through_sync_logger() {
        let (logger, store) = memory_logger(LogLevel::Info);
        let adapter = LoggerAdapter::new("THREAD", logger).unwrap();

        adapter.debug_blocking("filtered");
        adapter.warning_blocking("kept");

        assert_eq!(store.messages(), vec!["kept"]);
    }

    #[test]
    fn clones_share_the_logger() {
        let (logger, store) = memory_logger(LogLevel::Verbose);
        let adapter = LoggerAdapter::new("A", logger).unwrap();
        let clone = adapter.clone();

        adapter.info_blocking("one");
        clone.info_blocking("two");

        assert_eq!(store.len(), 2);
        assert_eq!(format!("{clone:?}"), "LoggerAdapter { component: \"A\", .. }");
    }
}
