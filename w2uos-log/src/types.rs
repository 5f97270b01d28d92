use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LogError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[serde(alias = "VRB", alias = "verbose")]
    Verbose,
    #[serde(alias = "DBG", alias = "debug")]
    Debug,
    #[serde(alias = "INF", alias = "info")]
    Info,
    #[serde(alias = "WRN", alias = "warning")]
    Warning,
    #[serde(alias = "ERR", alias = "error")]
    Error,
    #[serde(alias = "CRT", alias = "critical")]
    Critical,
    #[serde(alias = "FTL", alias = "fatal")]
    Fatal,
}

impl LogLevel {
    /// Every level, least severe first.
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Verbose,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
        LogLevel::Fatal,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            LogLevel::Verbose => "VRB",
            LogLevel::Debug => "DBG",
            LogLevel::Info => "INF",
            LogLevel::Warning => "WRN",
            LogLevel::Error => "ERR",
            LogLevel::Critical => "CRT",
            LogLevel::Fatal => "FTL",
        }
    }

    /// Parses a three-letter code. Matching is exact and case-sensitive.
    pub fn from_code(code: &str) -> Result<Self, LogError> {
        match code {
            "VRB" => Ok(LogLevel::Verbose),
            "DBG" => Ok(LogLevel::Debug),
            "INF" => Ok(LogLevel::Info),
            "WRN" => Ok(LogLevel::Warning),
            "ERR" => Ok(LogLevel::Error),
            "CRT" => Ok(LogLevel::Critical),
            "FTL" => Ok(LogLevel::Fatal),
            other => Err(LogError::InvalidLevelCode(other.to_string())),
        }
    }

    /// Case-insensitive lookup by full name, e.g. `"warning"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "verbose" => Some(LogLevel::Verbose),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            "critical" => Some(LogLevel::Critical),
            "fatal" => Some(LogLevel::Fatal),
            _ => None,
        }
    }

    /// Color used for display when the caller gave no hint.
    pub fn default_color(&self) -> LogColor {
        match self {
            LogLevel::Warning => LogColor::Yellow,
            LogLevel::Error | LogLevel::Critical | LogLevel::Fatal => LogColor::Red,
            _ => LogColor::Normal,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LogLevel {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::from_code(s)
    }
}

/// Display hint attached to a record. `Normal` means no color.
///
/// Conversions from raw values are lenient: anything outside the known set
/// becomes `Normal` so a cosmetic argument can never fail a log call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogColor {
    #[default]
    Normal,
    Green,
    Blue,
    Magenta,
    Cyan,
    Yellow,
    Red,
}

impl LogColor {
    pub fn code(&self) -> u8 {
        match self {
            LogColor::Normal => 0,
            LogColor::Green => 1,
            LogColor::Blue => 2,
            LogColor::Magenta => 3,
            LogColor::Cyan => 4,
            LogColor::Yellow => 5,
            LogColor::Red => 6,
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, LogColor::Normal)
    }
}

impl From<u8> for LogColor {
    fn from(code: u8) -> Self {
        match code {
            1 => LogColor::Green,
            2 => LogColor::Blue,
            3 => LogColor::Magenta,
            4 => LogColor::Cyan,
            5 => LogColor::Yellow,
            6 => LogColor::Red,
            _ => LogColor::Normal,
        }
    }
}

impl From<&str> for LogColor {
    fn from(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "green" => LogColor::Green,
            "blue" => LogColor::Blue,
            "magenta" => LogColor::Magenta,
            "cyan" => LogColor::Cyan,
            "yellow" => LogColor::Yellow,
            "red" => LogColor::Red,
            _ => LogColor::Normal,
        }
    }
}

impl From<Option<LogColor>> for LogColor {
    fn from(color: Option<LogColor>) -> Self {
        color.unwrap_or_default()
    }
}

/// One log line. Immutable once built by a logger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    timestamp: DateTime<Utc>,
    level: LogLevel,
    component: String,
    message: String,
    color: LogColor,
    thread: Option<String>,
}

impl LogRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        level: LogLevel,
        component: impl Into<String>,
        message: impl Into<String>,
        color: LogColor,
    ) -> Self {
        Self {
            timestamp,
            level,
            component: component.into(),
            message: message.into(),
            color,
            thread: None,
        }
    }

    pub fn with_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = Some(thread.into());
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn color(&self) -> LogColor {
        self.color
    }

    pub fn thread(&self) -> Option<&str> {
        self.thread.as_deref()
    }

    /// The hint to render with: the record's own color, else the level default.
    pub fn display_color(&self) -> LogColor {
        if self.color.is_normal() {
            self.level.default_color()
        } else {
            self.color
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.level.code()
        )?;
        if let Some(thread) = &self.thread {
            write!(f, "[{}] ", thread)?;
        }
        write!(f, "{}: {}", self.component, self.message)
    }
}
