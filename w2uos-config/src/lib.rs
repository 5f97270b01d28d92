use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;
use w2uos_clock::Clock;
use w2uos_log::{FileSink, LiveLogger, LogLevel, Logger, LoggerBuilder, DEFAULT_QUEUE_CAPACITY};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level_console: LogLevel,
    pub level_file: LogLevel,
    /// Directory for the rolling log file; no file sink when unset.
    pub log_path: Option<PathBuf>,
    pub file_prefix: String,
    pub queue_capacity: usize,
    pub colors: bool,
    pub log_thread: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level_console: LogLevel::Info,
            level_file: LogLevel::Debug,
            log_path: None,
            file_prefix: "w2uos.log".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            colors: true,
            log_thread: false,
        }
    }
}

impl LoggingConfig {
    /// Builder carrying the configured sinks and flags.
    pub fn builder(&self, clock: Arc<dyn Clock>) -> Result<LoggerBuilder> {
        let mut builder = LoggerBuilder::new(clock)
            .console(self.level_console)
            .colors(self.colors)
            .log_thread(self.log_thread)
            .queue_capacity(self.queue_capacity);
        if let Some(dir) = &self.log_path {
            let sink = FileSink::new(dir, &self.file_prefix)?;
            builder = builder.sink(sink, self.level_file);
        }
        Ok(builder)
    }

    pub fn logger(&self, clock: Arc<dyn Clock>) -> Result<Logger> {
        Ok(self.builder(clock)?.build())
    }

    pub fn live_logger(&self, clock: Arc<dyn Clock>) -> Result<LiveLogger> {
        Ok(self.builder(clock)?.build_live()?)
    }
}

/// Top-level configuration file. Unknown tables are ignored so the logging
/// section can live in a larger node config.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogPipelineConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LogPipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let value = load_value(path)?;
        let mut cfg: LogPipelineConfig = value.try_into()?;
        apply_env_overrides(&mut cfg.logging);
        Ok(cfg)
    }

    /// Loads `base_path`, then merges `config.<env>.toml` from the same
    /// directory when it exists. The env name falls back to `NODE_ENV`.
    pub fn load_with_env(base_path: &Path, env_name: Option<String>) -> Result<Self> {
        let env_name = env_name.or_else(|| std::env::var("NODE_ENV").ok());
        load_layered(base_path, env_name.as_deref(), |key| std::env::var(key).ok())
    }
}

fn load_layered(
    base_path: &Path,
    env_name: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<LogPipelineConfig> {
    let mut merged = load_value(base_path)?;
    if let Some(env) = env_name {
        let env_path = env_config_path(base_path, env);
        if env_path.exists() {
            let overlay = load_value(&env_path)?;
            merge_toml(&mut merged, overlay);
        }
    }

    let mut cfg: LogPipelineConfig = merged.try_into()?;
    apply_overrides(&mut cfg.logging, lookup);
    Ok(cfg)
}

fn load_value(path: &Path) -> Result<toml::Value> {
    let contents = std::fs::read_to_string(path)?;
    match path.extension().and_then(|s| s.to_str()) {
        Some("yaml" | "yml") => {
            let json_value: JsonValue = serde_yaml::from_str(&contents)?;
            let toml_string = toml::to_string(&json_value)?;
            Ok(toml::from_str(&toml_string)?)
        }
        _ => Ok(toml::from_str(&contents)?),
    }
}

fn env_config_path(base_path: &Path, env: &str) -> PathBuf {
    match base_path.parent() {
        Some(parent) => parent.join(format!("config.{env}.toml")),
        None => PathBuf::from(format!("config.{env}.toml")),
    }
}

fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    use toml::Value;
    match (base, overlay) {
        (Value::Table(base_map), Value::Table(overlay_map)) => {
            for (k, v) in overlay_map {
                match base_map.get_mut(&k) {
                    Some(base_val) => merge_toml(base_val, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (base_slot, overlay_val) => {
            *base_slot = overlay_val;
        }
    }
}

pub fn apply_env_overrides(cfg: &mut LoggingConfig) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

/// Applies `W2UOS_LOG_*` overrides read through `lookup`. Values that fail
/// to parse are skipped with a warning.
pub fn apply_overrides(cfg: &mut LoggingConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(raw) = lookup("W2UOS_LOG_LEVEL") {
        match parse_level(&raw) {
            Some(level) => cfg.level_console = level,
            None => warn!(var = "W2UOS_LOG_LEVEL", value = %raw, "ignoring unknown log level"),
        }
    }
    if let Some(raw) = lookup("W2UOS_LOG_FILE_LEVEL") {
        match parse_level(&raw) {
            Some(level) => cfg.level_file = level,
            None => warn!(var = "W2UOS_LOG_FILE_LEVEL", value = %raw, "ignoring unknown log level"),
        }
    }
    if let Some(path) = lookup("W2UOS_LOG_PATH") {
        cfg.log_path = if path.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        };
    }
    if let Some(raw) = lookup("W2UOS_LOG_QUEUE_CAPACITY") {
        match raw.trim().parse::<usize>() {
            Ok(capacity) if capacity > 0 => cfg.queue_capacity = capacity,
            _ => warn!(var = "W2UOS_LOG_QUEUE_CAPACITY", value = %raw, "ignoring invalid queue capacity"),
        }
    }
    if let Some(raw) = lookup("W2UOS_LOG_COLORS") {
        match parse_flag(&raw) {
            Some(flag) => cfg.colors = flag,
            None => warn!(var = "W2UOS_LOG_COLORS", value = %raw, "ignoring invalid flag"),
        }
    }
    if let Some(raw) = lookup("W2UOS_LOG_THREAD") {
        match parse_flag(&raw) {
            Some(flag) => cfg.log_thread = flag,
            None => warn!(var = "W2UOS_LOG_THREAD", value = %raw, "ignoring invalid flag"),
        }
    }
}

fn parse_level(raw: &str) -> Option<LogLevel> {
    let raw = raw.trim();
    LogLevel::from_code(raw).ok().or_else(|| LogLevel::from_name(raw))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
