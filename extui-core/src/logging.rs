//! Tracing setup: JSON lines written through a rolling file appender.
//!
//! The host owns stdout and stderr, so logs never go to the terminal. Hold
//! the returned [`WorkerGuard`] for the life of the process; dropping it
//! flushes the background writer.

use std::panic::{self, PanicHookInfo};
use std::path::PathBuf;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub log_dir: PathBuf,
    pub log_file_prefix: CompactString,
    pub log_level: CompactString,
    pub max_log_files: usize,
    pub rotation: LogRotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Never,
    Daily,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: CompactString::const_new("extui"),
            log_level: CompactString::const_new("info"),
            max_log_files: 10,
            rotation: LogRotation::Daily,
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Logger already initialized")]
    AlreadyInitialized,

    #[error("Invalid log directory: {0}")]
    InvalidLogDirectory(String),

    #[error("Failed to create log directory: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub struct LoggerBuilder {
    config: LoggerConfig,
    debug: bool,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
            debug: false,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Debug mode lowers the crate filter to `debug` so diagnostics show up.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// `RUST_LOG` wins over the configured level when set.
    fn filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        let level = if self.debug {
            "debug"
        } else {
            self.config.log_level.as_str()
        };

        EnvFilter::try_new(format!("extui_core={level},extui_replay={level}"))
            .map_err(|e| LoggingError::ConfigError(e.to_string()))
    }

    pub fn build(self) -> Result<WorkerGuard, LoggingError> {
        validate_config(&self.config)?;
        std::fs::create_dir_all(&self.config.log_dir)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(self.config.rotation.into())
            .filename_prefix(self.config.log_file_prefix.as_str())
            .filename_suffix("jsonl")
            .max_log_files(self.config.max_log_files)
            .build(&self.config.log_dir)
            .map_err(|e| LoggingError::InvalidLogDirectory(e.to_string()))?;

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_current_span(false);

        tracing_subscriber::registry()
            .with(self.filter()?)
            .with(file_layer)
            .try_init()
            .map_err(|_| LoggingError::AlreadyInitialized)?;

        Ok(guard)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_config(config: &LoggerConfig) -> Result<(), LoggingError> {
    if config.log_dir.as_os_str().is_empty() {
        return Err(LoggingError::InvalidLogDirectory("empty path".into()));
    }

    if config.log_file_prefix.is_empty() {
        return Err(LoggingError::ConfigError("log_file_prefix is empty".into()));
    }

    if config.max_log_files == 0 {
        return Err(LoggingError::ConfigError("max_log_files must be > 0".into()));
    }

    Ok(())
}

pub fn init_logging(config: LoggerConfig, debug: bool) -> Result<WorkerGuard, LoggingError> {
    LoggerBuilder::new()
        .with_config(config)
        .with_debug(debug)
        .build()
}

/// Send panic reports to the log instead of stderr. Panics the dispatcher
/// isolates would otherwise still print through the default hook.
pub fn install_panic_hook() {
    panic::set_hook(Box::new(|panic_info: &PanicHookInfo<'_>| {
        error!(marker = "PANIC", "Panic caught: {panic_info}");
    }));
}
