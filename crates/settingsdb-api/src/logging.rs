//! Logging configuration for SettingsDB
//!
//! Storage, snapshot and collection code emit `tracing` events. This module
//! installs a subscriber for applications that do not bring their own.

use settingsdb_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "settingsdb.log";

/// Log output destination
#[derive(Debug, Clone)]
pub enum LogOutput {
    /// Output to stdout
    Stdout,
    /// Output to a daily-rolling file
    File(PathBuf),
    /// Output to both stdout and file
    Both(PathBuf),
}

/// Log format style
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    /// Human-readable multi-line format (default)
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level filter, in `EnvFilter` syntax
    pub level: String,
    /// Output destination
    pub output: LogOutput,
    /// Format style
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Stdout,
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// Info level, stdout
    pub fn info() -> Self {
        Self::default()
    }

    /// Debug level, stdout. Shows every transaction and save.
    pub fn debug() -> Self {
        Self::default().with_level("debug")
    }

    /// Trace level, stdout. Also shows per-key reconciliation.
    pub fn trace() -> Self {
        Self::default().with_level("trace")
    }

    /// Warn level, stdout. Shows lock contention and commit failures.
    pub fn warn() -> Self {
        Self::default().with_level("warn")
    }

    /// Set log output to a daily-rolling file
    pub fn with_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::File(path.into());
        self
    }

    /// Set log output to both stdout and file
    pub fn with_both<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::Both(path.into());
        self
    }

    /// Set log format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set log level filter
    pub fn with_level<S: Into<String>>(mut self, level: S) -> Self {
        self.level = level.into();
        self
    }

    /// Install this configuration as the global subscriber.
    ///
    /// `RUST_LOG` overrides the configured level when set. For file output
    /// the returned guard must be kept alive; dropping it flushes and stops
    /// the writer thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the level is not a valid filter or
    /// a global subscriber is already installed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use settingsdb::logging::LogConfig;
    ///
    /// let _guard = LogConfig::debug().with_file("./logs/settingsdb.log").init()?;
    /// # Ok::<(), settingsdb::Error>(())
    /// ```
    pub fn init(self) -> Result<Option<WorkerGuard>> {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.level).map_err(|e| {
                Error::InvalidInput(format!("Invalid log level '{}': {}", self.level, e))
            })?,
        };

        let registry = tracing_subscriber::registry().with(env_filter);

        match self.output {
            LogOutput::Stdout => {
                match self.format {
                    LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
                    LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
                }
                .map_err(already_installed)?;
                Ok(None)
            }
            LogOutput::File(path) => {
                let (writer, guard) = rolling_writer(&path);
                match self.format {
                    LogFormat::Pretty => registry
                        .with(fmt::layer().with_writer(writer).with_ansi(false).pretty())
                        .try_init(),
                    LogFormat::Compact => registry
                        .with(fmt::layer().with_writer(writer).with_ansi(false).compact())
                        .try_init(),
                }
                .map_err(already_installed)?;
                Ok(Some(guard))
            }
            LogOutput::Both(path) => {
                let (writer, guard) = rolling_writer(&path);
                // Format choice applies to stdout only
                registry
                    .with(fmt::layer())
                    .with(fmt::layer().with_writer(writer).with_ansi(false))
                    .try_init()
                    .map_err(already_installed)?;
                Ok(Some(guard))
            }
        }
    }
}

fn rolling_writer(path: &Path) -> (NonBlocking, WorkerGuard) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);
    tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name))
}

fn already_installed(err: impl std::fmt::Display) -> Error {
    Error::InvalidInput(format!("Logging already initialized: {}", err))
}
