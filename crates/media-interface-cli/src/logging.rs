//! Structured logging system using tracing.
//!
//! Provides configurable logging with:
//! - Human-readable diagnostics on stderr (stdout carries the JSON response)
//! - Verbosity from `-v` flags, overridable through `RUST_LOG`
//! - Optional JSON log files with rotation

use std::io::IsTerminal;
use std::path::PathBuf;

use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging configuration options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for JSON log files; no file logging when unset.
    pub log_directory: Option<PathBuf>,
    /// Log file name prefix (e.g., "media-interface" -> "media-interface.2024-01-15").
    pub log_file_prefix: String,
    /// Maximum level of this tool's own console output.
    pub console_level: Level,
    /// Maximum level of this tool's own file output.
    pub file_level: Level,
    /// How often to rotate log files.
    pub rotation: LogRotation,
    /// Whether to include ANSI color codes in console output.
    pub console_ansi: bool,
    /// Whether to include file/line info in console output.
    pub include_file_line: bool,
}

/// Log rotation frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    /// Create a new log file every hour.
    Hourly,
    /// Create a new log file every day.
    Daily,
    /// Never rotate (single log file).
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Hourly => Self::HOURLY,
            LogRotation::Daily => Self::DAILY,
            LogRotation::Never => Self::NEVER,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_directory: None,
            log_file_prefix: "media-interface".to_string(),
            console_level: Level::WARN,
            file_level: Level::DEBUG,
            rotation: LogRotation::Daily,
            console_ansi: std::io::stderr().is_terminal(),
            include_file_line: false,
        }
    }
}

impl LoggingConfig {
    /// Console level for a `-v` count: warn, info, debug, then trace.
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let console_level = match verbosity {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            console_level,
            include_file_line: verbosity >= 3,
            ..Self::default()
        }
    }

    /// Also write JSON logs into `path`.
    #[must_use]
    pub fn with_log_directory(mut self, path: PathBuf) -> Self {
        self.log_directory = Some(path);
        self
    }

    /// Set the console log level.
    #[must_use]
    pub const fn with_console_level(mut self, level: Level) -> Self {
        self.console_level = level;
        self
    }

    /// Set the file log level.
    #[must_use]
    pub const fn with_file_level(mut self, level: Level) -> Self {
        self.file_level = level;
        self
    }

    /// Set the log rotation frequency.
    #[must_use]
    pub const fn with_rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Guard that keeps file logging active. Drop this to flush and close log files.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialize the logging system with the given configuration.
///
/// Returns a guard that must be kept alive for the duration of the program.
/// When the guard is dropped, any pending log entries are flushed to disk.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created, a filter is
/// invalid, or logging was already initialized.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    // RUST_LOG overrides the verbosity flags for the console
    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => crate_filter(config.console_level)?,
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.console_ansi)
        .with_target(false)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_filter(console_filter);

    let (file_layer, file_guard) = match &config.log_directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).map_err(|e| {
                LoggingError::DirectoryCreationFailed {
                    path: directory.clone(),
                    reason: e.to_string(),
                }
            })?;
            let file_appender = RollingFileAppender::new(
                config.rotation.into(),
                directory,
                &config.log_file_prefix,
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(crate_filter(config.file_level)?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Filter that lets this tool's crates through at `level` and everything else at warn.
fn crate_filter(level: Level) -> Result<EnvFilter, LoggingError> {
    let level = level_to_directive(level);
    let directives = format!("warn,media_interface={level},media_interface_core={level}");
    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
        directives,
        reason: e.to_string(),
    })
}

/// Convert a tracing Level to a filter directive string.
const fn level_to_directive(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Errors that can occur during logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to create the log directory.
    #[error("Failed to create log directory {path}: {reason}")]
    DirectoryCreationFailed {
        /// The path that could not be created.
        path: PathBuf,
        /// The reason for the failure.
        reason: String,
    },

    /// A filter directive did not parse.
    #[error("Invalid log filter '{directives}': {reason}")]
    InvalidFilter {
        /// The directives that were rejected.
        directives: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber was already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}
