//! Exposure logging backends.
//!
//! Experiments hand every exposure or custom event to an [`ExposureLogger`]
//! as `(level, message, payload)`. Where the record ends up (the `log`
//! facade, memory, a JSON-lines file or nowhere) is up to the backend.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use abl_core::errors::{AblError, ErrorInfo};
use abl_core::serde::to_canonical_json_bytes;
use log::Level;
use serde::Serialize;
use serde_json::Value;

/// Target used when exposures are forwarded to the `log` facade.
pub const EXPOSURE_TARGET: &str = "abl::exposure";

/// Level names accepted by [`parse_log_level`].
pub const ALLOWED_LOG_LEVELS: [&str; 8] = [
    "emergency",
    "alert",
    "critical",
    "error",
    "warning",
    "notice",
    "info",
    "debug",
];

/// Maps a syslog-style level name onto the `log` crate's levels.
pub fn parse_log_level(name: &str) -> Result<Level, AblError> {
    match name {
        "emergency" | "alert" | "critical" | "error" => Ok(Level::Error),
        "warning" => Ok(Level::Warn),
        "notice" | "info" => Ok(Level::Info),
        "debug" => Ok(Level::Debug),
        other => Err(AblError::Config(
            ErrorInfo::new(
                "invalid-log-level",
                format!("log level must be one of the allowed levels, not {other}"),
            )
            .with_context("level", other)
            .with_hint(ALLOWED_LOG_LEVELS.join(", ")),
        )),
    }
}

/// Sink for experiment exposure and event records.
pub trait ExposureLogger: Send + Sync {
    /// Records one event.
    fn log(&self, level: Level, message: &str, payload: &Value) -> Result<(), AblError>;
}

/// A captured log call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// Level the record was emitted at.
    pub level: Level,
    /// Rendered message.
    pub message: String,
    /// Structured payload.
    pub payload: Value,
}

/// Forwards records to the `log` facade under [`EXPOSURE_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FacadeLogger;

impl ExposureLogger for FacadeLogger {
    fn log(&self, level: Level, message: &str, payload: &Value) -> Result<(), AblError> {
        log::log!(target: EXPOSURE_TARGET, level, "{message} {payload}");
        Ok(())
    }
}

/// Drops every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl ExposureLogger for NullLogger {
    fn log(&self, _level: Level, _message: &str, _payload: &Value) -> Result<(), AblError> {
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    /// Creates an empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out everything captured so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Number of captured records.
    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    /// Whether nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ExposureLogger for MemoryLogger {
    fn log(&self, level: Level, message: &str, payload: &Value) -> Result<(), AblError> {
        let mut records = self.records.lock().map_err(|_| {
            AblError::Experiment(ErrorInfo::new(
                "logger-poisoned",
                "memory logger lock poisoned",
            ))
        })?;
        records.push(LogRecord {
            level,
            message: message.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }
}

/// Appends one canonical JSON object per record to a file.
///
/// Records less severe than `min_level` are skipped.
#[derive(Debug)]
pub struct JsonLinesLogger {
    path: PathBuf,
    min_level: Level,
    lock: Mutex<()>,
}

impl JsonLinesLogger {
    /// Logs to `path` at `info` and above.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            min_level: Level::Info,
            lock: Mutex::new(()),
        }
    }

    /// Logs to `{experiment_name}.log` inside `dir`.
    pub fn for_experiment(dir: impl AsRef<Path>, experiment_name: &str) -> Self {
        Self::new(dir.as_ref().join(format!("{experiment_name}.log")))
    }

    /// Sets the least severe level that is still written.
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Destination file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, code: &str, err: impl ToString) -> AblError {
        AblError::Experiment(
            ErrorInfo::new(code, err.to_string())
                .with_context("path", self.path.display().to_string()),
        )
    }
}

impl ExposureLogger for JsonLinesLogger {
    fn log(&self, level: Level, message: &str, payload: &Value) -> Result<(), AblError> {
        if level > self.min_level {
            return Ok(());
        }
        let record = LogRecord {
            level,
            message: message.to_string(),
            payload: payload.clone(),
        };
        let mut line = to_canonical_json_bytes(&record)?;
        line.push(b'\n');

        let _guard = self
            .lock
            .lock()
            .map_err(|_| self.io_error("logger-poisoned", "file logger lock poisoned"))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error("log-create", err))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| self.io_error("log-open", err))?;
        file.write_all(&line)
            .map_err(|err| self.io_error("log-write", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn level_names_map_onto_log_levels() {
        assert_eq!(parse_log_level("critical").unwrap(), Level::Error);
        assert_eq!(parse_log_level("warning").unwrap(), Level::Warn);
        assert_eq!(parse_log_level("notice").unwrap(), Level::Info);
        assert_eq!(parse_log_level("debug").unwrap(), Level::Debug);
        let err = parse_log_level("loud").unwrap_err();
        assert_eq!(err.code(), "invalid-log-level");
    }

    #[test]
    fn memory_logger_captures_records() {
        let logger = MemoryLogger::new();
        assert!(logger.is_empty());
        logger
            .log(Level::Info, "exp with event type: exposure", &json!({"a": 1}))
            .unwrap();
        let records = logger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload, json!({"a": 1}));
    }
}
