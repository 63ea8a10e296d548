//! Log records as handed over by the logging framework.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use thiserror::Error;

use crate::point::FieldValue;

/// Severity of a log record, from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// The application is about to panic.
    Panic,
    /// The application is about to exit.
    Fatal,
    /// An operation failed.
    Error,
    /// Something unexpected that did not fail.
    Warn,
    /// Routine operational messages.
    Info,
    /// Diagnostic detail.
    Debug,
    /// Very verbose tracing output.
    Trace,
}

impl Level {
    /// Canonical lowercase name, used as the value of the `level` tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Panic => "panic",
            Self::Fatal => "fatal",
            Self::Error => "error",
            Self::Warn => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a [`Level`].
#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown log level '{0}'")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "panic" => Ok(Self::Panic),
            "fatal" => Ok(Self::Fatal),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Self::Error,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::INFO => Self::Info,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::TRACE => Self::Trace,
        }
    }
}

/// One structured log event.
///
/// `fields` is the unordered set of key/value pairs attached to the event.
/// The timestamp is the time the event happened, not the time it is flushed.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// The log message text.
    pub message: String,
    /// Severity of the event.
    pub level: Level,
    /// When the event happened.
    pub timestamp: SystemTime,
    /// Structured fields attached to the event.
    pub fields: HashMap<String, FieldValue>,
}

impl LogRecord {
    /// Creates a record stamped with the current time and no fields.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            timestamp: SystemTime::now(),
            fields: HashMap::new(),
        }
    }

    /// Adds or replaces a field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Overrides the event timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}
