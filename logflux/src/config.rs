//! Hook configuration.
//!
//! A [`Config`] is a plain snapshot of tunables. Every field may be left
//! empty (empty string, zero size, zero interval); [`Config::resolved`]
//! fills those in with the documented defaults. The hook resolves and
//! validates its configuration exactly once, at construction.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::builder::{LEVEL_TAG, MEASUREMENT_FIELD, MESSAGE_FIELD};
use crate::error::{ConfigError, Result};

/// Default destination database.
pub const DEFAULT_DATABASE: &str = "logrus";

/// Default measurement for records that carry no `measurement` field.
pub const DEFAULT_MEASUREMENT: &str = "logrus";

/// Default time budget of one flush cycle.
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of points that closes a batch early.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Largest accepted batch size. The intake queue allocates this many slots
/// up front.
pub const MAX_BATCH_SIZE: usize = 100_000;

/// Timestamp precision used when a batch is encoded for the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    /// Nanoseconds.
    #[default]
    #[serde(rename = "ns", alias = "n")]
    Nanosecond,
    /// Microseconds.
    #[serde(rename = "us", alias = "u")]
    Microsecond,
    /// Milliseconds.
    #[serde(rename = "ms")]
    Millisecond,
    /// Seconds.
    #[serde(rename = "s")]
    Second,
    /// Minutes.
    #[serde(rename = "m")]
    Minute,
    /// Hours.
    #[serde(rename = "h")]
    Hour,
}

impl Precision {
    /// Returns the short unit name understood by the backend (`ns`, `ms`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nanosecond => "ns",
            Self::Microsecond => "us",
            Self::Millisecond => "ms",
            Self::Second => "s",
            Self::Minute => "m",
            Self::Hour => "h",
        }
    }

    /// Number of nanoseconds in one unit of this precision.
    pub fn nanos_per_unit(self) -> i128 {
        match self {
            Self::Nanosecond => 1,
            Self::Microsecond => 1_000,
            Self::Millisecond => 1_000_000,
            Self::Second => 1_000_000_000,
            Self::Minute => 60_000_000_000,
            Self::Hour => 3_600_000_000_000,
        }
    }

    /// Parses a short unit name. Returns `None` for anything unknown.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ns" | "n" => Some(Self::Nanosecond),
            "us" | "u" => Some(Self::Microsecond),
            "ms" => Some(Self::Millisecond),
            "s" => Some(Self::Second),
            "m" => Some(Self::Minute),
            "h" => Some(Self::Hour),
            _ => None,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables for a [`crate::Hook`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use logflux::Config;
///
/// let config = Config::default()
///     .with_database("app_logs")
///     .with_tags(["user_id", "request_id"])
///     .with_batch_size(500)
///     .with_batch_interval(Duration::from_secs(2));
///
/// assert_eq!(config.default_measurement, "logrus");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timestamp precision for encoded batches.
    pub precision: Precision,

    /// Destination database identifier carried by every batch.
    pub database: String,

    /// Measurement used when a record has no `measurement` field.
    pub default_measurement: String,

    /// Record field names promoted to point tags.
    ///
    /// A promoted field is removed from the point's fields.
    pub tags: Vec<String>,

    /// Time budget of one flush cycle, measured from the cycle's start.
    #[serde(rename = "batch_interval_secs", with = "interval_secs")]
    pub batch_interval: Duration,

    /// Point count that closes a batch immediately.
    ///
    /// Also the capacity of the intake queue.
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            precision: Precision::default(),
            database: DEFAULT_DATABASE.to_string(),
            default_measurement: DEFAULT_MEASUREMENT.to_string(),
            tags: Vec::new(),
            batch_interval: DEFAULT_BATCH_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Config {
    /// Sets the timestamp precision.
    #[must_use]
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Sets the destination database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets the fallback measurement name.
    #[must_use]
    pub fn with_default_measurement(mut self, measurement: impl Into<String>) -> Self {
        self.default_measurement = measurement.into();
        self
    }

    /// Replaces the list of fields promoted to tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the flush interval.
    #[must_use]
    pub fn with_batch_interval(mut self, interval: Duration) -> Self {
        self.batch_interval = interval;
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Returns a copy with every omitted tunable replaced by its default.
    ///
    /// Resolving is idempotent: a config that spells out the default values
    /// resolves to the same thing as one that leaves them empty.
    #[must_use]
    pub fn resolved(mut self) -> Self {
        if self.database.is_empty() {
            self.database = DEFAULT_DATABASE.to_string();
        }
        if self.default_measurement.is_empty() {
            self.default_measurement = DEFAULT_MEASUREMENT.to_string();
        }
        if self.batch_interval.is_zero() {
            self.batch_interval = DEFAULT_BATCH_INTERVAL;
        }
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
        self
    }

    /// Checks the batch size and the tag list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBatchSize`] if `batch_size` is above
    /// [`MAX_BATCH_SIZE`], and [`ConfigError::InvalidTag`] if a tag name is
    /// empty or collides with a name the point builder reserves (`level`,
    /// `message`, `measurement`).
    pub fn validate(&self) -> Result<()> {
        if self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize {
                size: self.batch_size,
                max: MAX_BATCH_SIZE,
            }
            .into());
        }
        for tag in &self.tags {
            if tag.is_empty() {
                return Err(ConfigError::InvalidTag {
                    tag: tag.clone(),
                    reason: "tag name is empty".to_string(),
                }
                .into());
            }
            if matches!(tag.as_str(), LEVEL_TAG | MESSAGE_FIELD | MEASUREMENT_FIELD) {
                return Err(ConfigError::InvalidTag {
                    tag: tag.clone(),
                    reason: "name is reserved".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Loads a configuration from a JSON file.
    ///
    /// Keys that are missing from the file keep their default values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not a valid configuration.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(config)
    }
}

/// Serializes the batch interval as fractional seconds.
///
/// Non-positive or NaN values deserialize to zero, which resolves to the
/// default interval.
mod interval_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(interval: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(interval.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if secs.is_nan() || secs <= 0.0 {
            return Ok(Duration::ZERO);
        }
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
