//! Conversion of log records into points.

use std::collections::BTreeMap;

use crate::config::Config;
use crate::error::Result;
use crate::point::{FieldValue, Point};
use crate::record::LogRecord;

/// Tag that carries the record's severity.
pub const LEVEL_TAG: &str = "level";

/// Field that carries the record's message text.
pub const MESSAGE_FIELD: &str = "message";

/// Record field that, when present, names the measurement.
pub const MEASUREMENT_FIELD: &str = "measurement";

/// Turns [`LogRecord`]s into [`Point`]s according to a [`Config`].
///
/// The rules, applied in order:
///
/// 1. The message is stored under the `message` field.
/// 2. A `measurement` field, if present, becomes the measurement name and
///    is removed from the fields. Otherwise the configured default is used.
/// 3. The severity becomes the `level` tag.
/// 4. Every configured tag name found among the fields is moved from the
///    fields into the tags. Empty values are not promoted.
/// 5. The remaining fields, the tags and the record timestamp form the point.
#[derive(Debug, Clone, Copy)]
pub struct PointBuilder<'a> {
    config: &'a Config,
}

impl<'a> PointBuilder<'a> {
    /// Creates a builder over a resolved configuration.
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Builds a point from a record, consuming it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PointError`] if the resulting point is invalid, for
    /// example when a `measurement` field is empty or a float is NaN.
    pub fn build(&self, record: LogRecord) -> Result<Point> {
        let LogRecord {
            message,
            level,
            timestamp,
            fields,
        } = record;

        let mut fields: BTreeMap<String, FieldValue> = fields.into_iter().collect();
        fields.insert(MESSAGE_FIELD.to_string(), FieldValue::String(message));

        let measurement = match fields.remove(MEASUREMENT_FIELD) {
            Some(value) => value.to_string(),
            None => self.config.default_measurement.clone(),
        };

        let mut tags = BTreeMap::new();
        tags.insert(LEVEL_TAG.to_string(), level.as_str().to_string());

        for name in &self.config.tags {
            let Some(value) = fields.get(name) else {
                continue;
            };
            let value = value.to_string();
            if value.is_empty() {
                continue;
            }
            fields.remove(name);
            tags.insert(name.clone(), value);
        }

        Point::new(measurement, tags, fields, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LogfluxError, PointError};
    use crate::record::Level;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn ts() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[test]
    fn test_measurement_field_becomes_measurement() {
        let config = Config::default();
        let record = LogRecord::new(Level::Info, "user clicked")
            .with_field("measurement", "click")
            .with_field("user_id", 1i64)
            .at(ts());

        let point = PointBuilder::new(&config).build(record).unwrap();

        assert_eq!(point.measurement(), "click");
        assert_eq!(point.tags().len(), 1);
        assert_eq!(point.tags()["level"], "info");
        assert_eq!(point.fields().len(), 2);
        assert_eq!(point.fields()["user_id"], FieldValue::Integer(1));
        assert_eq!(point.fields()["message"], FieldValue::from("user clicked"));
        assert!(!point.fields().contains_key("measurement"));
        assert_eq!(point.timestamp(), ts());
    }

    #[test]
    fn test_default_measurement_used() {
        let config = Config::default();
        let record = LogRecord::new(Level::Warn, "hi").with_field("user_id", 1i64);

        let point = PointBuilder::new(&config).build(record).unwrap();

        assert_eq!(point.measurement(), "logrus");
        assert_eq!(point.tags()["level"], "warning");
    }

    #[test]
    fn test_non_string_measurement_uses_display() {
        let config = Config::default();
        let record = LogRecord::new(Level::Info, "x").with_field("measurement", 42i64);

        let point = PointBuilder::new(&config).build(record).unwrap();

        assert_eq!(point.measurement(), "42");
    }

    #[test]
    fn test_configured_tags_move_out_of_fields() {
        let config = Config::default().with_tags(["host", "user_id", "absent"]);
        let record = LogRecord::new(Level::Error, "boom")
            .with_field("host", "web1")
            .with_field("user_id", 7u64)
            .with_field("latency_ms", 12.5);

        let point = PointBuilder::new(&config).build(record).unwrap();

        assert_eq!(point.tags().len(), 3);
        assert_eq!(point.tags()["host"], "web1");
        assert_eq!(point.tags()["user_id"], "7");
        assert_eq!(point.tags()["level"], "error");
        assert!(!point.fields().contains_key("host"));
        assert!(!point.fields().contains_key("user_id"));
        assert_eq!(point.fields()["latency_ms"], FieldValue::Float(12.5));
    }

    #[test]
    fn test_empty_tag_value_stays_a_field() {
        let config = Config::default().with_tags(["host"]);
        let record = LogRecord::new(Level::Info, "x").with_field("host", "");

        let point = PointBuilder::new(&config).build(record).unwrap();

        assert!(!point.tags().contains_key("host"));
        assert_eq!(point.fields()["host"], FieldValue::from(""));
    }

    #[test]
    fn test_message_overrides_message_field() {
        let config = Config::default();
        let record = LogRecord::new(Level::Info, "real").with_field("message", "shadowed");

        let point = PointBuilder::new(&config).build(record).unwrap();

        assert_eq!(point.fields()["message"], FieldValue::from("real"));
    }

    #[test]
    fn test_empty_measurement_field_rejected() {
        let config = Config::default();
        let record = LogRecord::new(Level::Info, "x").with_field("measurement", "");

        let err = PointBuilder::new(&config).build(record).unwrap_err();

        assert!(matches!(err, LogfluxError::Point(PointError::EmptyMeasurement)));
    }

    #[test]
    fn test_level_field_collides_with_level_tag() {
        let config = Config::default();
        let record = LogRecord::new(Level::Info, "x").with_field("level", 3i64);

        let err = PointBuilder::new(&config).build(record).unwrap_err();

        assert!(matches!(
            err,
            LogfluxError::Point(PointError::KeyCollision { ref key }) if key == "level"
        ));
    }

    #[test]
    fn test_nan_field_rejected() {
        let config = Config::default();
        let record = LogRecord::new(Level::Info, "x").with_field("ratio", f64::NAN);

        let err = PointBuilder::new(&config).build(record).unwrap_err();

        assert!(matches!(
            err,
            LogfluxError::Point(PointError::UnsupportedValue { .. })
        ));
    }
}
