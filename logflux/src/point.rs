//! Measurement points.
//!
//! A [`Point`] is one timestamped observation: a measurement name, a set of
//! string tags, and a set of typed fields. Points are validated when they
//! are built and cannot be changed afterwards; they move by value from the
//! builder through the intake queue into a batch.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use crate::error::{PointError, Result};

/// A scalar field value the backend knows how to encode.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit float. Must be finite to be stored.
    Float(f64),
    /// Signed integer.
    Integer(i64),
    /// Unsigned integer.
    UInteger(u64),
    /// Boolean.
    Boolean(bool),
    /// UTF-8 string.
    String(String),
}

impl FieldValue {
    /// Converts a JSON value into a field value.
    ///
    /// Numbers keep their integer-ness, arrays and objects are stored as
    /// their JSON text, and `null` has no field representation.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Self::Boolean(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Integer(i))
                } else if let Some(u) = n.as_u64() {
                    Some(Self::UInteger(u))
                } else {
                    n.as_f64().map(Self::Float)
                }
            }
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            other => Some(Self::String(other.to_string())),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::UInteger(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

macro_rules! field_value_from {
    ($variant:ident: $($ty:ty),+) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }
        )+
    };
}

field_value_from!(Float: f64, f32);
field_value_from!(Integer: i64, i32, i16, i8);
field_value_from!(UInteger: u64, u32, u16, u8);
field_value_from!(Boolean: bool);
field_value_from!(String: String, &str);

/// One timestamped observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: SystemTime,
}

impl Point {
    /// Creates a validated point.
    ///
    /// # Errors
    ///
    /// Returns [`PointError`] if the measurement is empty, there are no
    /// fields, a key is empty, a key is both a tag and a field, or a float
    /// field is NaN or infinite.
    pub fn new(
        measurement: impl Into<String>,
        tags: BTreeMap<String, String>,
        fields: BTreeMap<String, FieldValue>,
        timestamp: SystemTime,
    ) -> Result<Self> {
        let measurement = measurement.into();
        if measurement.is_empty() {
            return Err(PointError::EmptyMeasurement.into());
        }
        if fields.is_empty() {
            return Err(PointError::NoFields.into());
        }
        if tags.keys().any(String::is_empty) {
            return Err(PointError::EmptyKey { kind: "tag" }.into());
        }

        for (key, value) in &fields {
            if key.is_empty() {
                return Err(PointError::EmptyKey { kind: "field" }.into());
            }
            if tags.contains_key(key) {
                return Err(PointError::KeyCollision { key: key.clone() }.into());
            }
            if let FieldValue::Float(v) = value
                && !v.is_finite()
            {
                return Err(PointError::UnsupportedValue {
                    field: key.clone(),
                    reason: format!("{v} is not a finite number"),
                }
                .into());
            }
        }

        Ok(Self {
            measurement,
            tags,
            fields,
            timestamp,
        })
    }

    /// The series name.
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Indexed string dimensions, sorted by key.
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Observed values, sorted by key.
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Event time.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}
