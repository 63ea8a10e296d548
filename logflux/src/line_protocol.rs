//! InfluxDB line-protocol encoding.
//!
//! Each point becomes one line:
//!
//! ```text
//! measurement[,tag=value...] field=value[,field=value...] timestamp
//! ```
//!
//! Tags and fields are written in key order. The timestamp is expressed in
//! the batch's precision, counted from the Unix epoch.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::batch::Batch;
use crate::config::Precision;
use crate::point::{FieldValue, Point};

/// Encodes a whole batch, one line per point, lines separated by `\n`.
///
/// An empty batch encodes to an empty string.
pub fn encode(batch: &Batch) -> String {
    let mut out = String::with_capacity(batch.len() * 128);
    for (i, point) in batch.points().iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        encode_point(point, batch.precision(), &mut out);
    }
    out
}

/// Appends the line for a single point to `out`, without a trailing newline.
pub fn encode_point(point: &Point, precision: Precision, out: &mut String) {
    escape_into(out, point.measurement(), &[',', ' ']);

    for (key, value) in point.tags() {
        out.push(',');
        escape_into(out, key, &[',', '=', ' ']);
        out.push('=');
        escape_into(out, value, &[',', '=', ' ']);
    }

    out.push(' ');
    for (i, (key, value)) in point.fields().iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        escape_into(out, key, &[',', '=', ' ']);
        out.push('=');
        encode_field_value(value, out);
    }

    out.push(' ');
    out.push_str(&timestamp(point.timestamp(), precision).to_string());
}

/// Converts a timestamp into a count of `precision` units since the epoch.
///
/// Times before the epoch are negative. Sub-unit remainders are truncated
/// toward zero.
pub fn timestamp(time: SystemTime, precision: Precision) -> i128 {
    let nanos = match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i128::try_from(d.as_nanos()).unwrap_or(i128::MAX),
        Err(e) => -i128::try_from(e.duration().as_nanos()).unwrap_or(i128::MAX),
    };
    nanos / precision.nanos_per_unit()
}

fn encode_field_value(value: &FieldValue, out: &mut String) {
    match value {
        FieldValue::Float(v) => out.push_str(&v.to_string()),
        FieldValue::Integer(v) => {
            out.push_str(&v.to_string());
            out.push('i');
        }
        FieldValue::UInteger(v) => {
            out.push_str(&v.to_string());
            out.push('u');
        }
        FieldValue::Boolean(v) => out.push_str(if *v { "true" } else { "false" }),
        FieldValue::String(v) => {
            out.push('"');
            for c in v.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
        }
    }
}

/// Writes `s` with a backslash before each special character.
///
/// Newlines are written as `\n` so a point never spans two lines. A literal
/// backslash is doubled when it comes last or sits in front of a special
/// character, so it cannot swallow the delimiter that follows it.
fn escape_into(out: &mut String, s: &str, special: &[char]) {
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => out.push_str("\\n"),
            '\\' => {
                out.push('\\');
                if chars
                    .peek()
                    .is_none_or(|next| special.contains(next) || *next == '\n')
                {
                    out.push('\\');
                }
            }
            c => {
                if special.contains(&c) {
                    out.push('\\');
                }
                out.push(c);
            }
        }
    }
}
