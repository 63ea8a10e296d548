//! # logflux
//!
//! Batches structured log events into time-series points.
//!
//! logflux sits between an application's logging facility and a time-series
//! backend such as InfluxDB. Each log record becomes one point (measurement,
//! tags, fields, timestamp). Points are queued on a bounded intake queue and
//! a single worker thread groups them into batches, flushing a batch when it
//! reaches `batch_size` points or when `batch_interval` has elapsed since the
//! batch was opened, whichever comes first.
//!
//! ## Key Properties
//!
//! - Point construction happens on the caller's thread; invalid records are
//!   rejected there and never reach the queue
//! - Bounded intake: producers block when the queue is full, nothing is
//!   dropped silently
//! - One flush in flight at a time, one attempt per batch (at-most-once)
//! - Explicit shutdown drains the queue and flushes what is left
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use logflux::{Config, Hook, Level, LogRecord, MemorySink};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sink = MemorySink::new();
//! let config = Config::default()
//!     .with_database("app_logs")
//!     .with_tags(["user_id"])
//!     .with_batch_size(50)
//!     .with_batch_interval(Duration::from_secs(1));
//!
//! let hook = Hook::new(config, sink.clone())?;
//!
//! hook.submit(
//!     LogRecord::new(Level::Info, "user clicked")
//!         .with_field("measurement", "click")
//!         .with_field("user_id", 42i64),
//! )?;
//!
//! hook.shutdown()?;
//!
//! let batches = sink.batches();
//! let point = &batches[0].points()[0];
//! assert_eq!(point.measurement(), "click");
//! assert_eq!(point.tags()["user_id"], "42");
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `influxdb-http`: enables [`influx::InfluxHttpSink`], which posts batches
//!   to an InfluxDB `/write` endpoint.

pub mod batch;
pub mod builder;
pub mod config;
pub mod error;
#[cfg(feature = "influxdb-http")]
pub mod influx;
pub mod layer;
pub mod line_protocol;
pub mod point;
pub mod record;
pub mod sink;

mod hook;
mod worker;

pub use batch::Batch;
pub use builder::PointBuilder;
pub use config::{Config, Precision};
pub use error::{ConfigError, HookError, LogfluxError, PointError, Result, SinkError};
pub use hook::{Hook, HookBuilder, SUPPORTED_LEVELS};
pub use layer::HookLayer;
pub use point::{FieldValue, Point};
pub use record::{Level, LogRecord};
pub use sink::{LineProtocolSink, MemorySink, Sink};
