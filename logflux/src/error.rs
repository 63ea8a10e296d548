//! Error types for the logflux pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all logflux operations.
///
/// Construction problems surface as [`ConfigError`], per-record conversion
/// problems as [`PointError`], backend failures as [`SinkError`], and
/// problems talking to the flush worker as [`HookError`].
#[derive(Error, Debug)]
pub enum LogfluxError {
    /// Error while building or validating the hook configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A log record could not be turned into a point.
    #[error("point error: {0}")]
    Point(#[from] PointError),

    /// The backend failed to accept a batch.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// The hook's flush worker is unavailable.
    #[error("hook error: {0}")]
    Hook(#[from] HookError),
}

/// Errors raised while constructing a hook.
///
/// These are reported once, synchronously, from [`crate::Hook::new`] or
/// [`crate::HookBuilder::build`]. A hook that fails here is never installed.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No sink was supplied to the builder.
    #[error("no sink configured for hook")]
    MissingSink,

    /// A configured tag name cannot be used.
    #[error("invalid tag '{tag}': {reason}")]
    InvalidTag {
        /// The offending tag name.
        tag: String,
        /// Why the tag is rejected.
        reason: String,
    },

    /// The batch size is larger than the intake queue can hold.
    #[error("batch size {size} exceeds the maximum of {max}")]
    InvalidBatchSize {
        /// The configured batch size.
        size: usize,
        /// The largest accepted batch size.
        max: usize,
    },

    /// The flush worker thread could not be started.
    #[error("failed to spawn flush worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The configuration file could not be read.
    #[error("failed to read config from '{}': {source}", path.display())]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`crate::Config`].
    #[error("failed to parse config from '{}': {source}", path.display())]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised when a log record cannot become a well-formed point.
///
/// The record is dropped; the error goes back to the caller of
/// [`crate::Hook::submit`] and never reaches the intake queue.
#[derive(Error, Debug, PartialEq)]
pub enum PointError {
    /// The resolved measurement name is empty.
    #[error("measurement name is empty")]
    EmptyMeasurement,

    /// The point would carry no fields at all.
    #[error("point has no fields")]
    NoFields,

    /// A tag or field key is the empty string.
    #[error("empty {kind} key")]
    EmptyKey {
        /// Either `"tag"` or `"field"`.
        kind: &'static str,
    },

    /// The same key is used as both a tag and a field.
    #[error("key '{key}' is used as both a tag and a field")]
    KeyCollision {
        /// The duplicated key.
        key: String,
    },

    /// A field value cannot be encoded by the backend.
    #[error("unsupported value for field '{field}': {reason}")]
    UnsupportedValue {
        /// The field name.
        field: String,
        /// Why the value is rejected.
        reason: String,
    },
}

/// Errors returned by a [`crate::Sink`] when a batch write fails.
///
/// The flush worker logs these and discards the batch.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Writing the encoded batch to an output stream failed.
    #[error("I/O error writing batch: {0}")]
    Io(#[from] std::io::Error),

    /// The backend refused the batch for a sink-specific reason.
    #[error("batch rejected: {reason}")]
    Rejected {
        /// Description of the rejection.
        reason: String,
    },

    /// Failed to create the HTTP client.
    #[cfg(feature = "influxdb-http")]
    #[error("failed to create HTTP client: {source}")]
    ClientCreate {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP request could not be completed.
    #[cfg(feature = "influxdb-http")]
    #[error("HTTP request failed: {source}")]
    Request {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("server returned status {status}: {body}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// The response body text.
        body: String,
    },
}

/// Errors from the submission side of a running hook.
#[derive(Error, Debug)]
pub enum HookError {
    /// The flush worker has stopped and no longer accepts points.
    #[error("flush worker is no longer accepting points")]
    Closed,

    /// The flush worker panicked before it could drain.
    #[error("flush worker panicked")]
    WorkerPanicked,
}

/// Type alias for `Result<T, LogfluxError>`.
pub type Result<T> = std::result::Result<T, LogfluxError>;
