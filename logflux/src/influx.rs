//! InfluxDB HTTP sink.
//!
//! Posts each batch as line protocol to the InfluxDB 1.x `/write` endpoint
//! (also served by InfluxDB 2.x compatibility APIs). The target database and
//! precision come from the batch. There is exactly one attempt per batch;
//! a failure is returned to the flush worker, which logs it and drops the
//! batch.
//!
//! This module is only available when the `influxdb-http` feature is enabled.
//!
//! # Example
//!
//! ```rust,no_run
//! use logflux::{Config, Hook};
//! use logflux::influx::{InfluxConfig, InfluxHttpSink};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sink = InfluxHttpSink::new(
//!     InfluxConfig::new("http://localhost:8086").with_basic_auth("writer", "secret"),
//! )?;
//! let hook = Hook::new(Config::default().with_database("app_logs"), sink)?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use crate::batch::Batch;
use crate::error::{Result, SinkError};
use crate::line_protocol;
use crate::sink::Sink;

/// Connection settings for an InfluxDB server.
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    /// Base URL of the server (e.g., `http://localhost:8086`).
    pub url: String,
    /// HTTP timeout for each write.
    pub timeout: Duration,
    /// Optional username and password.
    pub basic_auth: Option<(String, String)>,
    /// Extra HTTP headers (e.g., `Authorization: Token ...`).
    pub headers: Vec<(String, String)>,
}

impl InfluxConfig {
    /// Creates a config with a 10s timeout and no credentials.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(10),
            basic_auth: None,
            headers: Vec::new(),
        }
    }

    /// Sets the HTTP timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets basic-auth credentials.
    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((username.into(), password.into()));
        self
    }

    /// Adds an HTTP header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Full URL of the write endpoint.
    pub fn write_url(&self) -> String {
        format!("{}/write", self.url.trim_end_matches('/'))
    }
}

/// A [`Sink`] that writes batches to InfluxDB over HTTP.
#[derive(Debug)]
pub struct InfluxHttpSink {
    config: InfluxConfig,
    client: reqwest::blocking::Client,
}

impl InfluxHttpSink {
    /// Creates the sink and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::ClientCreate`] if the HTTP client cannot be built.
    pub fn new(config: InfluxConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SinkError::ClientCreate { source: e })?;
        Ok(Self { config, client })
    }

    /// The connection settings.
    pub fn config(&self) -> &InfluxConfig {
        &self.config
    }
}

impl Sink for InfluxHttpSink {
    fn write(&mut self, batch: &Batch) -> std::result::Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut request = self
            .client
            .post(self.config.write_url())
            .query(&[
                ("db", batch.database()),
                ("precision", batch.precision().as_str()),
            ])
            .header("Content-Type", "text/plain; charset=utf-8");

        if let Some((username, password)) = &self.config.basic_auth {
            request = request.basic_auth(username, Some(password));
        }
        for (name, value) in &self.config.headers {
            request = request.header(name, value);
        }

        let resp = request
            .body(line_protocol::encode(batch))
            .send()
            .map_err(|e| SinkError::Request { source: e })?;

        if resp.status().is_success() {
            return Ok(());
        }
        let status = resp.status().as_u16();
        let body = resp.text().unwrap_or_default();
        Err(SinkError::HttpStatus { status, body })
    }
}
