//! `tracing` integration.
//!
//! [`HookLayer`] plugs a [`Hook`] into a `tracing_subscriber` registry. Every
//! event at a supported level becomes a [`LogRecord`]: the `message` field is
//! the record message, typed fields keep their type, and anything recorded
//! through `Debug` is stored as a string.
//!
//! Events from the HTTP client stack a sink may use ([`TRANSPORT_TARGETS`])
//! are ignored. They are emitted while a batch is being written, often from
//! threads the client owns, and must not be queued behind that write. More
//! targets can be excluded with [`HookLayer::with_ignored_target`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use logflux::{Config, Hook, HookLayer, LineProtocolSink};
//! use tracing_subscriber::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let hook = Arc::new(Hook::new(
//!     Config::default().with_tags(["user_id"]),
//!     LineProtocolSink::new(std::io::stdout()),
//! )?);
//!
//! tracing_subscriber::registry()
//!     .with(HookLayer::new(Arc::clone(&hook)))
//!     .init();
//!
//! tracing::info!(user_id = 42, measurement = "login", "user logged in");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::{Context, Layer};

use crate::builder::MESSAGE_FIELD;
use crate::error::{HookError, LogfluxError};
use crate::hook::Hook;
use crate::point::FieldValue;
use crate::record::{Level, LogRecord};
use crate::worker::on_worker_thread;

/// Field set by the `log` bridge with the original record's target.
const LOG_TARGET_FIELD: &str = "log.target";

/// Targets ignored by default: the transport stack of the HTTP sink.
pub const TRANSPORT_TARGETS: [&str; 8] = [
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
    "tokio",
    "mio",
    "want",
];

/// A [`Layer`] that submits tracing events to a [`Hook`].
///
/// Events from this crate, from [`TRANSPORT_TARGETS`], and events raised on
/// the flush worker thread are skipped. Records the hook rejects are
/// reported on stderr and dropped. Once the hook is closed, events are
/// dropped silently.
#[derive(Debug, Clone)]
pub struct HookLayer {
    hook: Arc<Hook>,
    ignored: Targets,
}

impl HookLayer {
    /// Wraps a shared hook.
    pub fn new(hook: Arc<Hook>) -> Self {
        let ignored = Targets::new()
            .with_default(LevelFilter::TRACE)
            .with_targets(TRANSPORT_TARGETS.map(|target| (target, LevelFilter::OFF)));
        Self { hook, ignored }
    }

    /// Also ignores events whose target is `target` or one of its modules.
    #[must_use]
    pub fn with_ignored_target(mut self, target: impl Into<String>) -> Self {
        self.ignored = self.ignored.with_target(target, LevelFilter::OFF);
        self
    }

    /// The hook events are submitted to.
    pub fn hook(&self) -> &Arc<Hook> {
        &self.hook
    }
}

impl<S: Subscriber> Layer<S> for HookLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = Level::from(*metadata.level());
        if !self.hook.supports(level) || on_worker_thread() {
            return;
        }

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        // Records bridged from the `log` crate carry their real target in a
        // `log.target` field.
        let target = visitor.log_target.as_deref().unwrap_or(metadata.target());
        if is_own_target(target) || !self.ignored.would_enable(target, metadata.level()) {
            return;
        }

        let record = LogRecord {
            message: visitor.message.unwrap_or_default(),
            level,
            timestamp: SystemTime::now(),
            fields: visitor.fields,
        };

        match self.hook.submit(record) {
            Ok(()) | Err(LogfluxError::Hook(HookError::Closed)) => {}
            Err(e) => eprintln!("logflux: dropped event from '{target}': {e}"),
        }
    }
}

fn is_own_target(target: &str) -> bool {
    let own = env!("CARGO_CRATE_NAME");
    target == own
        || target
            .strip_prefix(own)
            .is_some_and(|rest| rest.starts_with("::"))
}

/// Collects event fields into record fields.
#[derive(Default)]
struct RecordVisitor {
    message: Option<String>,
    log_target: Option<String>,
    fields: HashMap<String, FieldValue>,
}

impl RecordVisitor {
    fn insert(&mut self, field: &Field, value: FieldValue) {
        match field.name() {
            MESSAGE_FIELD => self.message = Some(value.to_string()),
            LOG_TARGET_FIELD => self.log_target = Some(value.to_string()),
            // log.module_path, log.file, log.line
            name if name.starts_with("log.") => {}
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for RecordVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, FieldValue::Float(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, FieldValue::Integer(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, FieldValue::UInteger(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, FieldValue::Boolean(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, FieldValue::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, FieldValue::String(format!("{value:?}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_target_detection() {
        assert!(is_own_target("logflux"));
        assert!(is_own_target("logflux::worker"));
        assert!(!is_own_target("logflux_cli"));
        assert!(!is_own_target("app::handlers"));
    }

    #[test]
    fn test_bridged_log_fields() {
        use crate::config::Config;
        use crate::sink::MemorySink;
        use std::time::Duration;
        use tracing_subscriber::prelude::*;

        let sink = MemorySink::new();
        let hook = Arc::new(
            Hook::new(
                Config::default().with_batch_interval(Duration::from_secs(60)),
                sink.clone(),
            )
            .unwrap(),
        );
        let subscriber = tracing_subscriber::registry().with(HookLayer::new(Arc::clone(&hook)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(
                target: "log",
                { log.target = "legacy::db", log.module_path = "legacy::db", log.line = 12u64 },
                "bridged"
            );
        });
        hook.close().unwrap();

        let batches = sink.batches();
        let fields = batches[0].points()[0].fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["message"], FieldValue::from("bridged"));
    }

    #[test]
    fn test_transport_targets_are_ignored() {
        use crate::config::Config;
        use crate::sink::MemorySink;
        use std::time::Duration;
        use tracing_subscriber::prelude::*;

        let sink = MemorySink::new();
        let hook = Arc::new(
            Hook::new(
                Config::default().with_batch_interval(Duration::from_secs(60)),
                sink.clone(),
            )
            .unwrap(),
        );
        let layer = HookLayer::new(Arc::clone(&hook)).with_ignored_target("noisy_dep");
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: "reqwest::connect", "starting new connection");
            tracing::debug!(target: "hyper_util::client::legacy::pool", "pooling idle connection");
            tracing::info!(target: "h2::codec", "frame");
            tracing::warn!(target: "noisy_dep::inner", "chatter");
            tracing::debug!(target: "log", { log.target = "reqwest::connect" }, "bridged from log");
            tracing::info!(target: "app", "kept");
        });
        hook.close().unwrap();

        let batches = sink.batches();
        assert_eq!(sink.point_count(), 1);
        assert_eq!(
            batches[0].points()[0].fields()["message"],
            FieldValue::from("kept")
        );
    }
}
