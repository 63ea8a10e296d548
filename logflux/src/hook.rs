//! The hook façade.
//!
//! A [`Hook`] is what the logging side talks to. It resolves and validates
//! the configuration once, owns the bounded intake queue, and runs a single
//! flush worker thread. Records go in through [`Hook::submit`], which
//! converts them to points on the caller's thread and enqueues them.
//!
//! Delivery is at-most-once: a batch the sink fails to write is logged and
//! lost. Points still queued when the hook is closed, shut down or dropped
//! are flushed before the worker exits.

use std::sync::mpsc::{SyncSender, sync_channel};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::builder::PointBuilder;
use crate::config::Config;
use crate::error::{ConfigError, HookError, Result};
use crate::point::Point;
use crate::record::{Level, LogRecord};
use crate::sink::Sink;
use crate::worker::{BatchWorker, on_worker_thread};

/// Severities a hook accepts, most severe first.
pub const SUPPORTED_LEVELS: [Level; 6] = [
    Level::Panic,
    Level::Fatal,
    Level::Error,
    Level::Warn,
    Level::Info,
    Level::Debug,
];

const WORKER_THREAD_NAME: &str = "logflux-flush";

/// Batches log records into points and flushes them to a [`Sink`].
///
/// # Example
///
/// ```rust
/// use logflux::{Config, Hook, Level, LogRecord, MemorySink};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sink = MemorySink::new();
/// let hook = Hook::new(Config::default().with_batch_size(2), sink.clone())?;
///
/// hook.submit(LogRecord::new(Level::Info, "started").with_field("port", 8080i64))?;
/// hook.submit(LogRecord::new(Level::Warn, "slow").with_field("ms", 950i64))?;
///
/// hook.shutdown()?;
/// assert_eq!(sink.point_count(), 2);
/// # Ok(())
/// # }
/// ```
///
/// A hook is usually shared as `Arc<Hook>`, for example with a
/// [`crate::HookLayer`]. [`Hook::close`] works through a shared reference, so
/// queued points can be flushed at exit even while other owners remain.
#[derive(Debug)]
pub struct Hook {
    config: Config,
    intake: Mutex<Option<SyncSender<Point>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Hook {
    /// Creates a hook and starts its flush worker.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid or the worker
    /// thread cannot be spawned.
    pub fn new(config: Config, sink: impl Sink) -> Result<Self> {
        Self::builder(config).sink(sink).build()
    }

    /// Starts building a hook from a configuration.
    pub fn builder(config: Config) -> HookBuilder {
        HookBuilder {
            config,
            sink: None,
        }
    }

    /// Converts a record into a point and queues it for the next flush.
    ///
    /// Blocks the calling thread while the intake queue is full. Returns as
    /// soon as the point is queued; the write itself happens later on the
    /// worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PointError`] if the record cannot become a valid
    /// point (the record is dropped), or [`HookError::Closed`] if the worker
    /// has stopped or the hook was closed.
    pub fn submit(&self, record: LogRecord) -> Result<()> {
        let point = PointBuilder::new(&self.config).build(record)?;
        // Send on a clone so a producer blocked on a full queue does not
        // hold the lock that `close` needs.
        let intake = self
            .intake
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(HookError::Closed)?;
        intake.send(point).map_err(|_| HookError::Closed)?;
        Ok(())
    }

    /// Severities this hook accepts, most severe first.
    pub fn supported_levels(&self) -> &'static [Level] {
        &SUPPORTED_LEVELS
    }

    /// Returns `true` if records of `level` should be submitted.
    pub fn supports(&self, level: Level) -> bool {
        SUPPORTED_LEVELS.contains(&level)
    }

    /// The resolved configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stops accepting points, flushes everything still queued, and waits
    /// for the worker to exit.
    ///
    /// Later calls to [`Hook::submit`] fail with [`HookError::Closed`].
    /// Closing twice is a no-op. Producers blocked on a full queue when the
    /// hook closes still get their points into the final batches.
    ///
    /// Called from inside a sink, the queue is closed but the worker is not
    /// joined.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::WorkerPanicked`] if the worker thread panicked,
    /// for example inside a sink.
    pub fn close(&self) -> Result<()> {
        drop(
            self.intake
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        if on_worker_thread() {
            return Ok(());
        }

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker.join().map_err(|_| HookError::WorkerPanicked)?;
            debug!("hook closed");
        }
        Ok(())
    }

    /// Consuming form of [`Hook::close`].
    ///
    /// # Errors
    ///
    /// Returns [`HookError::WorkerPanicked`] if the worker thread panicked.
    pub fn shutdown(self) -> Result<()> {
        self.close()
    }
}

impl Drop for Hook {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("error while closing hook: {e}");
        }
    }
}

/// Builder for [`Hook`].
///
/// The sink is required; [`HookBuilder::build`] fails with
/// [`ConfigError::MissingSink`] without one.
pub struct HookBuilder {
    config: Config,
    sink: Option<Box<dyn Sink>>,
}

impl HookBuilder {
    /// Sets the sink batches are written to.
    #[must_use]
    pub fn sink(mut self, sink: impl Sink) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Resolves the configuration, allocates the intake queue, and starts
    /// the flush worker.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSink`] if no sink was set,
    /// [`ConfigError::InvalidTag`] for an unusable tag name,
    /// [`ConfigError::InvalidBatchSize`] when `batch_size` is above
    /// [`crate::config::MAX_BATCH_SIZE`], and [`ConfigError::WorkerSpawn`]
    /// if the worker thread cannot start.
    pub fn build(self) -> Result<Hook> {
        let config = self.config.resolved();
        config.validate()?;
        let sink = self.sink.ok_or(ConfigError::MissingSink)?;

        let (intake, queue) = sync_channel(config.batch_size);
        let worker = BatchWorker::new(config.clone(), queue, sink);
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(ConfigError::WorkerSpawn)?;

        debug!(
            database = %config.database,
            precision = %config.precision,
            batch_size = config.batch_size,
            "hook started"
        );

        Ok(Hook {
            config,
            intake: Mutex::new(Some(intake)),
            worker: Mutex::new(Some(handle)),
        })
    }
}
