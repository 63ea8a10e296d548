//! The flush worker.
//!
//! One worker thread per hook runs an unbounded sequence of flush cycles.
//! Each cycle opens an empty batch and races two triggers: the cycle's
//! interval running out, and the batch reaching `batch_size` points. Either
//! one closes the batch, which is then written to the sink synchronously
//! before the next cycle starts. Points submitted during a write wait in the
//! bounded intake queue.
//!
//! The loop ends when every sender of the intake queue is gone and the queue
//! has been drained. The last, partially filled batch is written if it holds
//! any points.

use std::cell::Cell;
use std::fmt;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Instant;

use tracing::{debug, error};

use crate::batch::Batch;
use crate::config::Config;
use crate::point::Point;
use crate::sink::Sink;

thread_local! {
    static ON_WORKER_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Returns `true` when called from a flush worker thread.
///
/// Events logged while a batch is being written must not be fed back into
/// the intake queue: the worker would end up waiting on itself.
pub(crate) fn on_worker_thread() -> bool {
    ON_WORKER_THREAD.with(Cell::get)
}

/// Why a flush cycle closed its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleEnd {
    /// The batch reached `batch_size` points.
    Full,
    /// The cycle's interval elapsed first.
    Interval,
    /// The intake queue is closed and empty.
    Drained,
}

impl fmt::Display for CycleEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Full => "size",
            Self::Interval => "interval",
            Self::Drained => "shutdown",
        })
    }
}

/// Consumer side of a hook's intake queue.
pub(crate) struct BatchWorker {
    config: Config,
    intake: Receiver<Point>,
    sink: Box<dyn Sink>,
}

impl BatchWorker {
    /// Creates a worker over a resolved configuration.
    pub(crate) fn new(config: Config, intake: Receiver<Point>, sink: Box<dyn Sink>) -> Self {
        Self {
            config,
            intake,
            sink,
        }
    }

    /// Runs flush cycles until the intake queue is closed and drained.
    pub(crate) fn run(mut self) {
        ON_WORKER_THREAD.with(|flag| flag.set(true));
        debug!(
            database = %self.config.database,
            batch_size = self.config.batch_size,
            interval = ?self.config.batch_interval,
            "flush worker started"
        );

        loop {
            let mut batch = Batch::for_config(&self.config);
            let end = self.fill(&mut batch);

            if end != CycleEnd::Drained || !batch.is_empty() {
                self.flush(&batch, end);
            }
            if end == CycleEnd::Drained {
                break;
            }
        }

        debug!("flush worker stopped");
    }

    /// Accumulates points into `batch` until one of the triggers fires.
    ///
    /// The interval is checked before every receive, so when both triggers
    /// are ready at once the interval wins.
    fn fill(&self, batch: &mut Batch) -> CycleEnd {
        let deadline = Instant::now().checked_add(self.config.batch_interval);

        loop {
            let received = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return CycleEnd::Interval;
                    }
                    self.intake.recv_timeout(deadline - now)
                }
                // An interval too large to represent never fires.
                None => self
                    .intake
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(point) => {
                    batch.push(point);
                    if batch.len() >= self.config.batch_size {
                        return CycleEnd::Full;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return CycleEnd::Interval,
                Err(RecvTimeoutError::Disconnected) => return CycleEnd::Drained,
            }
        }
    }

    /// Writes one closed batch. Failures are logged and the batch is dropped.
    fn flush(&mut self, batch: &Batch, end: CycleEnd) {
        let started = Instant::now();
        match self.sink.write(batch) {
            Ok(()) => debug!(
                points = batch.len(),
                trigger = %end,
                elapsed = ?started.elapsed(),
                "flushed batch"
            ),
            Err(e) => error!(
                points = batch.len(),
                database = %batch.database(),
                trigger = %end,
                error = %e,
                "failed to write batch, dropping it"
            ),
        }
    }
}
