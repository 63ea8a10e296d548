//! Backends that receive closed batches.
//!
//! The flush worker owns its sink and calls [`Sink::write`] once per batch,
//! synchronously. A write is attempted exactly once; when it fails the
//! worker logs the error and drops the batch, so delivery is at-most-once.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use crate::batch::Batch;
use crate::error::SinkError;
use crate::line_protocol;

/// Destination for closed batches.
pub trait Sink: Send + 'static {
    /// Writes one batch, blocking until the backend has accepted or
    /// rejected it.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the backend did not accept the batch.
    fn write(&mut self, batch: &Batch) -> Result<(), SinkError>;
}

impl<F> Sink for F
where
    F: FnMut(&Batch) -> Result<(), SinkError> + Send + 'static,
{
    fn write(&mut self, batch: &Batch) -> Result<(), SinkError> {
        self(batch)
    }
}

/// Writes each batch as line protocol to an [`std::io::Write`].
///
/// Every point ends with a newline and the writer is flushed after each
/// batch. Empty batches write nothing.
#[derive(Debug)]
pub struct LineProtocolSink<W> {
    writer: W,
}

impl<W: Write + Send + 'static> LineProtocolSink<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send + 'static> Sink for LineProtocolSink<W> {
    fn write(&mut self, batch: &Batch) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut body = line_protocol::encode(batch);
        body.push('\n');
        self.writer.write_all(body.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps every batch it receives in memory.
///
/// Clones share the same storage, so a test can hand one clone to a hook
/// and inspect the batches through another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    batches: Arc<Mutex<Vec<Batch>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every batch written so far, oldest first.
    pub fn batches(&self) -> Vec<Batch> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of batches written so far.
    pub fn batch_count(&self) -> usize {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total number of points across all batches.
    pub fn point_count(&self) -> usize {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(Batch::len)
            .sum()
    }
}

impl Sink for MemorySink {
    fn write(&mut self, batch: &Batch) -> Result<(), SinkError> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Precision;
    use crate::point::{FieldValue, Point};
    use std::collections::BTreeMap;
    use std::time::{Duration, UNIX_EPOCH};

    fn batch_of(n: i64) -> Batch {
        let mut batch = Batch::new("db", Precision::Second);
        for i in 0..n {
            let mut fields = BTreeMap::new();
            fields.insert("v".to_string(), FieldValue::Integer(i));
            batch.push(
                Point::new(
                    "m",
                    BTreeMap::new(),
                    fields,
                    UNIX_EPOCH + Duration::from_secs(1),
                )
                .unwrap(),
            );
        }
        batch
    }

    #[test]
    fn test_line_protocol_sink_writes_lines() {
        let mut sink = LineProtocolSink::new(Vec::new());
        sink.write(&batch_of(2)).unwrap();
        sink.write(&batch_of(0)).unwrap();
        sink.write(&batch_of(1)).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "m v=0i 1\nm v=1i 1\nm v=0i 1\n");
    }

    #[test]
    fn test_memory_sink_shares_storage() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();

        writer.write(&batch_of(3)).unwrap();
        writer.write(&batch_of(0)).unwrap();

        assert_eq!(sink.batch_count(), 2);
        assert_eq!(sink.point_count(), 3);
        assert!(sink.batches()[1].is_empty());
    }

    #[test]
    fn test_closure_sinks() {
        let seen = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&seen);
        let mut closure = move |batch: &Batch| {
            *counter.lock().unwrap() += batch.len();
            Ok::<(), SinkError>(())
        };
        Sink::write(&mut closure, &batch_of(2)).unwrap();
        assert_eq!(*seen.lock().unwrap(), 2);

        let mut boxed: Box<dyn Sink> = Box::new(|_: &Batch| {
            Err::<(), SinkError>(SinkError::Rejected {
                reason: "read-only".to_string(),
            })
        });
        let err = boxed.write(&batch_of(1)).unwrap_err();
        assert!(matches!(err, SinkError::Rejected { .. }));
    }
}
