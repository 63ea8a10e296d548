//! Batches of points destined for one flush.

use crate::config::{Config, Precision};
use crate::point::Point;

/// Upper bound on the points reserved up front for one batch.
const PREALLOCATE_LIMIT: usize = 1024;

/// An ordered group of points written to the backend in one call.
///
/// A batch belongs to exactly one flush cycle: the worker opens it, appends
/// points in dequeue order, hands it to the sink once and drops it.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    database: String,
    precision: Precision,
    points: Vec<Point>,
}

impl Batch {
    /// Creates an empty batch for the given destination.
    pub fn new(database: impl Into<String>, precision: Precision) -> Self {
        Self {
            database: database.into(),
            precision,
            points: Vec::new(),
        }
    }

    /// Creates an empty batch sized for one cycle of `config`.
    ///
    /// At most 1024 points are reserved up front; larger batches grow as
    /// points arrive.
    pub fn for_config(config: &Config) -> Self {
        Self {
            database: config.database.clone(),
            precision: config.precision,
            points: Vec::with_capacity(config.batch_size.min(PREALLOCATE_LIMIT)),
        }
    }

    /// Appends a point.
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Number of points in the batch.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the batch holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Destination database.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Timestamp precision the batch is encoded with.
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// The points, in the order they were appended.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Consumes the batch and returns its points.
    pub fn into_points(self) -> Vec<Point> {
        self.points
    }
}
