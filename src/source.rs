//! Capability seam between the engine and its database environment.
//!
//! The engine consumes exactly three capabilities: transaction-state
//! inspection, primary-key bounds, and execution of one grouped-minimum batch
//! query. Passing them as an explicit handle keeps the "no open transaction"
//! precondition checkable and mockable at the call site instead of hiding it
//! in ambient global state.

use crate::error::SourceError;
use crate::planner::{BatchQuery, Dataset};

/// One raw response row of the batch aggregation query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketRow {
    /// Bucket index (low 9 bits of the value hash).
    pub bucket: i64,
    /// Minimum 31-bit payload observed for the bucket within the batch.
    pub min_payload: i64,
}

/// Database capabilities consumed by the engine.
///
/// Implementations backed by a real driver execute [`BatchQuery::sql`] and
/// [`bounds_query`](crate::planner::bounds_query). They must report a
/// statement-timeout cancellation as [`SourceError::Canceled`], must not wrap
/// batches in a long-lived transaction, and must leave every other failure
/// distinguishable as [`SourceError::Database`].
pub trait BatchSource {
    /// Whether the calling context currently holds an open transaction.
    fn in_transaction(&self) -> bool;

    /// Minimum and maximum primary key of the dataset, `None` when empty.
    fn key_bounds(&mut self, dataset: &Dataset) -> Result<Option<(i64, i64)>, SourceError>;

    /// Execute one batch aggregation query, returning raw bucket minima.
    fn bucket_minimums(&mut self, query: &BatchQuery) -> Result<Vec<BucketRow>, SourceError>;
}
