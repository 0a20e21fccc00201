//! Error taxonomy of the counting engine.
//!
//! Configuration errors are fatal and raised immediately. Query cancellation
//! is the only condition the coordinator retries, and only by shrinking the
//! batch. Every other database failure propagates unmodified; the engine does
//! not mask or reinterpret errors it does not understand.

use thiserror::Error;

/// Failure surfaced by a [`BatchSource`](crate::source::BatchSource).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The database canceled the query for exceeding its time budget.
    #[error("query canceled: {0}")]
    Canceled(String),

    /// Any other database failure (connectivity, permissions, syntax).
    #[error("database error: {0}")]
    Database(String),
}

/// Fatal error raised by [`BatchDistinctCounter`](crate::counter::BatchDistinctCounter).
///
/// Degenerate parameters are not errors; they yield
/// [`CountResult::Unavailable`](crate::counter::CountResult::Unavailable)
/// because the caller can recover by picking different parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CountError {
    /// Scan bounds must be non-negative.
    #[error("scan bounds must be non-negative: start {start}, finish {finish}")]
    NegativeBounds { start: i64, finish: i64 },

    /// The engine issues many independent short transactions; nesting inside
    /// a caller's transaction would defeat batching and risk long lock holds.
    #[error("cannot count inside an open transaction")]
    OpenTransaction,

    /// Database failure other than query cancellation.
    #[error(transparent)]
    Source(#[from] SourceError),
}
