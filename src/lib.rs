//! `batch-distinct-counter` estimates the number of distinct values of a
//! database column across an arbitrarily large table without running an exact
//! `COUNT(DISTINCT ...)` scan.
//!
//! The engine is built from three components:
//! - [`sketch`] - the hash/register codec: maps one column value to a
//!   (bucket, rank) pair and folds accumulated pairs into a cardinality
//!   estimate over `m = 512` registers. Pure arithmetic, no I/O.
//! - [`planner`] - the batch query planner: turns a dataset descriptor and a
//!   key range into one round-trip aggregation query and parses its rows back
//!   into a partial sketch.
//! - [`counter`] - the adaptive batch coordinator: executes batches in
//!   increasing key order, merges partial sketches, halves the batch size
//!   when the database cancels a query under load, throttles between batches,
//!   and bounds total work.
//!
//! The database environment is consumed through the [`source::BatchSource`]
//! trait so the transaction-state precondition and query execution stay
//! explicit and mockable. [`memory::MemorySource`] is an in-memory
//! implementation that hashes values in-process instead of pushing the
//! arithmetic into SQL.
//!
//! Estimates carry the usual HyperLogLog statistical error (roughly 2%
//! relative standard error at 512 registers). A degenerate configuration or
//! an exhausted retry budget yields [`CountResult::Unavailable`] rather than
//! an error, because the caller can recover by choosing other parameters.
//!
//! # Example
//!
//! ```
//! use batch_distinct_counter::memory::MemorySource;
//! use batch_distinct_counter::{BatchDistinctCounter, CountOptions, CountResult, Dataset};
//!
//! let mut source = MemorySource::new();
//! for key in 0..10 {
//!     source.insert(key, Some(if key % 2 == 0 { "a" } else { "b" }));
//! }
//!
//! let dataset = Dataset::new("events", "id").with_column("kind");
//! let result = BatchDistinctCounter::new(&mut source, &dataset)
//!     .count(CountOptions::default())
//!     .unwrap();
//! assert!(matches!(result, CountResult::Estimate(1..=3)));
//! ```

pub mod counter;
pub mod error;
pub mod memory;
pub mod planner;
pub mod sketch;
pub mod source;

pub use counter::{BatchDistinctCounter, CountOptions, CountResult};
pub use error::{CountError, SourceError};
pub use planner::{BatchQuery, Dataset};
pub use sketch::Sketch;
pub use source::{BatchSource, BucketRow};
