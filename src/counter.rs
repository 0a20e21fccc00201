//! Adaptive batch coordinator: owns one end-to-end counting operation, from
//! bound resolution through batched scanning, cancellation-driven batch
//! shrinking, throttling, and the final estimate.
//!
//! The loop is deliberately single-threaded: each batch completes, merges,
//! and sleeps before the next starts, to reduce concurrent load on the shared
//! database rather than maximize throughput. Termination is guaranteed by the
//! [`MAX_ALLOWED_LOOPS`] bound and the shrink-floor abort, not by elapsed
//! time.

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{CountError, SourceError};
use crate::planner::{self, Dataset};
use crate::sketch::Sketch;
use crate::source::BatchSource;

/// Default number of keys scanned per batch, sized so a single batch query is
/// expected to complete in well under a second.
pub const DEFAULT_BATCH_SIZE: i64 = 100_000;
/// Smallest batch size worth issuing; at or below this the operation is not
/// expected to converge and is rejected up front.
pub const MIN_REQUIRED_BATCH_SIZE: i64 = 1_250;
/// Upper bound on the number of batches, protecting against key ranges too
/// large relative to the batch size.
pub const MAX_ALLOWED_LOOPS: i64 = 10_000;
/// Pause between successful batches to throttle load on the shared database.
pub const SLEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Terminal value of one counting operation.
///
/// `Unavailable` is a distinguished "no safe estimate could be produced"
/// outcome, not an error: the caller may retry with different parameters, and
/// must never display it as a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountResult {
    /// Approximate number of distinct values.
    Estimate(u64),
    /// No safe or affordable estimate could be produced.
    Unavailable,
}

impl CountResult {
    /// Legacy integer form: the estimate, or `-1` when unavailable.
    pub fn to_i64(self) -> i64 {
        match self {
            CountResult::Estimate(count) => count as i64,
            CountResult::Unavailable => -1,
        }
    }

    pub fn is_unavailable(self) -> bool {
        self == CountResult::Unavailable
    }
}

/// Optional parameters of one counting operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountOptions {
    /// Keys per batch; defaults to [`DEFAULT_BATCH_SIZE`].
    pub batch_size: Option<i64>,
    /// Inclusive lower key bound; defaults to the dataset's minimum key.
    pub start: Option<i64>,
    /// Inclusive upper key bound; defaults to the dataset's maximum key.
    pub finish: Option<i64>,
}

/// Drives one approximate distinct-count operation over a dataset.
///
/// Owns the sketch, cursor, and batch size for the duration of the call;
/// nothing is shared between invocations.
pub struct BatchDistinctCounter<'a, S> {
    source: &'a mut S,
    dataset: &'a Dataset,
}

impl<'a, S: BatchSource> BatchDistinctCounter<'a, S> {
    pub fn new(source: &'a mut S, dataset: &'a Dataset) -> Self {
        Self { source, dataset }
    }

    /// Run the counting operation to completion.
    ///
    /// Raises [`CountError`] on configuration errors (open transaction,
    /// negative bounds) and on database failures other than cancellation.
    /// Degenerate parameters and an exhausted shrink budget return
    /// [`CountResult::Unavailable`] without raising.
    pub fn count(&mut self, options: CountOptions) -> Result<CountResult, CountError> {
        if self.source.in_transaction() {
            return Err(CountError::OpenTransaction);
        }

        let batch_size = options.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        let (start, finish) = self.resolve_bounds(options)?;
        if start < 0 || finish < 0 {
            return Err(CountError::NegativeBounds { start, finish });
        }
        if unwanted_configuration(start, finish, batch_size) {
            debug!(start, finish, batch_size, "degenerate configuration, no estimate");
            return Ok(CountResult::Unavailable);
        }

        self.scan(start, finish, batch_size)
    }

    /// Resolve missing bounds from the dataset's observed key range, `0` for
    /// an empty dataset.
    fn resolve_bounds(&mut self, options: CountOptions) -> Result<(i64, i64), CountError> {
        match (options.start, options.finish) {
            (Some(start), Some(finish)) => Ok((start, finish)),
            (start, finish) => {
                let (min, max) = self.source.key_bounds(self.dataset)?.unwrap_or((0, 0));
                Ok((start.unwrap_or(min), finish.unwrap_or(max)))
            }
        }
    }

    /// Scan `[start, finish]` in `batch_size` steps, shrinking on
    /// cancellation and abandoning once the shrink floor is reached.
    fn scan(
        &mut self,
        start: i64,
        finish: i64,
        mut batch_size: i64,
    ) -> Result<CountResult, CountError> {
        let mut sketch = Sketch::new();
        let mut batch_start = start;

        while batch_start <= finish {
            let batch_end = batch_start + batch_size;
            match planner::fetch_partial(self.source, self.dataset, batch_start, batch_end) {
                Ok(partial) => {
                    sketch.merge(&partial);
                    debug!(
                        batch_start,
                        batch_end,
                        observed = sketch.observed_buckets(),
                        "batch merged"
                    );
                    batch_start += batch_size;
                    thread::sleep(SLEEP_INTERVAL);
                }
                Err(SourceError::Canceled(reason)) => {
                    // Keep the cursor: retry the same range with a smaller
                    // batch, which stays within the database's time budget
                    // and hits a now-warmer cache.
                    if batch_size >= 2 * MIN_REQUIRED_BATCH_SIZE {
                        batch_size /= 2;
                        warn!(batch_start, batch_size, %reason, "batch canceled, shrinking");
                    } else {
                        warn!(batch_start, batch_size, %reason, "shrink floor reached, abandoning");
                        return Ok(CountResult::Unavailable);
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(CountResult::Estimate(sketch.estimate()))
    }
}

/// Configurations that would never converge or would exceed the loop budget.
fn unwanted_configuration(start: i64, finish: i64, batch_size: i64) -> bool {
    batch_size <= MIN_REQUIRED_BATCH_SIZE
        || (finish - start) / batch_size >= MAX_ALLOWED_LOOPS
        || start > finish
}
