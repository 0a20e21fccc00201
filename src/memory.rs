//! In-memory [`BatchSource`] backed by a sorted key/value table.
//!
//! This is the pull-up variant of the batch query: column values are hashed
//! in-process and reduced with the same group-by-bucket / minimum-payload
//! contract the rendered SQL expresses, so it produces rows identical to a
//! push-down execution over the same data. It also serves as the test double
//! for the coordinator, with scripted cancellation and a log of every
//! attempted batch.

use std::collections::BTreeMap;

use crate::error::SourceError;
use crate::planner::{BatchQuery, Dataset};
use crate::sketch::{hash_value, split};
use crate::source::{BatchSource, BucketRow};

/// In-memory dataset mapping primary key to an optional column value.
#[derive(Debug, Default)]
pub struct MemorySource {
    rows: BTreeMap<i64, Option<String>>,
    in_transaction: bool,
    cancel_wider_than: Option<i64>,
    executed: Vec<BatchQuery>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one row; `None` stands for a NULL target column.
    pub fn insert(&mut self, key: i64, value: Option<&str>) {
        self.rows.insert(key, value.map(str::to_owned));
    }

    /// Pretend the calling context holds an open transaction.
    pub fn set_in_transaction(&mut self, value: bool) {
        self.in_transaction = value;
    }

    /// Cancel any batch spanning more than `width` keys, simulating a
    /// database statement timeout.
    pub fn cancel_batches_wider_than(&mut self, width: i64) {
        self.cancel_wider_than = Some(width);
    }

    /// Every batch query attempted so far, canceled ones included, in order.
    pub fn executed(&self) -> &[BatchQuery] {
        &self.executed
    }
}

impl BatchSource for MemorySource {
    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn key_bounds(&mut self, _dataset: &Dataset) -> Result<Option<(i64, i64)>, SourceError> {
        let min = self.rows.keys().next().copied();
        let max = self.rows.keys().next_back().copied();
        Ok(min.zip(max))
    }

    fn bucket_minimums(&mut self, query: &BatchQuery) -> Result<Vec<BucketRow>, SourceError> {
        self.executed.push(query.clone());
        if let Some(width) = self.cancel_wider_than {
            if query.hi - query.lo > width {
                return Err(SourceError::Canceled("statement timeout".to_owned()));
            }
        }

        let mut minima: BTreeMap<u16, u32> = BTreeMap::new();
        for value in self
            .rows
            .range(query.lo..query.hi)
            .filter_map(|(_, value)| value.as_deref())
        {
            let (bucket, payload) = split(hash_value(value));
            let minimum = minima.entry(bucket).or_insert(payload);
            if *minimum > payload {
                *minimum = payload;
            }
        }

        Ok(minima
            .into_iter()
            .map(|(bucket, payload)| BucketRow {
                bucket: i64::from(bucket),
                min_payload: i64::from(payload),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::bucket_query;

    fn dataset() -> Dataset {
        Dataset::new("events", "id").with_column("user_id")
    }

    #[test]
    fn test_key_bounds_of_empty_source() {
        let mut source = MemorySource::new();
        assert_eq!(source.key_bounds(&dataset()).unwrap(), None);
    }

    #[test]
    fn test_key_bounds_span_inserted_keys() {
        let mut source = MemorySource::new();
        source.insert(7, Some("a"));
        source.insert(99, Some("b"));
        source.insert(42, None);
        assert_eq!(source.key_bounds(&dataset()).unwrap(), Some((7, 99)));
    }

    #[test]
    fn test_null_rows_are_filtered() {
        let mut source = MemorySource::new();
        source.insert(1, Some("a"));
        source.insert(2, None);
        source.insert(3, None);

        let rows = source
            .bucket_minimums(&bucket_query(&dataset(), 0, 10))
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_range_is_half_open() {
        let mut source = MemorySource::new();
        source.insert(10, Some("low"));
        source.insert(20, Some("high"));

        let rows = source
            .bucket_minimums(&bucket_query(&dataset(), 10, 20))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(source.executed().len(), 1);
    }

    #[test]
    fn test_minimum_payload_wins_within_bucket() {
        let mut source = MemorySource::new();
        // Same value on every row: one bucket, one minimum.
        for key in 0..5 {
            source.insert(key, Some("dup"));
        }

        let rows = source
            .bucket_minimums(&bucket_query(&dataset(), 0, 5))
            .unwrap();
        let (bucket, payload) = split(hash_value("dup"));
        assert_eq!(
            rows,
            vec![BucketRow {
                bucket: i64::from(bucket),
                min_payload: i64::from(payload),
            }]
        );
    }

    #[test]
    fn test_scripted_cancellation() {
        let mut source = MemorySource::new();
        source.insert(1, Some("a"));
        source.cancel_batches_wider_than(100);

        let wide = source.bucket_minimums(&bucket_query(&dataset(), 0, 1_000));
        assert!(matches!(wide, Err(SourceError::Canceled(_))));

        let narrow = source.bucket_minimums(&bucket_query(&dataset(), 0, 100));
        assert!(narrow.is_ok());
        assert_eq!(source.executed().len(), 2);
    }
}
