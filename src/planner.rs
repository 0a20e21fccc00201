//! Batch query planner: translates a dataset descriptor and a key range into
//! one round-trip aggregation query, and parses the response rows back into a
//! partial sketch.
//!
//! Hashing and bit arithmetic are pushed into the query so that at most one
//! row per observed bucket crosses the wire:
//!
//! ```sql
//! SELECT hashed & 511 AS bucket, MIN(hashed & 2147483647) AS min_payload
//! FROM (SELECT hashtext(("col")::text) AS hashed
//!       FROM "table"
//!       WHERE "id" >= lo AND "id" < hi AND "col" IS NOT NULL) relation
//! GROUP BY 1
//! ```
//!
//! The planner issues exactly one query per invocation and never retries;
//! retry policy belongs to the coordinator, so cancellation failures surface
//! unmodified.

use crate::error::SourceError;
use crate::sketch::{Sketch, BUCKET_MASK, PAYLOAD_MASK};
use crate::source::{BatchSource, BucketRow};

/// Identifies the relation to scan, its range-scannable primary key, and the
/// target column whose distinct values are counted. Immutable for the
/// duration of one count operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    table: String,
    primary_key: String,
    column: Option<String>,
}

impl Dataset {
    /// Dataset counting distinct values of the primary key itself.
    pub fn new(table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: primary_key.into(),
            column: None,
        }
    }

    /// Count distinct values of `column` instead of the primary key.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Column whose distinct values are counted; defaults to the primary key.
    pub fn target_column(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.primary_key)
    }
}

/// One rendered batch aggregation query over the half-open range `[lo, hi)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchQuery {
    pub sql: String,
    pub lo: i64,
    pub hi: i64,
}

/// Render the aggregation query for one batch: rows with a primary key in
/// `[lo, hi)` and a non-null target column, hashed, grouped by bucket, with
/// the minimum payload per group.
pub fn bucket_query(dataset: &Dataset, lo: i64, hi: i64) -> BatchQuery {
    let column = quote_ident(dataset.target_column());
    let key = quote_ident(dataset.primary_key());
    let sql = format!(
        "SELECT hashed & {BUCKET_MASK} AS bucket, \
         MIN(hashed & {PAYLOAD_MASK}) AS min_payload \
         FROM (SELECT hashtext(({column})::text) AS hashed \
         FROM {table} \
         WHERE {key} >= {lo} AND {key} < {hi} \
         AND {column} IS NOT NULL) relation \
         GROUP BY 1",
        table = quote_ident(dataset.table()),
    );
    BatchQuery { sql, lo, hi }
}

/// Render the primary-key bounds query used to resolve default scan bounds.
pub fn bounds_query(dataset: &Dataset) -> String {
    let key = quote_ident(dataset.primary_key());
    format!(
        "SELECT MIN({key}), MAX({key}) FROM {table}",
        table = quote_ident(dataset.table()),
    )
}

/// Quote an identifier for interpolation into rendered SQL.
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Fold raw response rows into the partial sketch for one batch.
///
/// Both fields are masked to their bit widths; the database hash is signed,
/// so a negative bucket value still selects its low 9 bits.
pub fn partial_sketch(rows: &[BucketRow]) -> Sketch {
    let mut sketch = Sketch::new();
    for row in rows {
        let bucket = (row.bucket as u32 & BUCKET_MASK) as u16;
        let payload = row.min_payload as u32 & PAYLOAD_MASK;
        sketch.observe_payload(bucket, payload);
    }
    sketch
}

/// Execute exactly one batch query over `[lo, hi)` and return its partial
/// sketch.
pub fn fetch_partial<S: BatchSource>(
    source: &mut S,
    dataset: &Dataset,
    lo: i64,
    hi: i64,
) -> Result<Sketch, SourceError> {
    let query = bucket_query(dataset, lo, hi);
    let rows = source.bucket_minimums(&query)?;
    Ok(partial_sketch(&rows))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::sketch::rank;

    fn dataset() -> Dataset {
        Dataset::new("events", "id").with_column("user_id")
    }

    #[test]
    fn test_target_column_defaults_to_primary_key() {
        assert_eq!(Dataset::new("events", "id").target_column(), "id");
        assert_eq!(dataset().target_column(), "user_id");
    }

    #[test]
    fn test_bucket_query_shape() {
        let query = bucket_query(&dataset(), 100, 200);
        assert_eq!(query.lo, 100);
        assert_eq!(query.hi, 200);
        assert!(query.sql.contains("hashed & 511 AS bucket"));
        assert!(query.sql.contains("MIN(hashed & 2147483647) AS min_payload"));
        assert!(query.sql.contains("hashtext((\"user_id\")::text)"));
        assert!(query.sql.contains("FROM \"events\""));
        assert!(query.sql.contains("\"id\" >= 100 AND \"id\" < 200"));
        assert!(query.sql.contains("\"user_id\" IS NOT NULL"));
        assert!(query.sql.contains("GROUP BY 1"));
    }

    #[test]
    fn test_bounds_query_shape() {
        assert_eq!(
            bounds_query(&dataset()),
            "SELECT MIN(\"id\"), MAX(\"id\") FROM \"events\""
        );
    }

    #[test_case("plain" => "\"plain\"")]
    #[test_case("we\"ird" => "\"we\"\"ird\""; "embedded quote doubled")]
    fn test_quote_ident(ident: &str) -> String {
        quote_ident(ident)
    }

    #[test]
    fn test_partial_sketch_applies_rank() {
        let rows = [
            BucketRow {
                bucket: 3,
                min_payload: 1,
            },
            BucketRow {
                bucket: 508,
                min_payload: 0x4000_0000,
            },
        ];
        let sketch = partial_sketch(&rows);
        assert_eq!(sketch.observed_buckets(), 2);

        let mut expected = Sketch::new();
        expected.observe_rank(3, rank(1));
        expected.observe_rank(508, rank(0x4000_0000));
        assert_eq!(sketch, expected);
    }

    #[test]
    fn test_partial_sketch_masks_signed_values() {
        // hashtext yields signed 32-bit values; -1 has all bits set.
        let rows = [BucketRow {
            bucket: -1,
            min_payload: -1,
        }];
        let sketch = partial_sketch(&rows);

        let mut expected = Sketch::new();
        expected.observe_payload(511, PAYLOAD_MASK);
        assert_eq!(sketch, expected);
    }
}
