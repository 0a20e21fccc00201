//! Hash/register codec: maps one column value to a (bucket, rank) pair and
//! folds accumulated pairs into a cardinality estimate.
//!
//! The codec is a fixed-parameter HyperLogLog-style sketch with `m = 512`
//! registers. From the low 32 bits of the value hash:
//! - `bucket`  - low 9 bits, integer in `[0, 511]`.
//! - `payload` - the hash with its top bit masked, a 31-bit unsigned integer.
//! - `rank`    - `31 - floor(log2(payload))`, the position of the payload's
//!   highest set bit counted from the top of the 31-bit field. A smaller
//!   payload is a rarer event and yields a larger rank.
//!
//! Only observed buckets are materialized; an absent bucket means rank 0.
//! Merging keeps the per-bucket maximum rank, so merge is commutative,
//! associative, and idempotent and the estimate does not depend on how the
//! scan was partitioned into batches.

use std::collections::BTreeMap;
use std::hash::Hasher;

use wyhash::WyHash;

/// Number of registers (9 bits of bucket address space).
pub const TOTAL_BUCKETS: usize = 512;
/// Largest representable rank; also the rank assigned to a zero payload.
pub const MAX_RANK: u8 = 31;
/// Mask extracting the bucket index from a 32-bit hash.
pub const BUCKET_MASK: u32 = (TOTAL_BUCKETS as u32) - 1;
/// Mask extracting the 31-bit payload from a 32-bit hash.
pub const PAYLOAD_MASK: u32 = 0x7fff_ffff;

/// Hash the textual representation of a column value down to 32 bits.
#[inline]
pub fn hash_value(value: &str) -> u32 {
    let mut hasher = WyHash::default();
    hasher.write(value.as_bytes());
    hasher.finish() as u32
}

/// Split a 32-bit hash into its bucket index and 31-bit payload.
#[inline]
pub fn split(hash: u32) -> (u16, u32) {
    ((hash & BUCKET_MASK) as u16, hash & PAYLOAD_MASK)
}

/// Rank of a 31-bit payload: `31 - floor(log2(payload))`. A zero payload maps
/// to the maximal rank so the estimator never evaluates `log2(0)`.
#[inline]
pub fn rank(payload: u32) -> u8 {
    if payload == 0 {
        MAX_RANK
    } else {
        // For values below 2^31 this equals 31 - floor(log2(payload)).
        payload.leading_zeros() as u8
    }
}

/// Accumulated bucket-to-rank register map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sketch {
    registers: BTreeMap<u16, u8>,
}

impl Sketch {
    /// Create an empty sketch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buckets that have observed at least one value.
    #[inline]
    pub fn observed_buckets(&self) -> usize {
        self.registers.len()
    }

    /// Whether no value has been observed yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Record one value, hashing it in-process.
    #[inline]
    pub fn insert(&mut self, value: &str) {
        let (bucket, payload) = split(hash_value(value));
        self.observe_payload(bucket, payload);
    }

    /// Record a payload routed to `bucket`.
    ///
    /// Within a batch only the minimum payload per bucket matters, because
    /// minimum payload means maximum rank; feeding every payload through here
    /// yields the same registers as a pre-reduced batch.
    #[inline]
    pub fn observe_payload(&mut self, bucket: u16, payload: u32) {
        self.observe_rank(bucket, rank(payload));
    }

    /// Record an already-computed rank for `bucket`, keeping the maximum.
    #[inline]
    pub fn observe_rank(&mut self, bucket: u16, rank: u8) {
        let register = self.registers.entry(bucket).or_insert(rank);
        if *register < rank {
            *register = rank;
        }
    }

    /// Fold another sketch into this one, keeping per-bucket maxima.
    ///
    /// Safe to apply in any order and any number of times, since batches may
    /// be retried after a cancellation.
    pub fn merge(&mut self, rhs: &Sketch) {
        for (&bucket, &rank) in &rhs.registers {
            self.observe_rank(bucket, rank);
        }
    }

    /// Cardinality estimate of the accumulated registers.
    ///
    /// `raw = alpha_m * m^2 / (zero_buckets + sum(2^-rank))`, with a
    /// linear-counting style correction `alpha_m * m * log2(m / zero_buckets)`
    /// when empty buckets remain and the raw estimate falls below `2.5 * m`.
    /// The correction keeps the `alpha_m` factor of the source formula rather
    /// than the textbook variant. The result is truncated to an integer.
    pub fn estimate(&self) -> u64 {
        let m = TOTAL_BUCKETS as f64;
        let alpha = 0.7213 / (1.0 + 1.079 / m);
        let zero_buckets = (TOTAL_BUCKETS - self.registers.len()) as f64;
        let sum: f64 = self
            .registers
            .values()
            .map(|&rank| (-f64::from(rank)).exp2())
            .sum();
        let raw = alpha * m * m / (zero_buckets + sum);

        if zero_buckets > 0.0 && raw < 2.5 * m {
            (alpha * m * (m / zero_buckets).log2()) as u64
        } else {
            raw as u64
        }
    }
}
