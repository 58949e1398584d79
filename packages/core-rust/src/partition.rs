//! Key-to-partition routing for partitioned engines.
//!
//! A partitioned table splits its records across `partitions` physical
//! shards. The shard of a record is `fnv1a_hash(key) % partitions`; a given
//! key always lands in the same shard for a given partition count.

use crate::hash::fnv1a_hash;

/// Default partition count for a table when the caller gives none.
pub const DEFAULT_PARTITIONS: u32 = 1;

/// Compute the partition for `key` among `partitions` shards.
///
/// A partition count of 0 is treated as 1.
///
/// # Examples
///
/// ```
/// use fedtable_core::partition::partition_for_key;
///
/// assert_eq!(partition_for_key("anything", 1), 0);
/// assert!(partition_for_key("hello", 16) < 16);
/// ```
#[must_use]
pub fn partition_for_key(key: &str, partitions: u32) -> u32 {
    fnv1a_hash(key) % partitions.max(1)
}

/// File name of a partition shard, e.g. `part-00003`.
#[must_use]
pub fn partition_file_name(partition: u32) -> String {
    format!("part-{partition:05}")
}

/// Parses a shard file name produced by [`partition_file_name`].
#[must_use]
pub fn parse_partition_file_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("part-")?;
    if digits.len() < 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
