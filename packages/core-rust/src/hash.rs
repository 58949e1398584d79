//! FNV-1a hash used to route record keys to partitions.
//!
//! The hash runs over the key's UTF-8 bytes, so the partition a key lands in
//! is stable across processes, platforms, and releases. Anything that reads
//! partitioned data written by another process depends on that stability.

/// FNV-1a offset basis (32-bit).
const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;

/// FNV-1a prime (32-bit).
const FNV_PRIME: u32 = 0x0100_0193;

/// Computes a 32-bit FNV-1a hash of the bytes of `s`.
///
/// # Examples
///
/// ```
/// use fedtable_core::hash::fnv1a_hash;
///
/// assert_eq!(fnv1a_hash("hello"), 1_335_831_723);
/// assert_eq!(fnv1a_hash(""), 2_166_136_261); // FNV offset basis
/// ```
#[must_use]
pub fn fnv1a_hash(s: &str) -> u32 {
    s.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_hash_known_vectors() {
        assert_eq!(fnv1a_hash("hello"), 1_335_831_723);
        assert_eq!(fnv1a_hash("key1"), 927_623_783);
        assert_eq!(fnv1a_hash(""), 2_166_136_261); // 0x811c9dc5
    }

    #[test]
    fn fnv1a_hash_deterministic() {
        let h1 = fnv1a_hash("consistent-string");
        let h2 = fnv1a_hash("consistent-string");
        assert_eq!(h1, h2);
    }

    #[test]
    fn fnv1a_hash_case_and_whitespace_sensitive() {
        assert_ne!(fnv1a_hash("Hello"), fnv1a_hash("hello"));
        assert_ne!(fnv1a_hash("hello world"), fnv1a_hash("hello  world"));
    }

    #[test]
    fn fnv1a_hash_distribution_1000_unique() {
        let mut set = std::collections::HashSet::new();
        for i in 0..1000 {
            set.insert(fnv1a_hash(&format!("item-{i}")));
        }
        assert_eq!(set.len(), 1000);
    }
}
