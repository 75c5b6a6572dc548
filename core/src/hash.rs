//! State hashing: per-table FNV-1a rollup over authoritative columns in slot
//! order, mixed into one world-level hash in `table_id` order.

use std::hash::Hasher;

use fnv::FnvHasher;

use crate::codec::Encode;

/// Accumulates one table's row bytes into an FNV-1a hash. Fed the exact bytes
/// [`crate::codec::Encode`] would write to a snapshot, so hashing and
/// serialization never disagree about a value's representation.
pub struct RowHasher {
    hasher: FnvHasher,
}

impl RowHasher {
    pub fn new() -> Self {
        RowHasher { hasher: FnvHasher::default() }
    }

    #[inline]
    pub fn write<T: Encode>(&mut self, value: &T) {
        let mut buf = Vec::with_capacity(T::SIZE);
        value.encode(&mut buf);
        self.hasher.write(&buf);
    }

    pub fn finish(self) -> u64 {
        self.hasher.finish()
    }
}

impl Default for RowHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Combines per-table hashes (already in `table_id` order) into one
/// world-level hash via a second FNV-1a pass over their little-endian bytes.
pub fn mix_table_hashes(table_hashes: &[u64]) -> u64 {
    let mut hasher = FnvHasher::default();
    for h in table_hashes {
        hasher.write(&h.to_le_bytes());
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_byte_sequences_hash_identically() {
        let mut a = RowHasher::new();
        let mut b = RowHasher::new();
        a.write(&42i32);
        b.write(&42i32);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn field_order_affects_the_hash() {
        let mut a = RowHasher::new();
        a.write(&1i32);
        a.write(&2i32);

        let mut b = RowHasher::new();
        b.write(&2i32);
        b.write(&1i32);

        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn mix_is_order_sensitive() {
        let a = mix_table_hashes(&[1, 2, 3]);
        let b = mix_table_hashes(&[3, 2, 1]);
        assert_ne!(a, b);
    }
}
