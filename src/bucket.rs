//! Fixed-size array of buckets, each holding `entries_per_bucket` fingerprint
//! slots, packed contiguously by a [`BucketLayout`].

use rand::Rng;
#[cfg(feature = "serde_support")]
use serde_bytes::ByteBuf;
#[cfg(feature = "serde_support")]
use serde_derive::{Deserialize, Serialize};

use crate::bit_packer::BucketLayout;

/// Owns the contiguous bucket storage and defers slot access to the layout.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct BucketTable {
    layout: BucketLayout,
    bucket_bytes: usize,
    #[cfg_attr(feature = "serde_support", serde(with = "bucket_bytes_as_bytebuf"))]
    buckets: Box<[u8]>,
    n: usize,
}

#[cfg(feature = "serde_support")]
mod bucket_bytes_as_bytebuf {
    use super::ByteBuf;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(buckets: &Box<[u8]>, s: S) -> Result<S::Ok, S::Error> {
        serde_bytes::serialize(buckets.as_ref(), s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Box<[u8]>, D::Error> {
        Ok(ByteBuf::deserialize(d)?.into_vec().into_boxed_slice())
    }
}

impl BucketTable {
    /// Creates a zero-initialized table of `n` buckets. `n` must be a power
    /// of two; callers (the filter) are responsible for that invariant.
    pub fn new(n: usize, layout: BucketLayout) -> Self {
        let bucket_bytes = layout.bucket_bytes();
        BucketTable {
            layout,
            bucket_bytes,
            buckets: vec![0u8; n * bucket_bytes].into_boxed_slice(),
            n,
        }
    }

    #[inline]
    fn bucket(&self, i: usize) -> &[u8] {
        let start = i * self.bucket_bytes;
        &self.buckets[start..start + self.bucket_bytes]
    }

    #[inline]
    fn bucket_mut(&mut self, i: usize) -> &mut [u8] {
        let start = i * self.bucket_bytes;
        &mut self.buckets[start..start + self.bucket_bytes]
    }

    pub fn entries_per_bucket(&self) -> usize {
        self.layout.entries_per_bucket()
    }

    /// Reads slot `j` of bucket `i`.
    pub fn get_fp(&self, i: usize, j: usize) -> u32 {
        self.layout.read(self.bucket(i), j)
    }

    /// Scans bucket `i` linearly; if any slot is empty, writes `fp` there.
    pub fn find_empty_and_insert(&mut self, i: usize, fp: u32) -> bool {
        let entries = self.entries_per_bucket();
        for j in 0..entries {
            if self.get_fp(i, j) == 0 {
                let layout = self.layout;
                layout.write(self.bucket_mut(i), j, fp);
                return true;
            }
        }
        false
    }

    /// Picks a slot of bucket `i` pseudo-randomly, overwrites it with `fp`,
    /// and returns the fingerprint that was displaced.
    pub fn evict_random<R: Rng + ?Sized>(&mut self, i: usize, fp: u32, rng: &mut R) -> u32 {
        let entries = self.entries_per_bucket();
        let j = rng.gen_range(0, entries);
        let evicted = self.get_fp(i, j);
        let layout = self.layout;
        layout.write(self.bucket_mut(i), j, fp);
        evicted
    }

    /// True if bucket `i` contains `fp` in any slot.
    pub fn contains(&self, i: usize, fp: u32) -> bool {
        self.layout.has_value(self.bucket(i), fp)
    }

    /// True if either bucket `i1` or `i2` contains `fp`.
    pub fn contains_either(&self, i1: usize, i2: usize, fp: u32) -> bool {
        self.contains(i1, fp) || self.contains(i2, fp)
    }

    /// Scans bucket `i`; if a slot holds `fp`, zeroes it and returns true.
    /// Only one matching slot is cleared per call.
    pub fn delete(&mut self, i: usize, fp: u32) -> bool {
        let entries = self.entries_per_bucket();
        for j in 0..entries {
            if self.get_fp(i, j) == fp {
                let layout = self.layout;
                layout.write(self.bucket_mut(i), j, 0);
                return true;
            }
        }
        false
    }

    /// Number of empty slots across the whole table.
    pub fn free_count(&self) -> usize {
        let entries = self.entries_per_bucket();
        let mut free = 0;
        for i in 0..self.n {
            for j in 0..entries {
                if self.get_fp(i, j) == 0 {
                    free += 1;
                }
            }
        }
        free
    }

    /// Number of occupied slots across the whole table.
    pub fn occupied_count(&self) -> usize {
        self.capacity() - self.free_count()
    }

    /// Number of buckets (`N`).
    pub fn size(&self) -> usize {
        self.n
    }

    /// Total slot count (`N * entries_per_bucket`).
    pub fn capacity(&self) -> usize {
        self.n * self.entries_per_bucket()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit_packer::BucketLayout;

    #[test]
    fn insert_fills_empty_slot_then_refuses() {
        let mut table = BucketTable::new(4, BucketLayout::W8B4);
        for fp in 1..=4 {
            assert!(table.find_empty_and_insert(0, fp));
        }
        assert!(!table.find_empty_and_insert(0, 5));
        assert!(table.contains(0, 1));
        assert!(table.contains(0, 4));
        assert!(!table.contains(0, 5));
    }

    #[test]
    fn delete_clears_one_matching_slot() {
        let mut table = BucketTable::new(4, BucketLayout::W8B4);
        table.find_empty_and_insert(0, 7);
        table.find_empty_and_insert(0, 7);
        assert!(table.delete(0, 7));
        assert_eq!(table.occupied_count(), 1);
        assert!(table.delete(0, 7));
        assert_eq!(table.occupied_count(), 0);
        assert!(!table.delete(0, 7));
    }

    #[test]
    fn free_and_occupied_counts_track_capacity() {
        let table = BucketTable::new(4, BucketLayout::W4B4);
        assert_eq!(table.capacity(), 16);
        assert_eq!(table.free_count(), 16);
        assert_eq!(table.occupied_count(), 0);
    }
}
