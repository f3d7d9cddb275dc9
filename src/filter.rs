//! A single cuckoo filter: one bucket table, a single-slot victim cache, and
//! the bounded-kick insert/delete/contains protocol.

use std::cmp;
use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::marker::PhantomData;

use rand::Rng;
#[cfg(feature = "serde_support")]
use serde_derive::{Deserialize, Serialize};

use crate::bit_packer::BucketLayout;
use crate::bucket::BucketTable;
use crate::hash::HashOracle;
use crate::CuckooError;

/// Upper bound on the number of evictions attempted before an insert gives
/// up and stashes the displaced fingerprint in the victim cell.
pub const MAX_KICKS: usize = 500;

/// Multiplicative constant used to derive the partner bucket index from a
/// fingerprint, mirroring the reference implementation's partial-key mix.
const MURMUR_CONST: u32 = 0x5BD1E995;

/// The filter's default (width, entries_per_bucket) profile: one byte per
/// fingerprint, four entries per bucket.
const DEFAULT_WIDTH: u32 = 8;
const DEFAULT_ENTRIES_PER_BUCKET: usize = 4;

/// A single displaced (fingerprint, index) pair held when the bounded kick
/// loop in [`CuckooFilter::insert`] is exhausted. Modeled as a sum type
/// rather than the reference's "fingerprint==0 means empty" convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
enum Victim {
    Empty,
    Occupied { fingerprint: u32, index: usize },
}

impl Victim {
    fn is_occupied(&self) -> bool {
        matches!(self, Victim::Occupied { .. })
    }
}

/// A space-efficient probabilistic set: supports insert, membership test,
/// and deletion with a tunable false-positive rate and zero false
/// negatives, unlike a Bloom filter.
///
/// The hash provider `H` is injected as a type parameter (any
/// `Hasher + Default`) rather than hard-wired, so tests can swap in a
/// seeded, reproducible oracle; see [`crate::hash::FixedSipHasher`].
///
/// # Examples
///
/// ```
/// use cuckoofilter::CuckooFilter;
///
/// let mut filter = CuckooFilter::new(1000);
/// assert!(!filter.contains(&42));
/// filter.insert(&42).unwrap();
/// assert!(filter.contains(&42));
/// assert!(filter.delete(&42));
/// assert!(!filter.contains(&42));
/// ```
#[derive(Clone)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde_support", serde(bound = ""))]
pub struct CuckooFilter<H: HashOracle = DefaultHasher> {
    pub(crate) table: BucketTable,
    victim: Victim,
    len: usize,
    fp_mask: u32,
    _hasher: PhantomData<H>,
}

impl CuckooFilter<DefaultHasher> {
    /// Constructs a filter with the default profile (8-bit fingerprints, 4
    /// entries per bucket) and a maximum table size rounded down to the
    /// nearest power of two.
    pub fn new(max_table_size: u32) -> Self {
        Self::with_params(max_table_size, DEFAULT_WIDTH, DEFAULT_ENTRIES_PER_BUCKET)
            .expect("default profile (8, 4) is always valid")
    }
}

impl<H: HashOracle> CuckooFilter<H> {
    /// Constructs a filter with an explicit `(width, entries_per_bucket)`
    /// profile. Only the five profiles in [`crate::bit_packer`] are
    /// accepted; anything else is a construction-time error.
    pub fn with_params(
        max_table_size: u32,
        width: u32,
        entries_per_bucket: usize,
    ) -> Result<Self, CuckooError> {
        let layout = BucketLayout::from_params(entries_per_bucket, width)?;
        let n = highest_power_of_two(max_table_size);
        Ok(Self::from_table(BucketTable::new(n, layout), layout.fp_mask()))
    }

    pub(crate) fn from_table(table: BucketTable, fp_mask: u32) -> Self {
        CuckooFilter {
            table,
            victim: Victim::Empty,
            len: 0,
            fp_mask,
            _hasher: PhantomData,
        }
    }

    fn get_index(&self, hv: u32) -> usize {
        (hv as usize) & (self.table.size() - 1)
    }

    fn fingerprint(&self, hash_value: u32) -> u32 {
        let mut fp = hash_value & self.fp_mask;
        if fp == 0 {
            fp = 1;
        }
        fp
    }

    fn first_pass<T: ?Sized + Hash>(&self, item: &T) -> (u32, usize) {
        let mut hasher = H::default();
        item.hash(&mut hasher);
        let hash_value = hasher.finish();
        let index = self.get_index((hash_value >> 32) as u32);
        let fp = self.fingerprint(hash_value as u32);
        (fp, index)
    }

    /// The partner bucket for `(index, fp)`. An involution:
    /// `index_complement(index_complement(i, fp), fp) == i`.
    pub(crate) fn index_complement(&self, index: usize, fp: u32) -> usize {
        let hv = (index as u32) ^ fp.wrapping_mul(MURMUR_CONST);
        self.get_index(hv)
    }

    /// Attempts to insert `(fp, index)`, running the bounded kick-eviction
    /// loop on failure. On exhaustion, stashes the displaced pair in the
    /// victim cell.
    pub(crate) fn insert_fp(&mut self, fp: u32, index: usize) -> Result<(), CuckooError> {
        let mut rng = rand::thread_rng();
        self.insert_fp_with_rng(fp, index, &mut rng)
    }

    pub(crate) fn insert_fp_with_rng<R: Rng + ?Sized>(
        &mut self,
        fp: u32,
        index: usize,
        rng: &mut R,
    ) -> Result<(), CuckooError> {
        let mut curr_index = index;
        let mut curr_fp = fp;

        for kicks in 0..MAX_KICKS {
            if self.table.find_empty_and_insert(curr_index, curr_fp) {
                self.len += 1;
                return Ok(());
            }
            if kicks == 0 {
                curr_index = self.index_complement(curr_index, curr_fp);
            } else {
                curr_fp = self.table.evict_random(curr_index, curr_fp, rng);
                curr_index = self.index_complement(curr_index, curr_fp);
            }
        }

        self.victim = Victim::Occupied {
            fingerprint: curr_fp,
            index: curr_index,
        };
        // The victim cell counts as occupied by one element for length
        // purposes, matching the reference's unconditional element_count
        // increment on the victim path.
        self.len += 1;
        Err(CuckooError::NotEnoughSpace)
    }

    /// Inserts `item`. Refuses if the victim cell is already occupied by a
    /// previous overflow.
    pub fn insert<T: ?Sized + Hash>(&mut self, item: &T) -> Result<(), CuckooError> {
        if self.victim.is_occupied() {
            return Err(CuckooError::NotEnoughSpace);
        }
        let (fp, index) = self.first_pass(item);
        self.insert_fp(fp, index)
    }

    /// Returns true if `item` is possibly in the filter. May false-positive,
    /// never false-negatives for items actually present.
    pub fn contains<T: ?Sized + Hash>(&self, item: &T) -> bool {
        let (fp, i1) = self.first_pass(item);
        let i2 = self.index_complement(i1, fp);

        if let Victim::Occupied { fingerprint, index } = self.victim {
            if fingerprint == fp && (index == i1 || index == i2) {
                return true;
            }
        }
        self.table.contains_either(i1, i2, fp)
    }

    /// Deletes one occurrence of `item`. Returns true iff a matching
    /// fingerprint was cleared. Calling this on an item inserted `k <= B`
    /// times must be done `k` times to remove it entirely.
    pub fn delete<T: ?Sized + Hash>(&mut self, item: &T) -> bool {
        let (fp, i1) = self.first_pass(item);
        let i2 = self.index_complement(i1, fp);

        if self.table.delete(i1, fp) || self.table.delete(i2, fp) {
            self.len -= 1;
            self.drain_victim();
            true
        } else if let Victim::Occupied { fingerprint, index } = self.victim {
            if fingerprint == fp && (index == i1 || index == i2) {
                self.victim = Victim::Empty;
                self.len -= 1;
                true
            } else {
                false
            }
        } else {
            false
        }
    }

    fn drain_victim(&mut self) {
        if let Some((fingerprint, index)) = self.take_victim() {
            let _ = self.insert_fp(fingerprint, index);
        }
    }

    /// Clears the victim cell, if occupied, and returns the `(fp, index)`
    /// pair it held. Cancels that element's earlier contribution to `len`
    /// so the caller can re-account for it however it likes (re-insert here,
    /// or forward it elsewhere in a filter chain).
    pub(crate) fn take_victim(&mut self) -> Option<(u32, usize)> {
        if let Victim::Occupied { fingerprint, index } = self.victim {
            self.victim = Victim::Empty;
            self.len -= 1;
            Some((fingerprint, index))
        } else {
            None
        }
    }

    /// True if the victim cell is occupied, i.e. the filter is at capacity
    /// and further inserts will be refused.
    pub fn is_full(&self) -> bool {
        self.victim.is_occupied()
    }

    /// Number of elements currently stored (victim cell counts as present).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Overrides the tracked element count. Used by
    /// [`crate::DynamicCuckooFilter::compact`] after moving fingerprints
    /// directly through the bucket table, bypassing `insert`/`delete` and
    /// their usual bookkeeping.
    pub(crate) fn set_len(&mut self, len: usize) {
        self.len = len;
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets (`N`).
    pub fn size(&self) -> usize {
        self.table.size()
    }

    /// Maximum number of fingerprint slots (`N * entries_per_bucket`).
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Percentage of empty slots in the table.
    pub fn availability(&self) -> f64 {
        (self.table.free_count() as f64 / self.table.capacity() as f64) * 100.0
    }
}

/// Rounds `v` down to the largest power of two via the bit-smear +
/// increment idiom, matching the reference implementation bit for bit
/// (including its quirk of rounding an exact power of two down to half its
/// value). Guards the `v == 0 or 1` case, which the raw idiom would turn
/// into `0`.
pub(crate) fn highest_power_of_two(v: u32) -> usize {
    let mut v = v.wrapping_sub(1);
    v |= v >> 1;
    v |= v >> 2;
    v |= v >> 4;
    v |= v >> 8;
    v |= v >> 16;
    let n = v.wrapping_add(1) >> 1;
    cmp::max(1, n as usize)
}
