//! A chain of [`CuckooFilter`]s that grows when the active filter fills and
//! shrinks when `compact()` is called, giving the set unbounded (if slower)
//! growth instead of a single fixed-capacity table.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::marker::PhantomData;

#[cfg(feature = "serde_support")]
use serde_derive::{Deserialize, Serialize};

use crate::bit_packer::BucketLayout;
use crate::bucket::BucketTable;
use crate::filter::CuckooFilter;
use crate::hash::HashOracle;
use crate::CuckooError;

/// A node in the filter chain. The chain is an arena (`Vec<CfNode>` indexed
/// by `usize`) rather than an intrusive linked list of boxes, so growing and
/// compacting the chain never needs `unsafe` aliasing of sibling nodes.
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde_support", serde(bound = ""))]
struct CfNode<H: HashOracle> {
    filter: CuckooFilter<H>,
    prev: Option<usize>,
    next: Option<usize>,
    dead: bool,
}

/// A growable cuckoo filter: internally a singly-growing chain of
/// fixed-capacity [`CuckooFilter`]s. New elements go to the `active` filter;
/// when it fills, a fresh filter is appended to the chain and becomes
/// active. `contains` and `delete` walk the whole chain from `head`, since
/// an element may have been inserted into any filter that was active at the
/// time.
///
/// # Examples
///
/// ```
/// use cuckoofilter::DynamicCuckooFilter;
///
/// let mut dcf = DynamicCuckooFilter::new(64);
/// for i in 0..1000u64 {
///     dcf.insert(&i).unwrap();
/// }
/// assert!(dcf.contains(&500u64));
/// assert!(dcf.chain_len() > 1);
/// ```
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde_support", serde(bound = ""))]
pub struct DynamicCuckooFilter<H: HashOracle = DefaultHasher> {
    nodes: Vec<CfNode<H>>,
    head: Option<usize>,
    tail: Option<usize>,
    active: Option<usize>,
    table_size: usize,
    layout: BucketLayout,
    _hasher: PhantomData<H>,
}

impl DynamicCuckooFilter<DefaultHasher> {
    /// Constructs a chain whose member filters each use the default profile
    /// (8-bit fingerprints, 4 entries per bucket) and `table_size` buckets.
    pub fn new(table_size: u32) -> Self {
        Self::with_params(table_size, 8, 4).expect("default profile (8, 4) is always valid")
    }
}

impl<H: HashOracle> DynamicCuckooFilter<H> {
    /// Constructs a chain whose member filters all share one
    /// `(width, entries_per_bucket)` profile.
    pub fn with_params(
        table_size: u32,
        width: u32,
        entries_per_bucket: usize,
    ) -> Result<Self, CuckooError> {
        let layout = BucketLayout::from_params(entries_per_bucket, width)?;
        let mut dcf = DynamicCuckooFilter {
            nodes: Vec::new(),
            head: None,
            tail: None,
            active: None,
            table_size: crate::filter::highest_power_of_two(table_size),
            layout,
            _hasher: PhantomData,
        };
        dcf.push_node();
        Ok(dcf)
    }

    fn fresh_filter(&self) -> CuckooFilter<H> {
        CuckooFilter::from_table(
            BucketTable::new(self.table_size, self.layout),
            self.layout.fp_mask(),
        )
    }

    /// A filter's usable capacity before the chain grows: 90% of its raw
    /// slot count, matching the reference's `0.9 * N * B` load-factor cap
    /// (cuckoo filters degrade sharply in insert latency past this point).
    fn capacity_threshold(&self) -> usize {
        (self.table_size * self.layout.entries_per_bucket() * 9) / 10
    }

    /// Appends a fresh filter to the chain as the new tail, without
    /// disturbing `active`. Used both by `push_node` and by the victim
    /// chain-extension path in `store_victim`, which — like the reference's
    /// `storeVictim`/`nextCF` recursion — never touches the active filter.
    fn append_node(&mut self) -> usize {
        let node = CfNode {
            filter: self.fresh_filter(),
            prev: self.tail,
            next: None,
            dead: false,
        };
        let idx = self.nodes.len();
        self.nodes.push(node);

        if let Some(tail) = self.tail {
            self.nodes[tail].next = Some(idx);
        } else {
            self.head = Some(idx);
        }
        self.tail = Some(idx);
        idx
    }

    /// Appends a fresh filter to the chain and makes it the new active node.
    fn push_node(&mut self) -> usize {
        let idx = self.append_node();
        self.active = Some(idx);
        idx
    }

    /// A node counts as full for chain-routing purposes if its own kick
    /// loop is exhausted (occupied victim cell) or it has crossed the
    /// load-factor threshold that should trigger a handoff to the next
    /// filter, whichever comes first. Both `next_cf`'s forward skip and
    /// `store_victim`'s candidate walk use this, never the single node's
    /// `is_full()` alone, so a node is never selected as an insert target
    /// while its victim cell is already holding something — which would
    /// make the node refuse outright and leave a stale victim behind.
    fn is_full(&self, idx: usize) -> bool {
        let filter = &self.nodes[idx].filter;
        filter.is_full() || filter.len() >= self.capacity_threshold()
    }

    /// Returns the filter following `cf` in the chain, skipping forward past
    /// any already-full successors; creates a new filter only once the tail
    /// is reached or every successor is full. Mirrors the reference's
    /// `nextCF`, which reuses `cf->next` instead of always allocating.
    fn next_cf(&mut self, cf: usize) -> usize {
        match self.nodes[cf].next {
            Some(next) if self.is_full(next) => self.next_cf(next),
            Some(next) => next,
            None => self.append_node(),
        }
    }

    /// Walks the chain from `head`, trying each filter that isn't already
    /// full; extends the chain if none accepts. Mirrors the reference's
    /// `storeVictim`, which always starts from `head_cf_`, not `active_cf_`.
    fn store_victim(&mut self, fp: u32, index: usize) {
        let mut cursor = self.head.expect("chain always has at least one node");
        loop {
            if !self.is_full(cursor) && self.nodes[cursor].filter.insert_fp(fp, index).is_ok() {
                return;
            }
            cursor = self.next_cf(cursor);
        }
    }

    /// Inserts `item`, growing the chain if the active filter is full. If
    /// the active filter's kick loop overflows, the displaced `(fp, index)`
    /// pair is forwarded through the rest of the chain rather than returned
    /// as an error, so a dynamic filter never reports "full" the way a
    /// single [`CuckooFilter`] can.
    pub fn insert<T: ?Sized + Hash>(&mut self, item: &T) -> Result<(), CuckooError> {
        let active = self.active.expect("chain always has at least one node");
        if self.is_full(active) {
            self.active = Some(self.next_cf(active));
        }
        let active = self.active.unwrap();

        if self.nodes[active].filter.insert(item).is_err() {
            if let Some((fp, index)) = self.nodes[active].filter.take_victim() {
                self.store_victim(fp, index);
            }
        }
        Ok(())
    }

    /// True if `item` is possibly present in any filter in the chain.
    pub fn contains<T: ?Sized + Hash>(&self, item: &T) -> bool {
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            if self.nodes[idx].filter.contains(item) {
                return true;
            }
            cursor = self.nodes[idx].next;
        }
        false
    }

    /// Deletes one occurrence of `item` from whichever filter in the chain
    /// holds it, walking from `head`.
    pub fn delete<T: ?Sized + Hash>(&mut self, item: &T) -> bool {
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            if self.nodes[idx].filter.delete(item) {
                return true;
            }
            cursor = self.nodes[idx].next;
        }
        false
    }

    /// Total number of elements across the whole chain.
    pub fn len(&self) -> usize {
        self.nodes.iter().map(|n| n.filter.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of filters currently in the chain.
    pub fn chain_len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_live()).count()
    }

    /// Merges sparse filters to shrink the chain. Filters are sorted
    /// ascending by element count, then repeatedly the sparsest is drained
    /// into the next-sparsest via a conditional (`insert-if-empty`, never
    /// overwrite) element move; a filter left empty is unlinked from the
    /// chain. Mirrors the reference's `compact()` pairwise `moveElements`
    /// pass.
    pub fn compact(&mut self) {
        let mut live: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, n)| n.is_live() && !self.is_full(*i))
            .map(|(i, _)| i)
            .collect();
        if live.is_empty() {
            return;
        }
        live.sort_by_key(|&idx| self.nodes[idx].filter.len());

        for i in 0..live.len() - 1 {
            let src = live[i];
            for &dst in live[i + 1..].iter().rev() {
                self.move_elements(src, dst);
                if self.nodes[src].filter.len() == 0 {
                    break;
                }
            }
            if self.nodes[src].filter.len() == 0 {
                self.unlink(src);
            }
        }
    }

    /// Drains occupied slots out of `src`'s bucket table into the identical
    /// `(i, j)` coordinates of `dst`, never recomputing the partner index as
    /// a fallback (the reference's `moveElements` tries only `cf->table`'s
    /// slot `(i, j)` via `insertFingerprintIfEmpty`). A fingerprint whose
    /// destination slot is already occupied is left behind in `src`. Stops
    /// as soon as `dst` is full or `src` is empty, matching the reference's
    /// hard `return` on either condition.
    fn move_elements(&mut self, src: usize, dst: usize) {
        let entries = self.nodes[src].filter.table.entries_per_bucket();
        let n = self.nodes[src].filter.table.size();

        for i in 0..n {
            for j in 0..entries {
                if self.is_full(dst) || self.nodes[src].filter.len() == 0 {
                    self.resync_len(src);
                    self.resync_len(dst);
                    return;
                }
                let fp = self.nodes[src].filter.table.get_fp(i, j);
                if fp == 0 {
                    continue;
                }
                if self.nodes[dst].filter.table.find_empty_and_insert(i, fp) {
                    self.nodes[src].filter.table.delete(i, fp);
                    self.resync_len(src);
                    self.resync_len(dst);
                }
            }
        }
        self.resync_len(src);
        self.resync_len(dst);
    }

    fn resync_len(&mut self, idx: usize) {
        let occupied = self.nodes[idx].filter.table.occupied_count();
        self.nodes[idx].filter.set_len(occupied);
    }

    /// Removes `idx` from the doubly-linked chain and marks the node dead.
    /// The arena slot itself is never freed, only unlinked, so indices
    /// already held by `head`/`tail`/`active` elsewhere stay valid.
    fn unlink(&mut self, idx: usize) {
        let prev = self.nodes[idx].prev;
        let next = self.nodes[idx].next;

        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
        self.nodes[idx].dead = true;

        if self.active == Some(idx) {
            self.active = self.tail;
        }
        if self.head.is_none() {
            // chain must never be fully empty; keep at least one live node.
            let fresh = self.push_node();
            self.head = Some(fresh);
        }
    }
}

impl<H: HashOracle> CfNode<H> {
    fn is_live(&self) -> bool {
        !self.dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::FixedSipHasher;

    type TestDcf = DynamicCuckooFilter<FixedSipHasher>;

    #[test]
    fn single_filter_holds_small_set() {
        let mut dcf: TestDcf = DynamicCuckooFilter::with_params(64, 8, 4).unwrap();
        for i in 0u64..40 {
            dcf.insert(&i).unwrap();
        }
        for i in 0u64..40 {
            assert!(dcf.contains(&i));
        }
        assert_eq!(dcf.chain_len(), 1);
    }

    #[test]
    fn chain_grows_past_single_filter_capacity() {
        let mut dcf: TestDcf = DynamicCuckooFilter::with_params(16, 8, 4).unwrap();
        for i in 0u64..500 {
            dcf.insert(&i).unwrap();
        }
        assert!(dcf.chain_len() > 1);
        for i in 0u64..500 {
            assert!(dcf.contains(&i));
        }
    }

    #[test]
    fn delete_removes_from_whichever_filter_holds_it() {
        let mut dcf: TestDcf = DynamicCuckooFilter::with_params(16, 8, 4).unwrap();
        for i in 0u64..300 {
            dcf.insert(&i).unwrap();
        }
        assert!(dcf.delete(&0u64));
        assert!(dcf.delete(&299u64));
        assert!(!dcf.contains(&0u64));
        assert!(!dcf.contains(&299u64));
    }

    #[test]
    fn compact_preserves_membership_and_shrinks_chain() {
        let mut dcf: TestDcf = DynamicCuckooFilter::with_params(16, 8, 4).unwrap();
        for i in 0u64..300 {
            dcf.insert(&i).unwrap();
        }
        for i in 0u64..250 {
            dcf.delete(&i);
        }
        let chain_before = dcf.chain_len();
        dcf.compact();
        assert!(dcf.chain_len() <= chain_before);
        for i in 250u64..300 {
            assert!(dcf.contains(&i));
        }
    }
}
