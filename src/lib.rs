//! Cuckoo filter: a space-efficient probabilistic data structure for
//! approximate set membership, like a Bloom filter but supporting deletion
//! and bounded by a fixed false-positive rate rather than an ever-growing
//! hash count.
//!
//! # Usage
//!
//! This crate is [on crates.io](https://crates.io/crates/cuckoofilter) and can be
//! used by adding `cuckoofilter` to the dependencies in your project's `Cargo.toml`.
//!
//! ```toml
//! [dependencies]
//! cuckoofilter = "0.1"
//! ```
//!
//! And this in your crate root:
//!
//! ```rust
//! extern crate cuckoofilter;
//! ```
//!
//! # Example
//!
//! ```rust
//! use cuckoofilter::CuckooFilter;
//!
//! let words = vec!["foo", "bar", "xylophone", "milagro"];
//! let mut cf = CuckooFilter::new(1 << 10);
//!
//! let mut insertions = 0;
//! for s in &words {
//!     if !cf.contains(s) {
//!         cf.insert(s).unwrap();
//!         insertions += 1;
//!     }
//! }
//!
//! assert_eq!(insertions, words.len());
//! assert_eq!(cf.len(), words.len());
//!
//! for s in &words {
//!     cf.delete(s);
//! }
//!
//! assert!(cf.is_empty());
//! ```
//!
//! For an unbounded-growth variant that chains several filters together and
//! can reclaim space from deletions, see [`DynamicCuckooFilter`].

mod bit_packer;
mod bucket;
mod dynamic;
mod filter;
mod hash;

pub use crate::bit_packer::BucketLayout;
pub use crate::dynamic::DynamicCuckooFilter;
pub use crate::filter::CuckooFilter;
pub use crate::hash::{FixedSipHasher, HashOracle};

use std::error::Error as StdError;
use std::fmt;

/// Errors this crate's operations can return.
#[derive(Debug)]
pub enum CuckooError {
    /// Returned by `insert` when the bounded kick-eviction loop is
    /// exhausted; the item given was in fact added, but some other element
    /// was displaced into the filter's single victim cell and will be
    /// evicted from the filter entirely if the victim cell is not drained
    /// by a subsequent `delete` before the next overflow.
    NotEnoughSpace,
    /// Returned by [`CuckooFilter::with_params`] and
    /// [`DynamicCuckooFilter::with_params`] when the requested
    /// `(entries_per_bucket, width)` pair is not one of the five supported
    /// bucket layouts.
    UnsupportedProfile {
        width: u32,
        entries_per_bucket: usize,
    },
}

impl fmt::Display for CuckooError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CuckooError::NotEnoughSpace => f.write_str("NotEnoughSpace"),
            CuckooError::UnsupportedProfile {
                width,
                entries_per_bucket,
            } => write!(
                f,
                "unsupported bucket profile: width={width}, entries_per_bucket={entries_per_bucket}"
            ),
        }
    }
}

impl StdError for CuckooError {
    fn description(&self) -> &str {
        match self {
            CuckooError::NotEnoughSpace => {
                "Not enough space to store this item, rebucketing failed."
            }
            CuckooError::UnsupportedProfile { .. } => {
                "requested bucket layout is not one of the five supported profiles"
            }
        }
    }
}
