//! The hash provider this crate consumes: a 64-bit, deterministic,
//! well-distributed hash, injected as a type parameter so the hot path
//! monomorphizes instead of going through a vtable, and so tests can swap in
//! a seeded, reproducible oracle.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

use siphasher::sip::SipHasher13;

/// The narrow interface the filter core consumes for hashing. Any
/// `Hasher + Default` qualifies; the default type parameter on
/// [`crate::CuckooFilter`] and [`crate::DynamicCuckooFilter`] is
/// [`DefaultHasher`], matching the standard library's SipHash.
pub trait HashOracle: Hasher + Default {}

impl<H: Hasher + Default> HashOracle for H {}

/// A `SipHash-1-3` oracle seeded with fixed keys, so property tests and the
/// end-to-end scenarios in this crate's test suite get reproducible
/// fingerprints and bucket indices across runs.
#[derive(Clone)]
pub struct FixedSipHasher(SipHasher13);

impl FixedSipHasher {
    const K0: u64 = 0x_5EED_0000_5EED_0001;
    const K1: u64 = 0x_5EED_0000_5EED_0002;
}

impl Default for FixedSipHasher {
    fn default() -> Self {
        FixedSipHasher(SipHasher13::new_with_keys(Self::K0, Self::K1))
    }
}

impl Hasher for FixedSipHasher {
    fn finish(&self) -> u64 {
        self.0.finish()
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0.write(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::Hash;

    #[test]
    fn fixed_sip_hasher_is_deterministic() {
        let hash_of = |v: u64| {
            let mut h = FixedSipHasher::default();
            v.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash_of(42), hash_of(42));
        assert_ne!(hash_of(42), hash_of(43));
    }

    #[test]
    fn default_hasher_satisfies_hash_oracle() {
        fn assert_oracle<H: HashOracle>() {}
        assert_oracle::<DefaultHasher>();
        assert_oracle::<FixedSipHasher>();
    }
}
