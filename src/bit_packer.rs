//! Packing and unpacking fingerprints inside a byte-addressed bucket.
//!
//! Five `(entries_per_bucket, width)` profiles are supported; each is a
//! plain enum variant rather than a trait object, since the profile is
//! fixed for the lifetime of a filter and the hot path must not indirect
//! through a vtable.

use crate::CuckooError;
#[cfg(feature = "serde_support")]
use serde_derive::{Deserialize, Serialize};

/// One of the five supported bucket layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub enum BucketLayout {
    /// 4 entries per bucket, 4 bits per fingerprint (2 bytes/bucket).
    W4B4,
    /// 4 entries per bucket, 8 bits per fingerprint (4 bytes/bucket).
    W8B4,
    /// 4 entries per bucket, 12 bits per fingerprint (6 bytes/bucket).
    W12B4,
    /// 4 entries per bucket, 16 bits per fingerprint (8 bytes/bucket).
    W16B4,
    /// 2 entries per bucket, 32 bits per fingerprint (8 bytes/bucket).
    W32B2,
}

impl BucketLayout {
    /// Resolves a layout from its `(entries_per_bucket, width)` pair, rejecting
    /// anything outside the five mandatory profiles.
    pub fn from_params(entries_per_bucket: usize, width: u32) -> Result<Self, CuckooError> {
        match (entries_per_bucket, width) {
            (4, 4) => Ok(BucketLayout::W4B4),
            (4, 8) => Ok(BucketLayout::W8B4),
            (4, 12) => Ok(BucketLayout::W12B4),
            (4, 16) => Ok(BucketLayout::W16B4),
            (2, 32) => Ok(BucketLayout::W32B2),
            _ => Err(CuckooError::UnsupportedProfile {
                width,
                entries_per_bucket,
            }),
        }
    }

    pub fn entries_per_bucket(self) -> usize {
        match self {
            BucketLayout::W32B2 => 2,
            _ => 4,
        }
    }

    pub fn width(self) -> u32 {
        match self {
            BucketLayout::W4B4 => 4,
            BucketLayout::W8B4 => 8,
            BucketLayout::W12B4 => 12,
            BucketLayout::W16B4 => 16,
            BucketLayout::W32B2 => 32,
        }
    }

    pub fn fp_mask(self) -> u32 {
        ((1u64 << self.width()) - 1) as u32
    }

    /// Number of bytes occupied by one bucket under this layout.
    pub fn bucket_bytes(self) -> usize {
        (self.entries_per_bucket() * self.width() as usize + 7) / 8
    }

    /// Reads the `width`-bit value at `slot` from `bucket`.
    pub fn read(self, bucket: &[u8], slot: usize) -> u32 {
        let width = self.width() as usize;
        let bit_offset = slot * width;
        let byte_offset = bit_offset / 8;
        let bit_shift = bit_offset % 8;
        let span = load_span(bucket, byte_offset, bit_shift, width);
        ((span >> bit_shift) & self.fp_mask() as u64) as u32
    }

    /// Writes `fp` (already masked to `width` bits by the caller's contract,
    /// but masked again here defensively) at `slot` in `bucket` without
    /// disturbing any other slot's bits.
    pub fn write(self, bucket: &mut [u8], slot: usize, fp: u32) {
        let width = self.width() as usize;
        let bit_offset = slot * width;
        let byte_offset = bit_offset / 8;
        let bit_shift = bit_offset % 8;
        let span_len = span_len(bit_shift, width);

        let existing = load_span(bucket, byte_offset, bit_shift, width);
        let mask = (self.fp_mask() as u64) << bit_shift;
        let cleared = existing & !mask;
        let value = cleared | (((fp as u64) & self.fp_mask() as u64) << bit_shift);

        let bytes = value.to_le_bytes();
        bucket[byte_offset..byte_offset + span_len].copy_from_slice(&bytes[..span_len]);
    }

    /// SWAR "zero-byte-detect" check: does any `width`-bit lane of this
    /// bucket's bytes equal `fp`? `bucket` must be at least `bucket_bytes()`
    /// long.
    pub fn has_value(self, bucket: &[u8], fp: u32) -> bool {
        let mut word = [0u8; 8];
        let n = self.bucket_bytes().min(8);
        word[..n].copy_from_slice(&bucket[..n]);
        let value = u64::from_le_bytes(word);

        let b = self.entries_per_bucket() as u32;
        let w = self.width();
        let m: u64 = (0..b).map(|k| 1u64 << (k * w)).fold(0, |acc, bit| acc | bit);
        let h: u64 = m << (w - 1);

        let neg = value ^ (m.wrapping_mul(fp as u64));
        (neg.wrapping_sub(m)) & !neg & h != 0
    }
}

fn span_len(bit_shift: usize, width: usize) -> usize {
    (bit_shift + width + 7) / 8
}

fn load_span(bucket: &[u8], byte_offset: usize, bit_shift: usize, width: usize) -> u64 {
    let span_len = span_len(bit_shift, width);
    let mut bytes = [0u8; 8];
    bytes[..span_len].copy_from_slice(&bucket[byte_offset..byte_offset + span_len]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_profile() {
        assert!(BucketLayout::from_params(4, 7).is_err());
        assert!(BucketLayout::from_params(3, 8).is_err());
    }

    #[test]
    fn bucket_bytes_match_spec_table() {
        assert_eq!(BucketLayout::W4B4.bucket_bytes(), 2);
        assert_eq!(BucketLayout::W8B4.bucket_bytes(), 4);
        assert_eq!(BucketLayout::W12B4.bucket_bytes(), 6);
        assert_eq!(BucketLayout::W16B4.bucket_bytes(), 8);
        assert_eq!(BucketLayout::W32B2.bucket_bytes(), 8);
    }

    #[test]
    fn read_write_round_trip_every_profile() {
        for layout in [
            BucketLayout::W4B4,
            BucketLayout::W8B4,
            BucketLayout::W12B4,
            BucketLayout::W16B4,
            BucketLayout::W32B2,
        ] {
            let mut bucket = vec![0u8; layout.bucket_bytes()];
            for slot in 0..layout.entries_per_bucket() {
                let fp = (slot as u32 + 1) & layout.fp_mask();
                let fp = if fp == 0 { 1 } else { fp };
                layout.write(&mut bucket, slot, fp);
                assert_eq!(layout.read(&bucket, slot), fp);
            }
        }
    }

    #[test]
    fn slot_isolation_w4_and_w12() {
        for layout in [BucketLayout::W4B4, BucketLayout::W12B4] {
            let mut bucket = vec![0u8; layout.bucket_bytes()];
            let mask = layout.fp_mask();
            for slot in 0..layout.entries_per_bucket() {
                layout.write(&mut bucket, slot, mask);
            }
            for slot in 0..layout.entries_per_bucket() {
                layout.write(&mut bucket, slot, 0);
                for other in 0..layout.entries_per_bucket() {
                    if other != slot {
                        assert_eq!(layout.read(&bucket, other), mask, "layout={layout:?}");
                    }
                }
                layout.write(&mut bucket, slot, mask);
            }
        }
    }

    #[test]
    fn has_value_matches_linear_scan() {
        for layout in [
            BucketLayout::W4B4,
            BucketLayout::W8B4,
            BucketLayout::W12B4,
            BucketLayout::W16B4,
            BucketLayout::W32B2,
        ] {
            let mut bucket = vec![0u8; layout.bucket_bytes()];
            let values: Vec<u32> = (0..layout.entries_per_bucket())
                .map(|i| (i as u32 * 3 + 1) & layout.fp_mask())
                .map(|v| if v == 0 { 1 } else { v })
                .collect();
            for (slot, fp) in values.iter().enumerate() {
                layout.write(&mut bucket, slot, *fp);
            }
            let sample_count = layout.fp_mask().min(4095);
            let mut candidates: Vec<u32> = (0..=sample_count).collect();
            candidates.extend(values.iter().copied());
            for candidate in candidates {
                let expected = values.contains(&candidate);
                assert_eq!(
                    layout.has_value(&bucket, candidate),
                    expected,
                    "layout={layout:?} candidate={candidate}"
                );
            }
        }
    }
}
