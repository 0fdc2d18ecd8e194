// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Roaring-compressed bit-vector (spec.md §3, compressor `Roaring`).
//!
//! Grounded on the `roaring` crate (present in several pack manifests,
//! e.g. `meilisearch-arroy`'s and `surrealdb-surrealdb`'s Cargo.toml).
//! Unlike RRR, a Roaring vector supports in-place `add` while still
//! compressed, but per spec.md §3's operation table it never supports
//! rank1/select0 — callers needing those must decompress to plain
//! first, so those two methods here unconditionally fail.

use super::plain::PlainBitVector;
use crate::error::{Error, Result};
use ::roaring::RoaringBitmap;

#[derive(Debug, Clone)]
pub struct RoaringBitVector {
    bitmap: RoaringBitmap,
    num_bits: u64,
}

impl RoaringBitVector {
    #[must_use]
    pub fn len(&self) -> u64 {
        self.num_bits
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    pub fn from_plain(plain: &PlainBitVector) -> Result<Self> {
        if plain.len() > u64::from(u32::MAX) {
            return Err(Error::Unsupported("Roaring backend is limited to 2^32 positions"));
        }
        let mut bitmap = RoaringBitmap::new();
        for pos in 0..plain.len() {
            if plain.bit(pos) {
                bitmap.insert(pos as u32);
            }
        }
        Ok(Self {
            bitmap,
            num_bits: plain.len(),
        })
    }

    #[must_use]
    pub fn bit(&self, pos: u64) -> bool {
        debug_assert!(pos < self.num_bits);
        u32::try_from(pos).is_ok_and(|p| self.bitmap.contains(p))
    }

    /// Sets bit `pos`. This is the one mutation Roaring vectors support
    /// while still compressed (spec.md §3: "Mutable in-memory: add-only
    /// while compressed").
    pub fn set_bit(&mut self, pos: u64) -> Result<()> {
        let p = u32::try_from(pos).map_err(|_| Error::Unsupported("Roaring backend is limited to 2^32 positions"))?;
        self.bitmap.insert(p);
        Ok(())
    }

    #[must_use]
    pub fn popcount(&self) -> u64 {
        self.bitmap.len()
    }

    pub fn rank1(&self, _pos: u64) -> Result<u64> {
        Err(Error::Unsupported("rank1 is not supported on a Roaring-compressed bit vector"))
    }

    pub fn select0(&self, _i: u64) -> Result<u64> {
        Err(Error::Unsupported("select0 is not supported on a Roaring-compressed bit vector"))
    }

    #[must_use]
    pub fn to_plain(&self) -> PlainBitVector {
        let mut out = PlainBitVector::new_zeroed(self.num_bits);
        for pos in &self.bitmap {
            out.set_bit(u64::from(pos), true);
        }
        out
    }
}
