// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The bit-vector sum type (spec.md §3): five on-disk representations
//! sharing one read interface, with bulk elementwise operations that
//! only ever mutate a plain destination in place.
//!
//! Polymorphism here follows spec.md §9's design note ("Polymorphism →
//! tagged variants") rather than the teacher's `enum_dispatch`-free
//! plain struct in `bloom/bit_array.rs`; `enum_dispatch` (already a
//! teacher dependency, used for its generic-purpose trait sum types
//! elsewhere in the fjall line) is the natural fit for a closed, exactly
//! five-variant type like this one.

pub mod constant;
pub mod plain;
pub mod rrr;

#[path = "roaring.rs"]
pub mod roaring_backend;

use crate::error::{Error, Result};
use constant::{AllOnesBitVector, AllZerosBitVector};
use plain::PlainBitVector;
use roaring_backend::RoaringBitVector;
use rrr::RrrBitVector;

/// Which on-disk compressor backs a bit vector (spec.md §6's
/// `bvcomp_*` family, mirrored onto the in-memory representation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compressor {
    Plain,
    Rrr,
    Roaring,
    AllZeros,
    AllOnes,
}

/// One bit vector, in one of the five on-disk representations.
#[derive(Debug, Clone)]
pub enum BitVector {
    Plain(PlainBitVector),
    Rrr(RrrBitVector),
    Roaring(RoaringBitVector),
    AllZeros(AllZerosBitVector),
    AllOnes(AllOnesBitVector),
}

impl BitVector {
    #[must_use]
    pub fn new_zeroed(num_bits: u64) -> Self {
        Self::AllZeros(AllZerosBitVector::new(num_bits))
    }

    #[must_use]
    pub fn new_plain_zeroed(num_bits: u64) -> Self {
        Self::Plain(PlainBitVector::new_zeroed(num_bits))
    }

    #[must_use]
    pub fn new_filled(num_bits: u64) -> Self {
        Self::Plain(PlainBitVector::new_filled(num_bits))
    }

    #[must_use]
    pub fn compressor(&self) -> Compressor {
        match self {
            Self::Plain(_) => Compressor::Plain,
            Self::Rrr(_) => Compressor::Rrr,
            Self::Roaring(_) => Compressor::Roaring,
            Self::AllZeros(_) => Compressor::AllZeros,
            Self::AllOnes(_) => Compressor::AllOnes,
        }
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::Plain(v) => v.len(),
            Self::Rrr(v) => v.len(),
            Self::Roaring(v) => v.len(),
            Self::AllZeros(v) => v.len(),
            Self::AllOnes(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn bit(&self, pos: u64) -> bool {
        match self {
            Self::Plain(v) => v.bit(pos),
            Self::Rrr(v) => v.bit(pos),
            Self::Roaring(v) => v.bit(pos),
            Self::AllZeros(v) => v.bit(pos),
            Self::AllOnes(v) => v.bit(pos),
        }
    }

    #[must_use]
    pub fn popcount(&self) -> u64 {
        match self {
            Self::Plain(v) => v.popcount(),
            Self::Rrr(v) => v.popcount(),
            Self::Roaring(v) => v.popcount(),
            Self::AllZeros(v) => v.popcount(),
            Self::AllOnes(v) => v.popcount(),
        }
    }

    #[must_use]
    pub fn is_all_zeros(&self) -> bool {
        matches!(self, Self::AllZeros(_)) || self.popcount() == 0
    }

    #[must_use]
    pub fn is_all_ones(&self) -> bool {
        matches!(self, Self::AllOnes(_)) || (self.len() > 0 && self.popcount() == self.len())
    }

    pub fn rank1(&self, pos: u64) -> Result<u64> {
        match self {
            Self::Plain(v) => v.rank1(pos),
            Self::Rrr(v) => v.rank1(pos),
            Self::Roaring(v) => v.rank1(pos),
            Self::AllZeros(v) => Ok(v.rank1(pos)),
            Self::AllOnes(v) => Ok(v.rank1(pos)),
        }
    }

    pub fn select0(&self, i: u64) -> Result<u64> {
        match self {
            Self::Plain(v) => v.select0(i),
            Self::Rrr(v) => v.select0(i),
            Self::Roaring(v) => v.select0(i),
            Self::AllZeros(v) => v
                .select0(i)
                .ok_or(Error::Invalid("select0 index out of range")),
            Self::AllOnes(v) => v
                .select0(i)
                .ok_or(Error::Invalid("select0 index out of range")),
        }
    }

    /// Whether in-place mutation is currently possible without first
    /// decompressing (spec.md §3: only the plain representation is
    /// freely writable; Roaring allows add-only while compressed).
    #[must_use]
    pub fn modifiable(&self) -> bool {
        matches!(self, Self::Plain(_) | Self::Roaring(_))
    }

    /// Materializes a read-only plain copy, decompressing if necessary.
    #[must_use]
    pub fn to_plain(&self) -> PlainBitVector {
        match self {
            Self::Plain(v) => v.clone(),
            Self::Rrr(v) => v.to_plain(),
            Self::Roaring(v) => v.to_plain(),
            Self::AllZeros(v) => v.to_plain(),
            Self::AllOnes(v) => v.to_plain(),
        }
    }

    /// Explicitly converts to the plain representation in place. This
    /// is the only way a compressed vector becomes freely writable
    /// again (spec.md §3's "Mutable in-memory: only after decompression
    /// to plain" note on the RRR row).
    pub fn decompress(&mut self) {
        if !matches!(self, Self::Plain(_)) {
            *self = Self::Plain(self.to_plain());
        }
    }

    fn as_plain_mut(&mut self) -> Result<&mut PlainBitVector> {
        match self {
            Self::Plain(v) => Ok(v),
            _ => Err(Error::Invalid(
                "bit vector must be decompressed to plain before this mutation",
            )),
        }
    }

    pub fn set_bit(&mut self, pos: u64, value: bool) -> Result<()> {
        match self {
            Self::Plain(v) => {
                v.set_bit(pos, value);
                Ok(())
            }
            Self::Roaring(v) if value => v.set_bit(pos),
            _ => Err(Error::Invalid(
                "only a plain vector supports arbitrary set_bit (Roaring supports add-only)",
            )),
        }
    }

    pub fn fill(&mut self, value: bool) -> Result<()> {
        self.as_plain_mut()?.fill(value);
        Ok(())
    }

    pub fn complement_in_place(&mut self) -> Result<()> {
        self.as_plain_mut()?.complement_in_place();
        Ok(())
    }

    pub fn and_in_place(&mut self, other: &Self) -> Result<()> {
        let other_plain = other.to_plain();
        self.as_plain_mut()?.and_in_place(&other_plain)
    }

    pub fn or_in_place(&mut self, other: &Self) -> Result<()> {
        let other_plain = other.to_plain();
        self.as_plain_mut()?.or_in_place(&other_plain)
    }

    pub fn xor_in_place(&mut self, other: &Self) -> Result<()> {
        let other_plain = other.to_plain();
        self.as_plain_mut()?.xor_in_place(&other_plain)
    }

    pub fn xnor_in_place(&mut self, other: &Self) -> Result<()> {
        let other_plain = other.to_plain();
        self.as_plain_mut()?.xnor_in_place(&other_plain)
    }

    pub fn andnot_in_place(&mut self, other: &Self) -> Result<()> {
        let other_plain = other.to_plain();
        self.as_plain_mut()?.andnot_in_place(&other_plain)
    }

    pub fn ornot_in_place(&mut self, other: &Self) -> Result<()> {
        let other_plain = other.to_plain();
        self.as_plain_mut()?.ornot_in_place(&other_plain)
    }

    pub fn and(a: &Self, b: &Self) -> Result<Self> {
        Ok(Self::Plain(PlainBitVector::and(&a.to_plain(), &b.to_plain())?))
    }

    pub fn or(a: &Self, b: &Self) -> Result<Self> {
        Ok(Self::Plain(PlainBitVector::or(&a.to_plain(), &b.to_plain())?))
    }

    pub fn xor(a: &Self, b: &Self) -> Result<Self> {
        Ok(Self::Plain(PlainBitVector::xor(&a.to_plain(), &b.to_plain())?))
    }

    pub fn andnot(a: &Self, b: &Self) -> Result<Self> {
        Ok(Self::Plain(PlainBitVector::andnot(&a.to_plain(), &b.to_plain())?))
    }

    pub fn ornot(a: &Self, b: &Self) -> Result<Self> {
        Ok(Self::Plain(PlainBitVector::ornot(&a.to_plain(), &b.to_plain())?))
    }

    /// Squeeze: keep only the bits of `self` at positions where `spec`
    /// is 1, packed contiguously (spec.md §3; used by the
    /// DeterminedBrief filter kind).
    pub fn squeeze_by(&self, spec: &Self) -> Result<Self> {
        Ok(Self::Plain(self.to_plain().squeeze_by(&spec.to_plain())?))
    }

    /// Inverse of [`Self::squeeze_by`].
    pub fn unsqueeze_by(&self, spec: &Self) -> Result<Self> {
        Ok(Self::Plain(self.to_plain().unsqueeze_by(&spec.to_plain())?))
    }

    /// Compresses this vector to the requested representation,
    /// recognizing the all-zero/all-one degenerate cases regardless of
    /// the requested target (spec.md §6's "simplify on save" rule).
    pub fn compress_to(&self, target: Compressor) -> Result<Self> {
        if self.is_all_zeros() {
            return Ok(Self::AllZeros(AllZerosBitVector::new(self.len())));
        }
        if self.is_all_ones() {
            return Ok(Self::AllOnes(AllOnesBitVector::new(self.len())));
        }
        match target {
            Compressor::Plain => Ok(Self::Plain(self.to_plain())),
            Compressor::Rrr => Ok(Self::Rrr(RrrBitVector::from_plain(
                &self.to_plain(),
                255,
                32,
            )?)),
            Compressor::Roaring => Ok(Self::Roaring(RoaringBitVector::from_plain(&self.to_plain())?)),
            Compressor::AllZeros => Ok(Self::AllZeros(AllZerosBitVector::new(self.len()))),
            Compressor::AllOnes => Ok(Self::AllOnes(AllOnesBitVector::new(self.len()))),
        }
    }

    /// Compresses to RRR with explicit block size / rank period.
    pub fn compress_to_rrr(&self, block_size: u16, rank_period: u8) -> Result<Self> {
        if self.is_all_zeros() {
            return Ok(Self::AllZeros(AllZerosBitVector::new(self.len())));
        }
        if self.is_all_ones() {
            return Ok(Self::AllOnes(AllOnesBitVector::new(self.len())));
        }
        Ok(Self::Rrr(RrrBitVector::from_plain(
            &self.to_plain(),
            block_size,
            rank_period,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn plain_from_str(s: &str) -> BitVector {
        let mut v = PlainBitVector::new_zeroed(s.len() as u64);
        for (i, c) in s.chars().enumerate() {
            if c == '1' {
                v.set_bit(i as u64, true);
            }
        }
        BitVector::Plain(v)
    }

    #[test]
    fn all_zeros_is_not_modifiable_without_decompress() {
        let mut v = BitVector::new_zeroed(8);
        assert!(!v.modifiable());
        assert!(v.set_bit(0, true).is_err());
        v.decompress();
        assert!(v.modifiable());
        v.set_bit(0, true).unwrap();
        assert!(v.bit(0));
    }

    #[test]
    fn compress_to_detects_degenerate_vectors() {
        let zeros = plain_from_str("0000");
        let compressed = zeros.compress_to(Compressor::Rrr).unwrap();
        assert!(matches!(compressed, BitVector::AllZeros(_)));

        let ones = plain_from_str("1111");
        let compressed = ones.compress_to(Compressor::Rrr).unwrap();
        assert!(matches!(compressed, BitVector::AllOnes(_)));
    }

    #[test]
    fn rrr_roundtrips_via_enum() {
        let v = plain_from_str("1101001101110000111100001010");
        let rrr = v.compress_to_rrr(6, 2).unwrap();
        assert_eq!(rrr.compressor(), Compressor::Rrr);
        for pos in 0..v.len() {
            assert_eq!(rrr.bit(pos), v.bit(pos));
        }
    }

    #[test]
    fn and_in_place_requires_plain_destination() {
        let mut roaring = plain_from_str("1010").compress_to(Compressor::Roaring).unwrap();
        let other = plain_from_str("1100");
        assert!(roaring.and_in_place(&other).is_err());
        roaring.decompress();
        roaring.and_in_place(&other).unwrap();
        assert_eq!(roaring.popcount(), 1);
    }

    #[test]
    fn roaring_allows_add_only_while_compressed() {
        let mut v = BitVector::Plain(PlainBitVector::new_zeroed(10))
            .compress_to(Compressor::Roaring)
            .unwrap();
        v.set_bit(4, true).unwrap();
        assert!(v.bit(4));
        assert!(v.set_bit(4, false).is_err());
    }
}
