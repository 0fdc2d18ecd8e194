// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The Bloom-filter family: four bundles of bit vectors sharing one
//! hash scheme (spec.md §3, §4.2). Adapted from the teacher's single
//! flat `BloomFilter` (double hashing over one bit array) into a sum
//! type over the four kinds, reusing `crate::hash` for the actual
//! hashing instead of the teacher's inline `xxh3_128`/double-hashing.

use crate::bitvector::{BitVector, Compressor};
use crate::error::{Error, Result};
use crate::hash::hash_smer;
use enum_dispatch::enum_dispatch;

/// Which kind of Bloom filter a node carries (spec.md §3's table, and
/// the `bfKind` header field of spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Simple,
    AllSome,
    Determined,
    DeterminedBrief,
    /// Debug-only variant computing the AND over children (spec.md
    /// §4.3's "Intersection tree").
    Intersection,
}

impl FilterKind {
    /// Number of bit vectors a filter of this kind is made of.
    #[must_use]
    pub fn vectors_per_filter(self) -> usize {
        match self {
            Self::Simple | Self::Intersection => 1,
            Self::AllSome | Self::Determined | Self::DeterminedBrief => 2,
        }
    }
}

/// Outcome of looking up one hash position in a filter (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Absent,
    Present,
    Unresolved,
}

/// Which bit vector within a (at most two-vector) filter an operation
/// addresses; mirrors the source's `whichBv` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Zero,
    One,
}

/// Whether a DeterminedBrief filter's `B_how` has been squeezed
/// relative to its node's `B_det` (spec.md §4.3, stored in the
/// container's `filterInfo` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqueezeState {
    Squeezed,
    NotSqueezed,
}

/// Hash parameters shared by every filter in one tree (spec.md §3).
/// Two filters disagreeing on any of these fields is a
/// [`Error::Consistency`] at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    pub smer_size: u32,
    pub num_hashes: u32,
    pub seed1: u64,
    pub seed2: u64,
    pub hash_modulus: u64,
    pub num_bits: u64,
    pub set_size_known: bool,
    pub set_size: u64,
}

impl HashParams {
    /// Checks two filters' parameters agree on everything that must be
    /// shared across a tree (spec.md §7's `ConsistencyError`).
    pub fn check_consistent_with(&self, other: &Self) -> Result<()> {
        let mismatch = self.smer_size != other.smer_size
            || self.num_hashes != other.num_hashes
            || self.seed1 != other.seed1
            || self.seed2 != other.seed2
            || self.hash_modulus != other.hash_modulus
            || self.num_bits != other.num_bits;
        if mismatch {
            return Err(Error::Consistency(format!(
                "filter parameters disagree: {self:?} vs {other:?}"
            )));
        }
        Ok(())
    }

    /// Estimated false-positive rate for a Bloom filter given its known
    /// set size (spec.md §4.5's "standard Bloom false-positive
    /// formula"), grounded on the `BloomFilter::false_positive_rate`
    /// static helper in the original source.
    #[must_use]
    pub fn false_positive_rate(&self) -> f64 {
        if !self.set_size_known || self.num_bits == 0 {
            return 0.0;
        }
        let k = f64::from(self.num_hashes.max(1));
        let n = self.set_size as f64;
        let m = self.num_bits as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    /// Hash position for a query s-mer (spec.md §4.5's "extract the set
    /// of hash positions"), always using hash function 0 since
    /// multi-hash filters are only supported on the `add` write path
    /// (spec.md §9(c)).
    #[must_use]
    pub fn hash_position(&self, smer: &[u8]) -> Option<u64> {
        self.position_of(smer, 0)
    }

    fn position_of(&self, smer: &[u8], which: u32) -> Option<u64> {
        let h = hash_smer(self.seed1, self.seed2, smer, which);
        let p = h % self.hash_modulus.max(1);
        if p < self.num_bits {
            Some(p)
        } else {
            None
        }
    }
}

#[enum_dispatch]
pub trait BloomFilterOps {
    fn params(&self) -> &HashParams;
    fn params_mut(&mut self) -> &mut HashParams;
    fn kind(&self) -> FilterKind;

    /// Reads the bit vector at `slot`, or `None` if this kind only has
    /// one vector and `slot` is `One`.
    fn vector(&self, slot: Slot) -> Option<&BitVector>;
    fn vector_mut(&mut self, slot: Slot) -> Option<&mut BitVector>;

    fn lookup(&self, position: u64) -> Result<Lookup>;

    /// Hashes `smer` with hash function 0 and tests slot 0. This is
    /// the base membership test before a filter has been folded into a
    /// tree (the Simple-kind semantics, generalized to every kind
    /// since construction always starts from a Simple leaf filter).
    fn contains(&self, smer: &[u8]) -> bool {
        match self.params().position_of(smer, 0) {
            Some(p) => self.vector(Slot::Zero).is_some_and(|v| v.bit(p)),
            None => false,
        }
    }
}

fn add_smer(params: &HashParams, vector0: &mut BitVector, smer: &[u8]) -> Result<()> {
    for h in 0..params.num_hashes.max(1) {
        if let Some(p) = params.position_of(smer, h) {
            vector0.set_bit(p, true)?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SimpleFilter {
    pub params: HashParams,
    pub b: BitVector,
}

impl SimpleFilter {
    #[must_use]
    pub fn new(params: HashParams) -> Self {
        let b = BitVector::new_plain_zeroed(params.num_bits);
        Self { params, b }
    }

    pub fn add(&mut self, smer: &[u8]) -> Result<()> {
        add_smer(&self.params, &mut self.b, smer)
    }
}

impl BloomFilterOps for SimpleFilter {
    fn params(&self) -> &HashParams {
        &self.params
    }
    fn params_mut(&mut self) -> &mut HashParams {
        &mut self.params
    }
    fn kind(&self) -> FilterKind {
        FilterKind::Simple
    }
    fn vector(&self, slot: Slot) -> Option<&BitVector> {
        matches!(slot, Slot::Zero).then_some(&self.b)
    }
    fn vector_mut(&mut self, slot: Slot) -> Option<&mut BitVector> {
        matches!(slot, Slot::Zero).then_some(&mut self.b)
    }
    fn lookup(&self, position: u64) -> Result<Lookup> {
        Ok(if self.b.bit(position) {
            Lookup::Unresolved
        } else {
            Lookup::Absent
        })
    }
}

#[derive(Debug, Clone)]
pub struct AllSomeFilter {
    pub params: HashParams,
    pub b_all: BitVector,
    pub b_some: BitVector,
}

impl AllSomeFilter {
    #[must_use]
    pub fn new(params: HashParams) -> Self {
        let b_all = BitVector::new_plain_zeroed(params.num_bits);
        let b_some = BitVector::new_plain_zeroed(params.num_bits);
        Self {
            params,
            b_all,
            b_some,
        }
    }

    /// Builds a leaf's output filter from its input simple filter
    /// (spec.md §4.3: "Leaf: B_all(l) = input filter; B_some(l) = all
    /// zeros").
    #[must_use]
    pub fn from_leaf(input: &SimpleFilter) -> Self {
        Self {
            params: input.params,
            b_all: input.b.clone(),
            b_some: BitVector::new_plain_zeroed(input.params.num_bits),
        }
    }
}

impl BloomFilterOps for AllSomeFilter {
    fn params(&self) -> &HashParams {
        &self.params
    }
    fn params_mut(&mut self) -> &mut HashParams {
        &mut self.params
    }
    fn kind(&self) -> FilterKind {
        FilterKind::AllSome
    }
    fn vector(&self, slot: Slot) -> Option<&BitVector> {
        Some(match slot {
            Slot::Zero => &self.b_all,
            Slot::One => &self.b_some,
        })
    }
    fn vector_mut(&mut self, slot: Slot) -> Option<&mut BitVector> {
        Some(match slot {
            Slot::Zero => &mut self.b_all,
            Slot::One => &mut self.b_some,
        })
    }
    fn lookup(&self, position: u64) -> Result<Lookup> {
        Ok(if self.b_all.bit(position) {
            Lookup::Present
        } else if !self.b_some.bit(position) {
            Lookup::Absent
        } else {
            Lookup::Unresolved
        })
    }
}

#[derive(Debug, Clone)]
pub struct DeterminedFilter {
    pub params: HashParams,
    pub b_det: BitVector,
    pub b_how: BitVector,
}

impl DeterminedFilter {
    #[must_use]
    pub fn new(params: HashParams) -> Self {
        let b_det = BitVector::new_plain_zeroed(params.num_bits);
        let b_how = BitVector::new_plain_zeroed(params.num_bits);
        Self {
            params,
            b_det,
            b_how,
        }
    }

    /// Builds a leaf's output filter (spec.md §4.3: "Leaf: B_det(l) =
    /// all ones; B_how(l) = input filter").
    #[must_use]
    pub fn from_leaf(input: &SimpleFilter) -> Result<Self> {
        let mut b_det = BitVector::new_plain_zeroed(input.params.num_bits);
        b_det.fill(true)?;
        Ok(Self {
            params: input.params,
            b_det,
            b_how: input.b.clone(),
        })
    }
}

impl BloomFilterOps for DeterminedFilter {
    fn params(&self) -> &HashParams {
        &self.params
    }
    fn params_mut(&mut self) -> &mut HashParams {
        &mut self.params
    }
    fn kind(&self) -> FilterKind {
        FilterKind::Determined
    }
    fn vector(&self, slot: Slot) -> Option<&BitVector> {
        Some(match slot {
            Slot::Zero => &self.b_det,
            Slot::One => &self.b_how,
        })
    }
    fn vector_mut(&mut self, slot: Slot) -> Option<&mut BitVector> {
        Some(match slot {
            Slot::Zero => &mut self.b_det,
            Slot::One => &mut self.b_how,
        })
    }
    fn lookup(&self, position: u64) -> Result<Lookup> {
        Ok(if !self.b_det.bit(position) {
            Lookup::Unresolved
        } else if self.b_how.bit(position) {
            Lookup::Present
        } else {
            Lookup::Absent
        })
    }
}

#[derive(Debug, Clone)]
pub struct DeterminedBriefFilter {
    pub params: HashParams,
    pub b_det: BitVector,
    /// Squeezed relative to `b_det` once built; `how_state` records
    /// whether that squeeze has happened yet.
    pub b_how: BitVector,
    pub how_state: SqueezeState,
}

impl DeterminedBriefFilter {
    #[must_use]
    pub fn from_determined(det: DeterminedFilter, how_state: SqueezeState) -> Self {
        Self {
            params: det.params,
            b_det: det.b_det,
            b_how: det.b_how,
            how_state,
        }
    }

    /// Position adjustment used when descending into this node's
    /// children (spec.md §4.2's "Position adjustment for
    /// DeterminedBrief"): `rank0(p) = p - rank1_{B_det}(p)`.
    pub fn rank0(&self, position: u64) -> Result<u64> {
        Ok(position - self.b_det.rank1(position)?)
    }

    /// Inverse of [`Self::rank0`]: restores the pre-descent coordinate.
    pub fn select0(&self, position: u64) -> Result<u64> {
        self.b_det.select0(position)
    }
}

impl BloomFilterOps for DeterminedBriefFilter {
    fn params(&self) -> &HashParams {
        &self.params
    }
    fn params_mut(&mut self) -> &mut HashParams {
        &mut self.params
    }
    fn kind(&self) -> FilterKind {
        FilterKind::DeterminedBrief
    }
    fn vector(&self, slot: Slot) -> Option<&BitVector> {
        Some(match slot {
            Slot::Zero => &self.b_det,
            Slot::One => &self.b_how,
        })
    }
    fn vector_mut(&mut self, slot: Slot) -> Option<&mut BitVector> {
        Some(match slot {
            Slot::Zero => &mut self.b_det,
            Slot::One => &mut self.b_how,
        })
    }
    fn lookup(&self, position: u64) -> Result<Lookup> {
        if !self.b_det.bit(position) {
            return Ok(Lookup::Unresolved);
        }
        let q = self.b_det.rank1(position)?;
        Ok(if self.b_how.bit(q) {
            Lookup::Present
        } else {
            Lookup::Absent
        })
    }
}

/// One Bloom filter, in one of the four kinds.
#[enum_dispatch(BloomFilterOps)]
#[derive(Debug, Clone)]
pub enum BloomFilter {
    Simple(SimpleFilter),
    AllSome(AllSomeFilter),
    Determined(DeterminedFilter),
    DeterminedBrief(DeterminedBriefFilter),
}

impl BloomFilter {
    /// `union_with`: ORs `other`'s vector at `slot` into `self`'s.
    pub fn union_with(&mut self, other: &Self, slot: Slot) -> Result<()> {
        let src = other.vector(slot).ok_or(Error::Invalid("no such vector slot"))?;
        let dst = self.vector_mut(slot).ok_or(Error::Invalid("no such vector slot"))?;
        dst.or_in_place(src)
    }

    /// `intersect_with`: ANDs `other`'s vector at `slot` into `self`'s.
    pub fn intersect_with(&mut self, other: &Self, slot: Slot) -> Result<()> {
        let src = other.vector(slot).ok_or(Error::Invalid("no such vector slot"))?;
        let dst = self.vector_mut(slot).ok_or(Error::Invalid("no such vector slot"))?;
        dst.and_in_place(src)
    }

    /// `mask_with`: `self[slot] &= !other[slot]` (spec.md §4.2). The
    /// source's `intersect_with_complement` is a plain alias for this
    /// same operation.
    pub fn mask_with(&mut self, other: &Self, slot: Slot) -> Result<()> {
        let src = other.vector(slot).ok_or(Error::Invalid("no such vector slot"))?;
        let dst = self.vector_mut(slot).ok_or(Error::Invalid("no such vector slot"))?;
        dst.andnot_in_place(src)
    }

    /// Alias for [`Self::mask_with`], matching the source API surface.
    pub fn intersect_with_complement(&mut self, other: &Self, slot: Slot) -> Result<()> {
        self.mask_with(other, slot)
    }

    /// Squeezes the vector at `slot` down to `spec`'s support.
    pub fn squeeze_by(&mut self, spec: &BitVector, slot: Slot) -> Result<()> {
        let dst = self.vector_mut(slot).ok_or(Error::Invalid("no such vector slot"))?;
        *dst = dst.squeeze_by(spec)?;
        Ok(())
    }

    /// Replaces every vector that `is_all_zeros()`/`is_all_ones()` with
    /// the corresponding degenerate representation (spec.md §4.3's
    /// "Simplification").
    pub fn simplify(&mut self) -> Result<()> {
        for slot in [Slot::Zero, Slot::One] {
            if let Some(v) = self.vector_mut(slot) {
                if v.is_all_zeros() {
                    *v = BitVector::new_zeroed(v.len());
                } else if v.is_all_ones() {
                    *v = v.compress_to(Compressor::AllOnes)?;
                }
            }
        }
        Ok(())
    }

    /// Copies the hash parameters from `other` (used when a filter is
    /// constructed as a template copy ahead of receiving its own bits).
    pub fn copy_properties(&mut self, other: &Self) {
        *self.params_mut() = *other.params();
    }

    /// Replaces this filter's vector at `slot` with `other`'s,
    /// transferring ownership of the (potentially large) buffer rather
    /// than cloning it.
    pub fn steal_bits(&mut self, other: &mut Self, slot: Slot) -> Result<()> {
        let taken = other
            .vector_mut(slot)
            .map(|v| std::mem::replace(v, BitVector::new_zeroed(0)))
            .ok_or(Error::Invalid("no such vector slot"))?;
        let dst = self.vector_mut(slot).ok_or(Error::Invalid("no such vector slot"))?;
        *dst = taken;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn params(num_bits: u64) -> HashParams {
        HashParams {
            smer_size: 4,
            num_hashes: 1,
            seed1: 1,
            seed2: 2,
            hash_modulus: num_bits,
            num_bits,
            set_size_known: false,
            set_size: 0,
        }
    }

    fn filter_from_bits(p: HashParams, bits: &str) -> SimpleFilter {
        let mut v = BitVector::new_plain_zeroed(bits.len() as u64);
        for (i, c) in bits.chars().enumerate() {
            if c == '1' {
                v.set_bit(i as u64, true).unwrap();
            }
        }
        SimpleFilter { params: p, b: v }
    }

    #[test]
    fn simple_lookup_matches_bit() {
        let p = params(8);
        let f = filter_from_bits(p, "10000000");
        assert_eq!(f.lookup(0).unwrap(), Lookup::Unresolved);
        assert_eq!(f.lookup(1).unwrap(), Lookup::Absent);
    }

    #[test]
    fn allsome_lookup_three_way() {
        let p = params(8);
        let mut all = BitVector::new_plain_zeroed(8);
        all.set_bit(0, true).unwrap();
        let mut some = BitVector::new_plain_zeroed(8);
        some.set_bit(1, true).unwrap();
        let f = AllSomeFilter {
            params: p,
            b_all: all,
            b_some: some,
        };
        assert_eq!(f.lookup(0).unwrap(), Lookup::Present);
        assert_eq!(f.lookup(1).unwrap(), Lookup::Unresolved);
        assert_eq!(f.lookup(2).unwrap(), Lookup::Absent);
    }

    #[test]
    fn determined_lookup_three_way() {
        let p = params(8);
        let mut det = BitVector::new_plain_zeroed(8);
        det.set_bit(0, true).unwrap();
        det.set_bit(1, true).unwrap();
        let mut how = BitVector::new_plain_zeroed(8);
        how.set_bit(0, true).unwrap();
        let f = DeterminedFilter {
            params: p,
            b_det: det,
            b_how: how,
        };
        assert_eq!(f.lookup(0).unwrap(), Lookup::Present);
        assert_eq!(f.lookup(1).unwrap(), Lookup::Absent);
        assert_eq!(f.lookup(2).unwrap(), Lookup::Unresolved);
    }

    #[test]
    fn determined_brief_rank_transform_roundtrips() {
        let p = params(8);
        let mut det = BitVector::new_plain_zeroed(8);
        for i in [0u64, 2, 4, 6] {
            det.set_bit(i, true).unwrap();
        }
        let how = BitVector::new_plain_zeroed(4);
        let f = DeterminedBriefFilter {
            params: p,
            b_det: det,
            b_how: how,
            how_state: SqueezeState::Squeezed,
        };
        for p in 0u64..8 {
            if f.b_det.bit(p) {
                let adjusted = f.rank0(p).unwrap();
                let restored = f.select0(adjusted).unwrap();
                assert_eq!(restored, p);
            }
        }
    }

    #[test]
    fn e2_determined_brief_build_matches_spec_example() {
        // spec.md §8 E2: four length-8 leaf filters, hash(x) = pos.
        let p = params(8);
        let leaves = ["11000000", "10100000", "01100000", "00110000"]
            .map(|s| filter_from_bits(p, s));
        let det_leaves: Vec<DeterminedFilter> = leaves
            .iter()
            .map(|l| DeterminedFilter::from_leaf(l).unwrap())
            .collect();

        // B_how(root) = AND over children of B_how(c); B_det(root) = B_how(root) OR z(root)
        // where z = AND over children of (B_det(c) AND NOT B_how(c)); leaves have B_det=all-ones.
        let mut b_how = det_leaves[0].b_how.clone();
        for l in &det_leaves[1..] {
            b_how.and_in_place(&l.b_how).unwrap();
        }
        let mut z = BitVector::new_filled(8);
        for l in &det_leaves {
            let mut term = l.b_det.clone();
            term.andnot_in_place(&l.b_how).unwrap();
            z.and_in_place(&term).unwrap();
        }
        let mut b_det = b_how.clone();
        b_det.or_in_place(&z).unwrap();

        for i in 0..4 {
            assert!(b_det.bit(i), "position {i} should be determined");
        }
        for i in 4..8 {
            assert!(!b_det.bit(i), "position {i} should be undetermined");
        }

        // Root finalization: B_how(root) := B_how(root) AND B_det(root).
        b_how.and_in_place(&b_det).unwrap();
        assert_eq!(b_how.popcount(), 0);
        assert_eq!(b_how.rank1(0).unwrap(), 0);
    }
}
