// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The s-mer hash function.
//!
//! spec.md §1 treats k-mer/s-mer hashing as an opaque `hash(smer) -> u64`
//! collaborator; this module supplies a concrete, deterministic instance of
//! that contract, seeded per-filter as spec.md §3's "Bloom filter" data
//! model requires (two 64-bit seeds, shared across every filter in a tree).

/// Computes the hash of one s-mer under a filter's seed pair, for hash
/// function index `which` (0-based). Index 0 is the primary hash; indices
/// beyond 0 exist only to support `numHashes > 1` leaf insertion (spec.md
/// §9(c)) via double hashing in the style of `BloomFilter::get_hash` in the
/// teacher crate.
#[must_use]
pub fn hash_smer(seed1: u64, seed2: u64, smer: &[u8], which: u32) -> u64 {
    let h0 = xxhash_rust::xxh3::xxh3_128_with_seed(smer, seed1);
    let h1 = (h0 >> 64) as u64;
    let h2 = (h0 as u64) ^ seed2;

    if which == 0 {
        h1
    } else {
        h1.wrapping_add(h2.wrapping_mul(u64::from(which)))
    }
}

/// Iterates over every `smer_size`-length contiguous window of `sequence`.
///
/// This is the in-scope half of "s-mer extraction"; turning a raw FASTA
/// record into `sequence` bytes is out of scope (spec.md §1).
pub fn smers(sequence: &[u8], smer_size: usize) -> impl Iterator<Item = &[u8]> {
    if smer_size == 0 || sequence.len() < smer_size {
        sequence[0..0].windows(smer_size.max(1))
    } else {
        sequence.windows(smer_size)
    }
}
