// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! RRR-style succinct bit-vector: a read-only, rank/select-capable
//! compressed representation built from fixed-size blocks (spec.md §3,
//! compressor `RRR`).
//!
//! Each block is tagged with its popcount ("class"). All-zero and
//! all-one blocks store no bit data at all; every other block falls
//! back to storing its raw bits. This gives the same compression win
//! real RRR gets on the long zero/one runs that dominate internal-node
//! filters after ANDing, without requiring the combinatorial-rank
//! bignum arithmetic a fully entropy-optimal encoding needs.

use super::plain::PlainBitVector;
use crate::error::{Error, Result};
use std::io::{self, Read};

#[derive(Debug, Clone)]
struct Block {
    class: u16,
    /// Raw bits, only populated for blocks that are neither all-zero
    /// nor all-one.
    bits: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct RrrBitVector {
    block_size: u16,
    rank_period: u8,
    num_bits: u64,
    blocks: Vec<Block>,
    /// Cumulative popcount at the start of every `rank_period`-th
    /// block, indexed `0, period, 2*period, ...`.
    rank_samples: Vec<u64>,
}

impl RrrBitVector {
    #[must_use]
    pub fn block_size(&self) -> u16 {
        self.block_size
    }

    #[must_use]
    pub fn rank_period(&self) -> u8 {
        self.rank_period
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.num_bits
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    pub fn from_plain(plain: &PlainBitVector, block_size: u16, rank_period: u8) -> Result<Self> {
        if block_size == 0 || rank_period == 0 {
            return Err(Error::Invalid("RRR block size and rank period must be nonzero"));
        }
        let num_bits = plain.len();
        let block_size_u64 = u64::from(block_size);
        let num_blocks = num_bits.div_ceil(block_size_u64) as usize;
        let mut blocks = Vec::with_capacity(num_blocks);
        let mut rank_samples = Vec::new();
        let mut running = 0u64;

        for b in 0..num_blocks {
            if b % usize::from(rank_period) == 0 {
                rank_samples.push(running);
            }
            let start = b as u64 * block_size_u64;
            let end = (start + block_size_u64).min(num_bits);
            let mut class = 0u16;
            let mut raw = Vec::with_capacity(((end - start + 7) / 8) as usize);
            let mut cur = 0u8;
            let mut cur_bits = 0u32;
            for pos in start..end {
                let bit = plain.bit(pos);
                if bit {
                    class += 1;
                    cur |= 1 << cur_bits;
                }
                cur_bits += 1;
                if cur_bits == 8 {
                    raw.push(cur);
                    cur = 0;
                    cur_bits = 0;
                }
            }
            if cur_bits > 0 {
                raw.push(cur);
            }
            let width = (end - start) as u16;
            let bits = if class == 0 || class == width {
                None
            } else {
                Some(raw)
            };
            running += u64::from(class);
            blocks.push(Block { class, bits });
        }

        Ok(Self {
            block_size,
            rank_period,
            num_bits,
            blocks,
            rank_samples,
        })
    }

    fn block_bit(&self, block_idx: usize, offset_in_block: u32) -> bool {
        let block = &self.blocks[block_idx];
        match &block.bits {
            Some(raw) => {
                let byte = raw[(offset_in_block / 8) as usize];
                (byte >> (offset_in_block % 8)) & 1 != 0
            }
            None => {
                let width = self.block_width(block_idx);
                class_is_full(block.class, width)
            }
        }
    }

    fn block_width(&self, block_idx: usize) -> u16 {
        let start = block_idx as u64 * u64::from(self.block_size);
        let end = (start + u64::from(self.block_size)).min(self.num_bits);
        (end - start) as u16
    }

    #[must_use]
    pub fn bit(&self, pos: u64) -> bool {
        debug_assert!(pos < self.num_bits);
        let block_idx = (pos / u64::from(self.block_size)) as usize;
        let offset = (pos % u64::from(self.block_size)) as u32;
        self.block_bit(block_idx, offset)
    }

    pub fn rank1(&self, pos: u64) -> Result<u64> {
        if pos > self.num_bits {
            return Err(Error::Invalid("rank1 position out of range"));
        }
        let block_size = u64::from(self.block_size);
        let block_idx = (pos / block_size) as usize;
        let sample_idx = block_idx / usize::from(self.rank_period);
        let sample_block_start = sample_idx * usize::from(self.rank_period);
        let mut count = self.rank_samples[sample_idx];
        for b in sample_block_start..block_idx {
            count += u64::from(self.blocks[b].class);
        }
        let offset = (pos % block_size) as u32;
        if offset > 0 && block_idx < self.blocks.len() {
            for o in 0..offset {
                if self.block_bit(block_idx, o) {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    #[must_use]
    pub fn popcount(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.class)).sum()
    }

    pub fn select0(&self, i: u64) -> Result<u64> {
        let total_zeros = self.num_bits - self.popcount();
        if i >= total_zeros {
            return Err(Error::Invalid("select0 index out of range"));
        }
        let mut zeros_seen = 0u64;
        let mut pos = 0u64;
        let block_size = u64::from(self.block_size);
        for (b, block) in self.blocks.iter().enumerate() {
            let width = self.block_width(b);
            let block_zeros = u64::from(width) - u64::from(block.class);
            if zeros_seen + block_zeros <= i {
                zeros_seen += block_zeros;
                pos += u64::from(width);
                continue;
            }
            for o in 0..width {
                if !self.block_bit(b, u32::from(o)) {
                    if zeros_seen == i {
                        return Ok(pos);
                    }
                    zeros_seen += 1;
                }
                pos += 1;
            }
        }
        Err(Error::Invalid("select0 index out of range"))
    }

    pub fn to_plain(&self) -> PlainBitVector {
        let mut out = PlainBitVector::new_zeroed(self.num_bits);
        let block_size = u64::from(self.block_size);
        for (b, block) in self.blocks.iter().enumerate() {
            let width = self.block_width(b);
            let start = b as u64 * block_size;
            for o in 0..width {
                if self.block_bit(b, u32::from(o)) {
                    out.set_bit(start + u64::from(o), true);
                }
            }
        }
        out
    }

    /// Serializes the block structure itself (class tag per block, plus
    /// raw bits for blocks that are neither all-zero nor all-one): the
    /// genuine RRR succinct payload, distinct from a plain bit dump.
    #[must_use]
    pub fn encode_blocks(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for block in &self.blocks {
            out.extend_from_slice(&block.class.to_le_bytes());
            if let Some(bits) = &block.bits {
                out.extend_from_slice(bits);
            }
        }
        out
    }

    /// Inverse of [`Self::encode_blocks`]: rebuilds a vector's block
    /// array (and its derived rank-sample cache) from the genuine RRR
    /// payload, given the `num_bits`/`block_size`/`rank_period` recorded
    /// in the container header. Reads directly off `reader` rather than
    /// a pre-sized buffer, since a non-degenerate block's width isn't
    /// known until its class byte is read, and a shared container file
    /// may pack another vector's payload immediately afterward.
    pub fn decode_blocks<R: Read>(reader: &mut R, num_bits: u64, block_size: u16, rank_period: u8) -> Result<Self> {
        if block_size == 0 || rank_period == 0 {
            return Err(Error::Invalid("RRR block size and rank period must be nonzero"));
        }
        let block_size_u64 = u64::from(block_size);
        let num_blocks = num_bits.div_ceil(block_size_u64) as usize;
        let mut blocks = Vec::with_capacity(num_blocks);
        for b in 0..num_blocks {
            let start = b as u64 * block_size_u64;
            let end = (start + block_size_u64).min(num_bits);
            let width = (end - start) as u16;
            let mut class_bytes = [0u8; 2];
            reader
                .read_exact(&mut class_bytes)
                .map_err(|_| Error::Invalid("truncated RRR block payload"))?;
            let class = u16::from_le_bytes(class_bytes);
            let bits = if class == 0 || class == width {
                None
            } else {
                let num_bytes = ((u64::from(width) + 7) / 8) as usize;
                let mut raw = vec![0u8; num_bytes];
                reader
                    .read_exact(&mut raw)
                    .map_err(|_| Error::Invalid("truncated RRR block payload"))?;
                Some(raw)
            };
            blocks.push(Block { class, bits });
        }
        let rank_samples = rank_samples_from_blocks(&blocks, rank_period);
        Ok(Self {
            block_size,
            rank_period,
            num_bits,
            blocks,
            rank_samples,
        })
    }
}

/// Shared by [`RrrBitVector::from_plain`]'s inline pass and
/// [`RrrBitVector::decode_blocks`]: the cumulative popcount sampled at
/// the start of every `rank_period`-th block.
fn rank_samples_from_blocks(blocks: &[Block], rank_period: u8) -> Vec<u64> {
    let mut rank_samples = Vec::new();
    let mut running = 0u64;
    for (b, block) in blocks.iter().enumerate() {
        if b % usize::from(rank_period) == 0 {
            rank_samples.push(running);
        }
        running += u64::from(block.class);
    }
    rank_samples
}

fn class_is_full(class: u16, width: u16) -> bool {
    class == width
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn plain_from_str(s: &str) -> PlainBitVector {
        let mut v = PlainBitVector::new_zeroed(s.len() as u64);
        for (i, c) in s.chars().enumerate() {
            if c == '1' {
                v.set_bit(i as u64, true);
            }
        }
        v
    }

    #[test]
    fn roundtrips_through_plain() {
        let plain = plain_from_str("1101001101110000111100001010101011110000");
        let rrr = RrrBitVector::from_plain(&plain, 8, 4).unwrap();
        let back = rrr.to_plain();
        for i in 0..plain.len() {
            assert_eq!(plain.bit(i), back.bit(i), "pos {i}");
        }
    }

    #[test]
    fn rank1_matches_plain() {
        let plain = plain_from_str("110100110111000011110000101010101111000011110000");
        let rrr = RrrBitVector::from_plain(&plain, 6, 3).unwrap();
        for pos in 0..=plain.len() {
            assert_eq!(rrr.rank1(pos).unwrap(), plain.rank1(pos).unwrap(), "pos {pos}");
        }
    }

    #[test]
    fn select0_matches_plain() {
        let plain = plain_from_str("1101001101110000111100001010101011110000111100001111");
        let rrr = RrrBitVector::from_plain(&plain, 5, 2).unwrap();
        let zeros = plain.len() - plain.popcount();
        for i in 0..zeros {
            assert_eq!(rrr.select0(i).unwrap(), plain.select0(i).unwrap(), "i {i}");
        }
    }

    #[test]
    fn all_zero_and_all_one_blocks_are_degenerate() {
        let plain = PlainBitVector::new_zeroed(64);
        let rrr = RrrBitVector::from_plain(&plain, 8, 1).unwrap();
        assert!(rrr.blocks.iter().all(|b| b.bits.is_none()));
        assert_eq!(rrr.popcount(), 0);

        let plain_ones = PlainBitVector::new_filled(64);
        let rrr_ones = RrrBitVector::from_plain(&plain_ones, 8, 1).unwrap();
        assert!(rrr_ones.blocks.iter().all(|b| b.bits.is_none()));
        assert_eq!(rrr_ones.popcount(), 64);
    }

    #[test]
    fn encode_blocks_roundtrips_to_decode_blocks() {
        let plain = plain_from_str("1101001101110000111100001010101011110000111100001111");
        let rrr = RrrBitVector::from_plain(&plain, 5, 2).unwrap();
        let bytes = rrr.encode_blocks();
        let mut cursor = io::Cursor::new(bytes);
        let decoded = RrrBitVector::decode_blocks(&mut cursor, plain.len(), 5, 2).unwrap();
        for pos in 0..plain.len() {
            assert_eq!(decoded.bit(pos), plain.bit(pos), "pos {pos}");
        }
        for pos in 0..=plain.len() {
            assert_eq!(decoded.rank1(pos).unwrap(), plain.rank1(pos).unwrap(), "pos {pos}");
        }
    }

    #[test]
    fn encode_blocks_is_not_a_plain_bit_dump() {
        // A vector whose every block is degenerate (all-zero) encodes far
        // shorter than the raw bit array: no block stores a `bits` payload.
        let plain = PlainBitVector::new_zeroed(4000);
        let rrr = RrrBitVector::from_plain(&plain, 250, 32).unwrap();
        let bytes = rrr.encode_blocks();
        assert!(bytes.len() < plain.as_bytes().len());
    }
}
