// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Bridges a [`crate::bloom::BloomFilter`] to the on-disk container
//! format (spec.md §6), resolving which vectors within a (possibly
//! shared) container file belong to a given node via the file manager
//! (spec.md §3's "File manager").

use crate::bitvector::{BitVector, Compressor};
use crate::bloom::{
    AllSomeFilter, BloomFilter, BloomFilterOps, DeterminedBriefFilter, DeterminedFilter, FilterKind,
    HashParams, SimpleFilter, Slot, SqueezeState,
};
use crate::config::Config;
use crate::container::file_manager::FileManager;
use crate::container::{self, Header, Kind, VectorInfo, MAGIC_FINISHED};
use crate::error::{Error, Result};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

/// Reads `node_name`'s filter out of `path`, which may hold several
/// nodes' filters back-to-back (spec.md §4.6: multiple nodes may share
/// one container file).
pub fn load_filter(path: &Path, node_name: &str, file_manager: &mut FileManager) -> Result<BloomFilter> {
    let names = file_manager.names_in_file(path).to_vec();
    let index = names
        .iter()
        .position(|n| n == node_name)
        .unwrap_or(0);

    let file = file_manager.open_for_read(path)?;
    file.seek(SeekFrom::Start(0))?;
    let (header, finished) = Header::decode_full(file)?;
    if !finished {
        return Err(Error::Decode(crate::coding::DecodeError::InvalidHeader(
            "container file is marked unfinished",
        )));
    }

    let kind = header.kind;
    let vpf = kind.vectors_per_filter() as usize;
    let start = index * vpf;
    let end = start + vpf;
    if end > header.vectors.len() {
        return Err(Error::Structure(format!(
            "node '{node_name}' has no corresponding vectors in {}",
            path.display()
        )));
    }

    let mut vectors = Vec::with_capacity(vpf);
    for info in &header.vectors[start..end] {
        file.seek(SeekFrom::Start(info.offset))?;
        vectors.push(container::decode_vector(file, info.compressor, info.stored_as_plain)?);
    }

    let params = header.to_hash_params();
    if params.num_hashes > 1 {
        return Err(Error::Consistency(
            "filters with numHashes > 1 cannot be used in build/query (spec.md §9(c))".to_string(),
        ));
    }

    build_filter_from_vectors(kind, params, vectors, &header.vectors[start..end])
}

fn build_filter_from_vectors(
    kind: Kind,
    params: HashParams,
    mut vectors: Vec<BitVector>,
    infos: &[VectorInfo],
) -> Result<BloomFilter> {
    match kind {
        Kind::Simple | Kind::Intersection => {
            let b = vectors.pop().ok_or(Error::Structure("missing vector".to_string()))?;
            Ok(BloomFilter::Simple(SimpleFilter { params, b }))
        }
        Kind::AllSome => {
            let b_some = vectors.pop().ok_or(Error::Structure("missing vector".to_string()))?;
            let b_all = vectors.pop().ok_or(Error::Structure("missing vector".to_string()))?;
            Ok(BloomFilter::AllSome(AllSomeFilter { params, b_all, b_some }))
        }
        Kind::Determined => {
            let b_how = vectors.pop().ok_or(Error::Structure("missing vector".to_string()))?;
            let b_det = vectors.pop().ok_or(Error::Structure("missing vector".to_string()))?;
            Ok(BloomFilter::Determined(DeterminedFilter { params, b_det, b_how }))
        }
        Kind::DeterminedBrief => {
            let how_info = infos.last().ok_or(Error::Structure("missing vector".to_string()))?;
            let how_state = if how_info.filter_info == 0 {
                SqueezeState::Squeezed
            } else {
                SqueezeState::NotSqueezed
            };
            let b_how = vectors.pop().ok_or(Error::Structure("missing vector".to_string()))?;
            let b_det = vectors.pop().ok_or(Error::Structure("missing vector".to_string()))?;
            Ok(BloomFilter::DeterminedBrief(DeterminedBriefFilter {
                params,
                b_det,
                b_how,
                how_state,
            }))
        }
    }
}

/// Filter kinds that are written to disk but aren't in
/// [`crate::bloom::FilterKind`] (the debug-only Intersection variant
/// reuses [`SimpleFilter`]'s single-vector shape).
pub enum SavedFilter<'a> {
    Filter(&'a BloomFilter),
    Intersection(&'a SimpleFilter),
}

/// Writes a single node's filter to its own container file (the common
/// case for internal-node output, spec.md §4.3's "saved to its target
/// filename"). Shared multi-node files are only ever read, never
/// produced by this crate's build stage.
pub fn save_filter(path: &Path, filter: SavedFilter<'_>, config: &Config) -> Result<()> {
    let (kind, params, bvs): (Kind, HashParams, Vec<&BitVector>) = match filter {
        SavedFilter::Filter(f) => {
            let k = Kind::from(f.kind());
            let p = *f.params();
            let mut vs = Vec::new();
            if let Some(v) = f.vector(Slot::Zero) {
                vs.push(v);
            }
            if let Some(v) = f.vector(Slot::One) {
                vs.push(v);
            }
            (k, p, vs)
        }
        SavedFilter::Intersection(f) => (Kind::Intersection, f.params, vec![&f.b]),
    };

    let how_state = if let SavedFilter::Filter(BloomFilter::DeterminedBrief(db)) = filter {
        Some(db.how_state)
    } else {
        None
    };

    let compressed: Vec<BitVector> = bvs
        .iter()
        .map(|v| {
            if config.simplify && (v.is_all_zeros() || v.is_all_ones()) {
                if v.is_all_zeros() {
                    Ok(BitVector::new_zeroed(v.len()))
                } else {
                    v.compress_to(Compressor::AllOnes)
                }
            } else {
                match config.compressor {
                    Compressor::Rrr => v.compress_to_rrr(config.rrr.block_size, config.rrr.rank_period),
                    other => v.compress_to(other),
                }
            }
        })
        .collect::<Result<_>>()?;

    let mut header = Header::from_hash_params(kind, &params);
    let mut payloads = Vec::with_capacity(compressed.len());
    for (i, v) in compressed.iter().enumerate() {
        let genuine_payload = container::encode_vector(v)?;
        // RRR's simplified class+raw-bits scheme doesn't always beat a
        // plain dump (e.g. a vector with no long zero/one runs). When it
        // doesn't, fall back to the plain bytes rather than ship a
        // genuine payload that's bigger than what it's replacing, and
        // record the fallback so a reader doesn't try to parse plain
        // bytes as RRR blocks (spec.md §6's "RRR-as-plain (unfinished)").
        let (payload, stored_as_plain) = if v.compressor() == Compressor::Rrr {
            let plain_payload = container::encode_vector(&BitVector::Plain(v.to_plain()))?;
            if plain_payload.len() < genuine_payload.len() {
                (plain_payload, true)
            } else {
                (genuine_payload, false)
            }
        } else {
            (genuine_payload, false)
        };
        let filter_info = match (kind, how_state, i) {
            (Kind::DeterminedBrief, Some(SqueezeState::Squeezed), 1) => 0,
            (Kind::DeterminedBrief, Some(SqueezeState::NotSqueezed), 1) => 1,
            _ => 0,
        };
        header.vectors.push(VectorInfo {
            compressor: v.compressor(),
            stored_as_plain,
            rrr_block_size: config.rrr.block_size as u8,
            rrr_rank_period: config.rrr.rank_period,
            name: None,
            offset: 0, // patched below
            num_bytes: payload.len() as u64,
            filter_info,
        });
        payloads.push(payload);
    }

    let header_bytes_len = {
        // encode once to learn header_size, then patch offsets and re-encode
        let probe = header.encode_full()?;
        probe.len() as u64
    };
    let mut offset = header_bytes_len;
    for (info, payload) in header.vectors.iter_mut().zip(&payloads) {
        info.offset = offset;
        offset += payload.len() as u64;
    }

    let mut out = header.encode_full()?;
    for payload in &payloads {
        out.extend_from_slice(payload);
    }
    // Flip the magic from "unfinished" to "finished" only once every
    // byte is in the buffer (spec.md §7: "containers written partially
    // carry the unfinished magic").
    out[0..8].copy_from_slice(&MAGIC_FINISHED.to_le_bytes());

    let tmp_path = path.with_extension("bf.tmp");
    {
        let mut f = std::fs::File::create(&tmp_path)?;
        f.write_all(&out)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitvector::BitVector as Bv;
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

    #[test]
    fn simple_filter_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.bf");
        let mut b = Bv::new_plain_zeroed(16);
        b.set_bit(3, true).unwrap();
        b.set_bit(9, true).unwrap();
        let filter = BloomFilter::Simple(SimpleFilter { params: params(16), b });
        save_filter(&path, SavedFilter::Filter(&filter), &Config::default()).unwrap();

        let mut fm = FileManager::new();
        fm.register_node(&path, "leaf");
        let loaded = load_filter(&path, "leaf", &mut fm).unwrap();
        assert!(matches!(loaded, BloomFilter::Simple(_)));
        assert_eq!(loaded.lookup(3).unwrap(), crate::bloom::Lookup::Unresolved);
        assert_eq!(loaded.lookup(4).unwrap(), crate::bloom::Lookup::Absent);
    }

    #[test]
    fn determined_brief_filter_preserves_squeeze_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.bf");
        let mut det = Bv::new_plain_zeroed(8);
        for i in [0u64, 2, 4, 6] {
            det.set_bit(i, true).unwrap();
        }
        let how = Bv::new_plain_zeroed(4);
        let filter = BloomFilter::DeterminedBrief(DeterminedBriefFilter {
            params: params(8),
            b_det: det,
            b_how: how,
            how_state: SqueezeState::Squeezed,
        });
        save_filter(&path, SavedFilter::Filter(&filter), &Config::default()).unwrap();

        let mut fm = FileManager::new();
        fm.register_node(&path, "node");
        let loaded = load_filter(&path, "node", &mut fm).unwrap();
        match loaded {
            BloomFilter::DeterminedBrief(db) => {
                assert_eq!(db.how_state, SqueezeState::Squeezed);
                assert_eq!(db.b_det.popcount(), 4);
            }
            _ => panic!("expected DeterminedBrief"),
        }
    }
}
