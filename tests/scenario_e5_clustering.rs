// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! spec.md §8 E5: four leaves over an 8-bit interval with filters
//! `00000001`, `00000010`, `11111100`, `11111000`. Greedy merge order is
//! L3/L4 (Hamming distance 1) before L1/L2 (distance 2), then the root
//! joins the two pairs — a balanced tree, not a ladder.

use howdesbt::bloom::{BloomFilter, HashParams, SimpleFilter};
use howdesbt::bitvector::BitVector;
use howdesbt::cluster::cluster;
use howdesbt::config::Config;
use howdesbt::tree::io::{save_filter, SavedFilter};
use std::path::{Path, PathBuf};

fn write_leaf(dir: &Path, name: &str, bits: &str) -> PathBuf {
    let mut v = BitVector::new_plain_zeroed(bits.len() as u64);
    for (i, c) in bits.chars().enumerate() {
        if c == '1' {
            v.set_bit(i as u64, true).unwrap();
        }
    }
    let params = HashParams {
        smer_size: 4,
        num_hashes: 1,
        seed1: 1,
        seed2: 2,
        hash_modulus: bits.len() as u64,
        num_bits: bits.len() as u64,
        set_size_known: false,
        set_size: 0,
    };
    let filter = BloomFilter::Simple(SimpleFilter { params, b: v });
    let path = dir.join(format!("{name}.bf"));
    save_filter(&path, SavedFilter::Filter(&filter), &Config::default()).unwrap();
    path
}

#[test]
fn closest_pairs_merge_before_the_root_joins_them() {
    let dir = tempfile::tempdir().unwrap();

    // L1/L2 differ by 2 bits (positions 0 and 1 both flip); L3/L4 differ
    // by only 1 bit (position 5). L3/L4 must merge first.
    let l1 = write_leaf(dir.path(), "L1", "00000001");
    let l2 = write_leaf(dir.path(), "L2", "00000010");
    let l3 = write_leaf(dir.path(), "L3", "11111100");
    let l4 = write_leaf(dir.path(), "L4", "11111000");

    let leaves = vec![
        ("L1".to_string(), l1),
        ("L2".to_string(), l2),
        ("L3".to_string(), l3),
        ("L4".to_string(), l4),
    ];
    let tree = cluster(&leaves, &Config::default(), dir.path(), "node{number}").unwrap();

    // A height-balanced result: the root has exactly two children, each
    // an internal node pairing off two leaves (not a ladder where one
    // side is a lone leaf).
    assert!(!tree.root.is_dummy);
    assert_eq!(tree.root.children.len(), 2);
    for child in &tree.root.children {
        assert_eq!(child.children.len(), 2, "expected balanced pairs, not a ladder");
        let names: std::collections::BTreeSet<&str> = child.children.iter().map(|c| c.name.as_str()).collect();
        assert!(
            names == ["L1", "L2"].into_iter().collect() || names == ["L3", "L4"].into_iter().collect(),
            "unexpected pairing: {names:?}"
        );
    }
}
