// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Filename derivation helpers (spec.md §4.3's "derived from the node
//! name by appending `.<kind>.<compressor>.bf`"), grounded on
//! `BloomFilter::default_filename`/`strip_filter_suffix` in the
//! original source's `bloom_filter.h`.

use crate::bitvector::Compressor;
use crate::bloom::FilterKind;

fn kind_suffix(kind: FilterKind) -> &'static str {
    match kind {
        FilterKind::Simple => "simple",
        FilterKind::AllSome => "allsome",
        FilterKind::Determined => "det",
        FilterKind::DeterminedBrief => "detbrief",
        FilterKind::Intersection => "intersection",
    }
}

fn compressor_suffix(compressor: Compressor) -> &'static str {
    match compressor {
        Compressor::Plain => "bf",
        Compressor::Rrr => "rrr",
        Compressor::Roaring => "roar",
        Compressor::AllZeros | Compressor::AllOnes => "bf",
    }
}

/// Derives the on-disk filename an internal (or re-saved leaf) node's
/// filter is written to: `<name>.<kind>.<compressor>.bf`.
#[must_use]
pub fn default_filter_name(node_name: &str, kind: FilterKind, compressor: Compressor) -> String {
    format!(
        "{}.{}.{}.bf",
        strip_filter_suffix(node_name),
        kind_suffix(kind),
        compressor_suffix(compressor)
    )
}

/// Strips a trailing `.bf`/`.rrr`/`.roar` (and any kind infix before
/// it) from a node/file name, so repeated re-derivation doesn't chain
/// suffixes onto an already-derived filename.
#[must_use]
pub fn strip_filter_suffix(name: &str) -> &str {
    let known_suffixes = [
        ".simple.bf", ".simple.rrr", ".simple.roar",
        ".allsome.bf", ".allsome.rrr", ".allsome.roar",
        ".det.bf", ".det.rrr", ".det.roar",
        ".detbrief.bf", ".detbrief.rrr", ".detbrief.roar",
        ".intersection.bf", ".intersection.rrr", ".intersection.roar",
        ".bf", ".rrr", ".roar",
    ];
    for suffix in known_suffixes {
        if let Some(stripped) = name.strip_suffix(suffix) {
            return stripped;
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn derives_expected_filename() {
        let name = default_filter_name("node1", FilterKind::DeterminedBrief, Compressor::Rrr);
        assert_eq!(name, "node1.detbrief.rrr");
    }

    #[test]
    fn strips_known_suffix_before_rederiving() {
        assert_eq!(strip_filter_suffix("node1.simple.bf"), "node1");
        assert_eq!(strip_filter_suffix("node1.detbrief.rrr"), "node1");
        assert_eq!(strip_filter_suffix("leaf1.bf"), "leaf1");
        assert_eq!(strip_filter_suffix("leaf1"), "leaf1");
    }
}
