// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Tree construction (spec.md §4.3): bottom-up materialization of one
//! of the four production filter kinds (or the debug `Intersection`
//! variant) over an already-parsed topology, grounded on
//! `BloomTree::build`/`unloadedChild`/`reportUnusedStuff` in the
//! original source's `bloom_tree.cc`, adapted to this crate's owned
//! (non-shared-pointer) node tree.

use crate::bitvector::BitVector;
use crate::bloom::{
    AllSomeFilter, BloomFilter, BloomFilterOps, DeterminedBriefFilter, DeterminedFilter, FilterKind,
    HashParams, SimpleFilter, SqueezeState,
};
use crate::config::Config;
use crate::container::naming;
use crate::error::{Error, Result};
use crate::tree::io::{load_filter, save_filter, SavedFilter};
use crate::tree::{Node, Tree};
use std::path::Path;

/// Which kind of tree to materialize (spec.md §4.3's four production
/// recurrences plus the debug Intersection tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    Simple,
    AllSome,
    Determined,
    DeterminedBrief,
    Intersection,
}

impl BuildKind {
    #[must_use]
    fn filter_kind(self) -> FilterKind {
        match self {
            Self::Simple => FilterKind::Simple,
            Self::AllSome => FilterKind::AllSome,
            Self::Determined | Self::DeterminedBrief => FilterKind::Determined,
            Self::Intersection => FilterKind::Intersection,
        }
    }
}

/// Builds every subtree of `tree` with the chosen kind, saving
/// internal-node (and re-saved leaf) filters under `tree.base_dir` and
/// rewriting each node's `filename`/`filter` fields in place.
pub fn build(tree: &mut Tree, which: BuildKind, config: &Config) -> Result<()> {
    let base_dir = tree.base_dir.clone();
    if tree.root.is_dummy {
        for child in &mut tree.root.children {
            build_root(child, which, config, &base_dir, &mut tree.file_manager)?;
        }
        Ok(())
    } else {
        build_root(&mut tree.root, which, config, &base_dir, &mut tree.file_manager)
    }
}

fn build_root(
    root: &mut Node,
    which: BuildKind,
    config: &Config,
    base_dir: &Path,
    fm: &mut crate::container::file_manager::FileManager,
) -> Result<()> {
    let filter = match which {
        BuildKind::Simple => BloomFilter::Simple(build_simple(root, fm, config, base_dir)?),
        BuildKind::Intersection => BloomFilter::Simple(build_intersection(root, fm, config, base_dir)?),
        BuildKind::AllSome => BloomFilter::AllSome(build_allsome(root, fm, config, base_dir)?.0),
        BuildKind::Determined => {
            let (mut det, _, _) = build_determined(root, fm, config, base_dir, false)?;
            // Root finalization (spec.md §4.3 Determined): B_how(root) := B_how(root) AND B_det(root).
            det.b_how.and_in_place(&det.b_det)?;
            BloomFilter::Determined(det)
        }
        BuildKind::DeterminedBrief => {
            let (det, _, _) = build_determined(root, fm, config, base_dir, true)?;
            let how = det.b_how.clone().squeeze_by(&det.b_det)?;
            BloomFilter::DeterminedBrief(DeterminedBriefFilter {
                params: det.params,
                b_det: det.b_det,
                b_how: how,
                how_state: SqueezeState::Squeezed,
            })
        }
    };
    save_node(root, filter, which.filter_kind(), config, base_dir)
}

fn save_node(
    node: &mut Node,
    mut filter: BloomFilter,
    _kind: FilterKind,
    config: &Config,
    base_dir: &Path,
) -> Result<()> {
    if config.simplify {
        filter.simplify()?;
    }
    let filename = naming::default_filter_name(&node.name, filter.kind(), config.compressor);
    let path = base_dir.join(filename);
    save_filter(&path, SavedFilter::Filter(&filter), config)?;
    node.filename = path;
    node.filter = None;
    Ok(())
}

fn save_leaf_or_internal(
    node: &mut Node,
    filter: SimpleFilter,
    which: BuildKind,
    config: &Config,
    base_dir: &Path,
) -> Result<()> {
    let naming_kind = if matches!(which, BuildKind::Intersection) {
        FilterKind::Intersection
    } else {
        FilterKind::Simple
    };
    let mut f = BloomFilter::Simple(filter);
    if config.simplify {
        f.simplify()?;
    }
    let filename = naming::default_filter_name(&node.name, naming_kind, config.compressor);
    let path = base_dir.join(filename);
    let BloomFilter::Simple(ref s) = f else {
        unreachable!("f was just constructed as Simple")
    };
    match which {
        BuildKind::Intersection => save_filter(&path, SavedFilter::Intersection(s), config)?,
        _ => save_filter(&path, SavedFilter::Filter(&f), config)?,
    }
    node.filename = path;
    node.filter = None;
    Ok(())
}

/// Loads a leaf's input Simple filter (spec.md §4.3 step 1).
fn load_leaf_simple(
    node: &mut Node,
    fm: &mut crate::container::file_manager::FileManager,
) -> Result<SimpleFilter> {
    match load_filter(&node.filename, &node.name, fm)? {
        BloomFilter::Simple(s) => Ok(s),
        _ => Err(Error::Consistency(format!(
            "leaf '{}' input file is not a Simple-kind filter",
            node.name
        ))),
    }
}

// ---------------------------------------------------------------- Simple

fn build_simple(
    node: &mut Node,
    fm: &mut crate::container::file_manager::FileManager,
    config: &Config,
    base_dir: &Path,
) -> Result<SimpleFilter> {
    if node.is_leaf() {
        let filter = load_leaf_simple(node, fm)?;
        node.filter = Some(BloomFilter::Simple(filter.clone()));
        return Ok(filter);
    }

    let mut child_filters = Vec::with_capacity(node.children.len());
    for child in &mut node.children {
        child_filters.push(build_simple(child, fm, config, base_dir)?);
    }
    let params = child_filters[0].params;
    let mut b = BitVector::new_plain_zeroed(params.num_bits);
    for cf in &child_filters {
        b.or_in_place(&cf.b)?;
    }
    for (child, cf) in node.children.iter_mut().zip(child_filters) {
        save_leaf_or_internal(child, cf, BuildKind::Simple, config, base_dir)?;
    }
    let filter = SimpleFilter { params, b };
    node.filter = Some(BloomFilter::Simple(filter.clone()));
    Ok(filter)
}

fn build_intersection(
    node: &mut Node,
    fm: &mut crate::container::file_manager::FileManager,
    config: &Config,
    base_dir: &Path,
) -> Result<SimpleFilter> {
    if node.is_leaf() {
        let filter = load_leaf_simple(node, fm)?;
        node.filter = Some(BloomFilter::Simple(filter.clone()));
        return Ok(filter);
    }

    let mut child_filters = Vec::with_capacity(node.children.len());
    for child in &mut node.children {
        child_filters.push(build_intersection(child, fm, config, base_dir)?);
    }
    let params = child_filters[0].params;
    let mut b = BitVector::new_plain_zeroed(params.num_bits);
    b.fill(true)?;
    for cf in &child_filters {
        b.and_in_place(&cf.b)?;
    }
    for (child, cf) in node.children.iter_mut().zip(child_filters) {
        save_leaf_or_internal(child, cf, BuildKind::Intersection, config, base_dir)?;
    }
    let filter = SimpleFilter { params, b };
    node.filter = Some(BloomFilter::Simple(filter.clone()));
    Ok(filter)
}

// --------------------------------------------------------------- AllSome

fn build_allsome(
    node: &mut Node,
    fm: &mut crate::container::file_manager::FileManager,
    config: &Config,
    base_dir: &Path,
) -> Result<(AllSomeFilter, BitVector, BitVector)> {
    if node.is_leaf() {
        let leaf = load_leaf_simple(node, fm)?;
        let filter = AllSomeFilter::from_leaf(&leaf);
        node.filter = Some(BloomFilter::AllSome(filter.clone()));
        let b_cap = filter.b_all.clone();
        let b_cup = filter.b_all.clone();
        return Ok((filter, b_cap, b_cup));
    }

    let mut computed = Vec::with_capacity(node.children.len());
    for child in &mut node.children {
        computed.push(build_allsome(child, fm, config, base_dir)?);
    }
    let params = computed[0].0.params;

    let mut b_cap = BitVector::new_plain_zeroed(params.num_bits);
    b_cap.fill(true)?;
    for (_, cap, _) in &computed {
        b_cap.and_in_place(cap)?;
    }
    let mut b_cup = BitVector::new_plain_zeroed(params.num_bits);
    for (f, _, _) in &computed {
        b_cup.or_in_place(&f.b_all)?;
        b_cup.or_in_place(&f.b_some)?;
    }

    let mut b_some_x = b_cup.clone();
    b_some_x.andnot_in_place(&b_cap)?;
    let filter = AllSomeFilter {
        params,
        b_all: b_cap.clone(),
        b_some: b_some_x,
    };

    for (child, (mut cf, _, _)) in node.children.iter_mut().zip(computed) {
        // Finalize child against x (spec.md §4.3 AllSome):
        // B_all(c) := B_all(c) AND NOT B_all(x); B_some(c) unchanged.
        cf.b_all.andnot_in_place(&filter.b_all)?;
        save_node(child, BloomFilter::AllSome(cf), FilterKind::AllSome, config, base_dir)?;
    }

    node.filter = Some(BloomFilter::AllSome(filter.clone()));
    Ok((filter, b_cap, b_cup))
}

// ------------------------------------------------------------ Determined

fn build_determined(
    node: &mut Node,
    fm: &mut crate::container::file_manager::FileManager,
    config: &Config,
    base_dir: &Path,
    brief: bool,
) -> Result<(DeterminedFilter, BitVector, BitVector)> {
    if node.is_leaf() {
        let leaf = load_leaf_simple(node, fm)?;
        let filter = DeterminedFilter::from_leaf(&leaf)?;
        node.filter = Some(BloomFilter::Determined(filter.clone()));
        let b_cap = filter.b_how.clone();
        let z = BitVector::new_filled(filter.params.num_bits);
        return Ok((filter, b_cap, z));
    }

    let mut computed = Vec::with_capacity(node.children.len());
    for child in &mut node.children {
        computed.push(build_determined(child, fm, config, base_dir, brief)?);
    }
    let params = computed[0].0.params;

    let mut b_cap = BitVector::new_plain_zeroed(params.num_bits);
    b_cap.fill(true)?;
    for (f, _, _) in &computed {
        b_cap.and_in_place(&f.b_how)?;
    }
    let mut z = BitVector::new_plain_zeroed(params.num_bits);
    z.fill(true)?;
    for (f, _, _) in &computed {
        let mut term = f.b_det.clone();
        term.andnot_in_place(&f.b_how)?;
        z.and_in_place(&term)?;
    }

    let b_how_x = b_cap.clone();
    let mut b_det_x = b_how_x.clone();
    b_det_x.or_in_place(&z)?;

    let filter = DeterminedFilter {
        params,
        b_det: b_det_x.clone(),
        b_how: b_how_x,
    };

    for (child, (mut cf, _, _)) in node.children.iter_mut().zip(computed) {
        // Finalize child against x (spec.md §4.3 Determined):
        // B_det(c) := B_det(c) AND NOT B_det(x); B_how(c) := B_how(c) AND B_det(c).
        if brief {
            // DeterminedBrief shares the same pre-squeeze quantities, but
            // finalizes by squeezing rather than masking in place:
            // I_det(c) = NOT B_det(x); I_how(c) = B_det(c) AND I_det(c);
            // B_det(c) := squeeze(B_det(c), I_det(c)); B_how(c) := squeeze(B_how(c), I_how(c)).
            let mut i_det = filter.b_det.clone();
            i_det.complement_in_place()?;
            let mut i_how = cf.b_det.clone();
            i_how.and_in_place(&i_det)?;
            let squeezed_det = cf.b_det.squeeze_by(&i_det)?;
            let squeezed_how = cf.b_how.squeeze_by(&i_how)?;
            let brief_filter = DeterminedBriefFilter {
                params: cf.params,
                b_det: squeezed_det,
                b_how: squeezed_how,
                how_state: SqueezeState::Squeezed,
            };
            save_node(
                child,
                BloomFilter::DeterminedBrief(brief_filter),
                FilterKind::DeterminedBrief,
                config,
                base_dir,
            )?;
        } else {
            cf.b_det.andnot_in_place(&filter.b_det)?;
            cf.b_how.and_in_place(&cf.b_det)?;
            save_node(child, BloomFilter::Determined(cf), FilterKind::Determined, config, base_dir)?;
        }
    }

    node.filter = Some(BloomFilter::Determined(filter.clone()));
    Ok((filter, b_cap, z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;
    use test_log::test;

    fn write_leaf(dir: &std::path::Path, name: &str, bits: &str) -> std::path::PathBuf {
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
    fn e1_simple_tree_union_over_two_leaves() {
        let dir = tempfile::tempdir().unwrap();
        // L1={A,B} at positions 0,1 ; L2={B,C} at positions 1,2; 16-bit filters
        write_leaf(dir.path(), "L1", "1100000000000000");
        write_leaf(dir.path(), "L2", "0110000000000000");

        let topo = dir.path().join("tree.sbt");
        std::fs::write(&topo, "root.bf\n*L1.bf\n*L2.bf\n").unwrap();
        let mut tree = Tree::load_topology(&topo).unwrap();
        build(&mut tree, BuildKind::Simple, &Config::default()).unwrap();

        let loaded = load_filter(&tree.root.filename, &tree.root.name, &mut tree.file_manager).unwrap();
        match loaded {
            BloomFilter::Simple(s) => {
                assert!(s.b.bit(0));
                assert!(s.b.bit(1));
                assert!(s.b.bit(2));
            }
            _ => panic!("expected simple filter"),
        }
    }

    #[test]
    fn e2_determined_brief_build_matches_spec_example() {
        let dir = tempfile::tempdir().unwrap();
        write_leaf(dir.path(), "A", "11000000");
        write_leaf(dir.path(), "B", "10100000");
        write_leaf(dir.path(), "C", "01100000");
        write_leaf(dir.path(), "D", "00110000");

        let topo = dir.path().join("tree.sbt");
        std::fs::write(&topo, "root.bf\n*A.bf\n*B.bf\n*C.bf\n*D.bf\n").unwrap();
        let mut tree = Tree::load_topology(&topo).unwrap();
        build(&mut tree, BuildKind::DeterminedBrief, &Config::default()).unwrap();

        let loaded = load_filter(&tree.root.filename, &tree.root.name, &mut tree.file_manager).unwrap();
        match loaded {
            BloomFilter::DeterminedBrief(db) => {
                for i in 0..4 {
                    assert!(db.b_det.bit(i), "position {i} should be determined");
                }
                for i in 4..8 {
                    assert!(!db.b_det.bit(i), "position {i} should be undetermined");
                }
                assert_eq!(db.b_how.popcount(), 0);
            }
            other => panic!("expected DeterminedBrief, got {other:?}"),
        }
    }
}
