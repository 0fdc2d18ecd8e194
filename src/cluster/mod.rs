// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Greedy hierarchical clustering and optional culling (spec.md §4.4),
//! grounded on `ClusterCommand::cluster_greedily`/`compute_det_ratio`/
//! `determine_culling_threshold`/`cull_nodes`/`top_down_numbering` in
//! the original source's `cmd_cluster.cc`. Distances and det-ratios are
//! both computed over the same `[start, end)` bit window the original
//! reads directly off disk; this crate instead loads each leaf's
//! filter in full and slices the window out of the decoded bits, since
//! nothing here is performance-critical enough to justify raw byte
//! offsets into a (possibly compressed) container file.

use crate::bitvector::BitVector;
use crate::bloom::BloomFilter;
use crate::config::{Config, CullingThreshold};
use crate::container::file_manager::FileManager;
use crate::error::{Error, Result};
use crate::tree::io::load_filter;
use crate::tree::{Node, Tree};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::path::{Path, PathBuf};

/// A candidate merge in the priority queue: distance between `u` and
/// `v`, the height the merged subtree would have, and the two node
/// indices. Ties break on height (to avoid a ladder tree across
/// zero-distance merges), then on `u`, then on `v` — matching
/// `operator>` on `MergeCandidate` in `cmd_cluster.cc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MergeCandidate {
    d: u64,
    height: u32,
    u: u32,
    v: u32,
}

impl Ord for MergeCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed field-by-field so a max-heap (`BinaryHeap`) pops the
        // smallest (d, height, u, v) first.
        other
            .d
            .cmp(&self.d)
            .then_with(|| other.height.cmp(&self.height))
            .then_with(|| other.u.cmp(&self.u))
            .then_with(|| other.v.cmp(&self.v))
    }
}

impl PartialOrd for MergeCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn hamming_distance(a: &BitVector, b: &BitVector) -> Result<u64> {
    Ok(BitVector::xor(a, b)?.popcount())
}

fn window_slice(b: &BitVector, start: u64, end: u64) -> BitVector {
    use crate::bitvector::plain::PlainBitVector;
    let mut out = PlainBitVector::new_zeroed(end - start);
    for i in start..end {
        if b.bit(i) {
            out.set_bit(i - start, true);
        }
    }
    BitVector::Plain(out)
}

/// Clusters a list of `(node name, leaf filter path)` pairs into a
/// tree by greedy Hamming-distance merging, with optional culling
/// (spec.md §4.4). `node_template` names freshly created internal
/// nodes; it must contain the literal substring `{number}`, replaced
/// with each node's top-down, level-order position (1-based).
pub fn cluster(leaves: &[(String, PathBuf)], config: &Config, base_dir: &Path, node_template: &str) -> Result<Tree> {
    if leaves.is_empty() {
        return Err(Error::Structure("cluster requires at least one leaf".to_string()));
    }

    let mut file_manager = FileManager::new();
    for (name, path) in leaves {
        file_manager.register_node(path, name);
    }

    if leaves.len() == 1 {
        let (name, path) = &leaves[0];
        return Ok(Tree {
            root: Node::new_leaf(name.clone(), path.clone()),
            base_dir: base_dir.to_path_buf(),
            file_manager,
        });
    }

    let num_leaves = leaves.len();
    let num_nodes = 2 * num_leaves - 1;

    // window_bits[i] doubles as B_cup(i): for a leaf, its own windowed
    // bits; for an internal node, the union of its subtree's leaves
    // (spec.md §4.4's "leaf: B_cap = B_cup = leaf's loaded bits").
    let mut window_bits: Vec<BitVector> = Vec::with_capacity(num_nodes);
    let mut heights: Vec<u32> = vec![0; num_nodes];
    let mut left: Vec<Option<u32>> = vec![None; num_nodes];
    let mut right: Vec<Option<u32>> = vec![None; num_nodes];
    let mut active: Vec<bool> = vec![true; num_nodes];

    let mut params0 = None;
    for (name, path) in leaves {
        let filter = load_filter(path, name, &mut file_manager)?;
        let BloomFilter::Simple(simple) = filter else {
            return Err(Error::Consistency(format!(
                "leaf '{name}' input file is not a Simple-kind filter"
            )));
        };
        match &params0 {
            Some(p0) => simple.params.check_consistent_with(p0)?,
            None => params0 = Some(simple.params),
        }
        let (start, end) = config.resolved_cluster_window(simple.params.num_bits);
        window_bits.push(window_slice(&simple.b, start, end));
    }
    for h in heights.iter_mut().take(num_leaves) {
        *h = 1;
    }

    let mut heap = BinaryHeap::new();
    for u in 0..num_leaves - 1 {
        for v in (u + 1)..num_leaves {
            let d = hamming_distance(&window_bits[u], &window_bits[v])?;
            heap.push(MergeCandidate {
                d,
                height: 2,
                u: u as u32,
                v: v as u32,
            });
        }
    }

    for w in num_leaves..num_nodes {
        let (d, height, u, v) = loop {
            let cand = heap.pop().ok_or_else(|| Error::Structure("cluster queue exhausted before tree completed".to_string()))?;
            if !active[cand.u as usize] || !active[cand.v as usize] {
                continue;
            }
            break (cand.d, cand.height, cand.u, cand.v);
        };
        log::debug!("merging node {u} and node {v} into node {w} (hamming distance {d})");

        let w_bits = BitVector::or(&window_bits[u as usize], &window_bits[v as usize])?;
        window_bits.push(w_bits);
        heights[w] = height;
        left[w] = Some(u);
        right[w] = Some(v);
        active[u as usize] = false;
        active[v as usize] = false;

        for x in 0..w {
            if !active[x] {
                continue;
            }
            let dx = hamming_distance(&window_bits[x], &window_bits[w])?;
            let hx = 1 + height.max(heights[x]);
            heap.push(MergeCandidate {
                d: dx,
                height: hx,
                u: x as u32,
                v: w as u32,
            });
        }
    }

    let root_id = num_nodes - 1;
    let fruitful = cull(&left, &right, &window_bits, root_id, config)?;

    let leaf_names: Vec<(String, PathBuf)> = leaves.to_vec();
    let top_nodes = reparent_build(root_id, &leaf_names, &left, &right, &fruitful);
    let mut root = if top_nodes.len() == 1 {
        top_nodes.into_iter().next().expect("checked len == 1")
    } else {
        Node::new_dummy_root(top_nodes)
    };
    assign_internal_names(&mut root, node_template);

    Ok(Tree {
        root,
        base_dir: base_dir.to_path_buf(),
        file_manager,
    })
}

/// Computes each internal node's active-determined ratio and marks it
/// fruitless when below the configured (or derived) threshold (spec.md
/// §4.4's "Culling"). Returns `fruitful[i]` for every node index
/// (leaves are always `true`).
fn cull(left: &[Option<u32>], right: &[Option<u32>], b_cup: &[BitVector], root_id: usize, config: &Config) -> Result<Vec<bool>> {
    let num_nodes = b_cup.len();
    let mut fruitful = vec![true; num_nodes];
    if matches!(config.culling, CullingThreshold::Disabled) {
        return Ok(fruitful);
    }

    let mut b_cap: Vec<Option<BitVector>> = vec![None; num_nodes];
    compute_b_cap(root_id, left, right, b_cup, &mut b_cap)?;
    let mut b_det: Vec<BitVector> = Vec::with_capacity(num_nodes);
    for i in 0..num_nodes {
        let cap = b_cap[i].as_ref().expect("filled by compute_b_cap from the root");
        b_det.push(BitVector::ornot(cap, &b_cup[i])?);
    }

    let num_bits = b_cup[root_id].len();
    let mut ratios: Vec<Option<(u64, u64)>> = vec![None; num_nodes];
    collect_ratios(root_id, None, left, right, &b_det, num_bits, &mut ratios)?;

    let threshold = match config.culling {
        CullingThreshold::Disabled => unreachable!("handled above"),
        CullingThreshold::Explicit(v) => v.clamp(0.0, 1.0),
        CullingThreshold::ZScore(z) => {
            let samples: Vec<f64> = ratios
                .iter()
                .flatten()
                .filter(|(_, inf)| *inf > 0)
                .map(|(one, inf)| *one as f64 / *inf as f64)
                .collect();
            if samples.is_empty() {
                return Err(Error::Structure(
                    "can't compute culling threshold, tree has no participating nodes".to_string(),
                ));
            }
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            let mean_sq = samples.iter().map(|x| x * x).sum::<f64>() / samples.len() as f64;
            let stdev = (mean_sq - mean * mean).max(0.0).sqrt();
            let raw = mean - z * stdev;
            log::info!("setting culling threshold to {:.1}% (mean={mean:.6} stdev={stdev:.6})", 100.0 * raw.clamp(0.0, 1.0));
            raw.clamp(0.0, 1.0)
        }
    };

    for (i, ratio) in ratios.iter().enumerate() {
        if let Some((one, inf)) = ratio {
            if (*one as f64) < (*inf as f64) * threshold {
                fruitful[i] = false;
            }
        }
    }
    Ok(fruitful)
}

fn compute_b_cap(node: usize, left: &[Option<u32>], right: &[Option<u32>], b_cup: &[BitVector], b_cap: &mut Vec<Option<BitVector>>) -> Result<()> {
    if b_cap[node].is_some() {
        return Ok(());
    }
    match (left[node], right[node]) {
        (Some(l), Some(r)) => {
            compute_b_cap(l as usize, left, right, b_cup, b_cap)?;
            compute_b_cap(r as usize, left, right, b_cup, b_cap)?;
            let l_cap = b_cap[l as usize].as_ref().expect("just computed");
            let r_cap = b_cap[r as usize].as_ref().expect("just computed");
            b_cap[node] = Some(BitVector::and(l_cap, r_cap)?);
        }
        _ => b_cap[node] = Some(b_cup[node].clone()),
    }
    Ok(())
}

/// Top-down pass assigning, to every internal node, `(numDetOne,
/// numDetInf)` against its parent's `B_det` (or the root's own
/// `popcount(B_det)/numBits` formula for the root itself).
fn collect_ratios(
    node: usize,
    parent_b_det: Option<&BitVector>,
    left: &[Option<u32>],
    right: &[Option<u32>],
    b_det: &[BitVector],
    num_bits: u64,
    ratios: &mut [Option<(u64, u64)>],
) -> Result<()> {
    let (l, r) = match (left[node], right[node]) {
        (Some(l), Some(r)) => (l, r),
        _ => return Ok(()), // leaves are always fruitful and don't contribute a ratio
    };

    let (num_det_one, num_det_inf) = match parent_b_det {
        None => (b_det[node].popcount(), num_bits),
        Some(pd) => (BitVector::andnot(&b_det[node], pd)?.popcount(), num_bits - pd.popcount()),
    };
    ratios[node] = Some((num_det_one, num_det_inf));

    collect_ratios(l as usize, Some(&b_det[node]), left, right, b_det, num_bits, ratios)?;
    collect_ratios(r as usize, Some(&b_det[node]), left, right, b_det, num_bits, ratios)?;
    Ok(())
}

/// Rebuilds the node tree from the merge structure, splicing a
/// fruitless node's children into its surviving ancestor's child list
/// in its place (spec.md §4.4: "its children are re-parented under its
/// surviving ancestor").
fn reparent_build(node: usize, leaves: &[(String, PathBuf)], left: &[Option<u32>], right: &[Option<u32>], fruitful: &[bool]) -> Vec<Node> {
    match (left[node], right[node]) {
        (Some(l), Some(r)) => {
            let mut children = reparent_build(l as usize, leaves, left, right, fruitful);
            children.extend(reparent_build(r as usize, leaves, left, right, fruitful));
            if fruitful[node] {
                let mut n = Node::new_leaf(String::new(), PathBuf::new());
                n.children = children;
                vec![n]
            } else {
                children
            }
        }
        _ => {
            let (name, path) = &leaves[node];
            vec![Node::new_leaf(name.clone(), path.clone())]
        }
    }
}

/// Numbers every internal node top-down, level by level, left to right
/// (spec.md §4.4's "Node numbering"), by collecting child-index paths
/// in BFS order first (an immutable pass) and then mutating each named
/// node through its path (a second, mutable pass) — sidesteps holding
/// multiple mutable borrows of sibling subtrees at once.
fn assign_internal_names(root: &mut Node, template: &str) {
    fn node_at<'a>(root: &'a Node, path: &[usize]) -> &'a Node {
        path.iter().fold(root, |n, &i| &n.children[i])
    }
    fn node_at_mut<'a>(root: &'a mut Node, path: &[usize]) -> &'a mut Node {
        path.iter().fold(root, |n, &i| &mut n.children[i])
    }

    let mut order: Vec<Vec<usize>> = Vec::new();
    let mut queue: VecDeque<Vec<usize>> = VecDeque::new();
    queue.push_back(Vec::new());
    while let Some(path) = queue.pop_front() {
        let n = node_at(root, &path);
        if !n.is_dummy && !n.is_leaf() {
            order.push(path.clone());
        }
        for i in 0..n.children.len() {
            let mut child_path = path.clone();
            child_path.push(i);
            queue.push_back(child_path);
        }
    }

    for (i, path) in order.iter().enumerate() {
        let name = template.replace("{number}", &(i + 1).to_string());
        let n = node_at_mut(root, path);
        n.filename = PathBuf::from(&name);
        n.name = name;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloom::{HashParams, SimpleFilter};
    use crate::tree::io::{save_filter, SavedFilter};
    use test_log::test;

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
    fn single_leaf_is_returned_as_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_leaf(dir.path(), "only", "1010");
        let tree = cluster(&[("only".to_string(), path)], &Config::default(), dir.path(), "node{number}").unwrap();
        assert!(tree.root.is_leaf());
        assert_eq!(tree.root.name, "only");
    }

    #[test]
    fn closest_pair_merges_first() {
        let dir = tempfile::tempdir().unwrap();
        // A and B differ in 1 bit, C is far from both.
        let a = write_leaf(dir.path(), "A", "110000000000000000000000000000");
        let b = write_leaf(dir.path(), "B", "100000000000000000000000000000");
        let c = write_leaf(dir.path(), "C", "000000000000000000000000000011");
        let leaves = vec![("A".to_string(), a), ("B".to_string(), b), ("C".to_string(), c)];
        let tree = cluster(&leaves, &Config::default(), dir.path(), "node{number}").unwrap();

        assert!(!tree.root.is_dummy);
        assert_eq!(tree.root.children.len(), 2);
        let inner = tree
            .root
            .children
            .iter()
            .find(|c| !c.is_leaf())
            .expect("A and B should have merged into an internal node before C joined");
        let mut names: Vec<&str> = inner.children.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn height_tiebreak_avoids_ladder_on_equal_distances() {
        let dir = tempfile::tempdir().unwrap();
        // Four identical (zero-distance) leaves: without the height
        // tie-break this degenerates into a ladder; with it, the first
        // two merges should pair off independently before being joined.
        let leaves: Vec<(String, PathBuf)> = ["A", "B", "C", "D"]
            .iter()
            .map(|n| (n.to_string(), write_leaf(dir.path(), n, "0000")))
            .collect();
        let tree = cluster(&leaves, &Config::default(), dir.path(), "node{number}").unwrap();

        assert_eq!(tree.root.children.len(), 2);
        for child in &tree.root.children {
            assert_eq!(child.children.len(), 2, "expected a balanced merge, not a ladder");
        }
    }

    #[test]
    fn explicit_culling_threshold_marks_a_node_fruitless() {
        let dir = tempfile::tempdir().unwrap();
        // Two leaves sharing every bit produce an internal node whose
        // active-det ratio is 1.0 against a root formed with a very
        // different third leaf; threshold 1.0 culls everything non-root.
        let a = write_leaf(dir.path(), "A", "11110000");
        let b = write_leaf(dir.path(), "B", "11110000");
        let c = write_leaf(dir.path(), "C", "00001111");
        let leaves = vec![("A".to_string(), a), ("B".to_string(), b), ("C".to_string(), c)];
        let cfg = Config::default().with_culling(CullingThreshold::Explicit(1.0));
        let tree = cluster(&leaves, &cfg, dir.path(), "node{number}").unwrap();

        // A and C share no bits at all, so the root's own det-ratio is
        // 0.0 (nothing is determined at the very top) and gets culled
        // at threshold 1.0, promoting its children (leaf C and the
        // fully-determined A/B merge) into a forest; A/B's merge itself
        // stays fruitful since its ratio against the root is 1.0.
        let mut internal_count = 0;
        tree.root.walk_preorder(&mut |n| {
            if !n.is_leaf() && !n.is_dummy {
                internal_count += 1;
            }
        });
        assert_eq!(internal_count, 1, "the A/B merge should survive even though the root itself is culled");
    }

    #[test]
    fn node_template_is_applied_top_down() {
        let dir = tempfile::tempdir().unwrap();
        let leaves: Vec<(String, PathBuf)> = ["A", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, n)| (n.to_string(), write_leaf(dir.path(), n, if i == 0 { "1100" } else { "0011" })))
            .collect();
        let tree = cluster(&leaves, &Config::default(), dir.path(), "inner{number}.bf").unwrap();
        assert!(tree.root.name.starts_with("inner") && tree.root.name.ends_with(".bf"));
    }
}
