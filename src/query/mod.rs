// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Batched query traversal (spec.md §4.5): for a batch of queries, walk
//! the tree once, resolving as many of each query's hash positions as
//! possible at each node before deciding whether to prune or descend.
//! Grounded on `BloomTree::batchquery`/`leafyquery` in the original
//! source's `bloom_tree.cc`, adapted to this crate's owned node tree
//! (no shared pointers, no process-wide globals) and to `BloomFilter`'s
//! generic `lookup()` rather than the source's per-kind query methods.

use crate::bloom::{BloomFilter, BloomFilterOps, HashParams, Lookup};
use crate::config::Config;
use crate::error::Result;
use crate::hash::smers;
use crate::tree::io::load_filter;
use crate::tree::{Node, Tree};

/// One leaf a query was reported against (spec.md §4.5's "match list").
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub leaf_name: String,
    pub num_passed: u64,
    pub num_positions: u64,
    /// False-positive-adjusted k-mer count (spec.md §4.5), present only
    /// when the matching filter's set size is known.
    pub adjusted_count: Option<u64>,
}

/// A single query's hash positions and running tally, threaded through
/// one `run_batch` traversal (spec.md §4.5 steps 1-4). Positions are
/// partitioned in place: `[0, numUnresolved)` still need a verdict,
/// `[numUnresolved, numUnresolved+numPassed)` and the remainder are
/// already decided, swapped to the tail as they resolve.
#[derive(Debug, Clone)]
pub struct Query {
    pub name: String,
    pub threshold: f64,
    positions: Vec<u64>,
    num_unresolved: u64,
    num_passed: u64,
    num_failed: u64,
    needed_to_pass: u64,
    needed_to_fail: u64,
    stack: Vec<(u64, u64, u64)>,
    pub matches: Vec<QueryMatch>,
}

impl Query {
    /// Builds a query from already-hashed positions (spec.md §4.5 step
    /// 1's output), skipping the s-mer extraction entirely. Returns
    /// `None` if `positions` is empty once deduplicated — such a query
    /// carries no information and is dropped (spec.md §4.5's note on
    /// empty queries).
    #[must_use]
    pub fn from_positions(name: String, mut positions: Vec<u64>, threshold: f64, dedupe: bool) -> Option<Self> {
        if dedupe {
            positions.sort_unstable();
            positions.dedup();
        }
        let num_positions = positions.len() as u64;
        if num_positions == 0 {
            log::warn!("query '{name}' has no usable hash positions; dropping");
            return None;
        }
        let needed_to_pass = (threshold * num_positions as f64).ceil() as u64;
        let needed_to_fail = num_positions - needed_to_pass + 1;
        Some(Self {
            name,
            threshold,
            positions,
            num_unresolved: num_positions,
            num_passed: 0,
            num_failed: 0,
            needed_to_pass,
            needed_to_fail,
            stack: Vec::new(),
            matches: Vec::new(),
        })
    }

    /// Extracts every `smer_size`-length window of `sequence`, hashes
    /// each to a bit position under `params`, and builds the query's
    /// initial position list (spec.md §4.5 step 1). `name` identifies
    /// the query in its reported matches.
    #[must_use]
    pub fn prepare(name: String, sequence: &[u8], threshold: f64, params: &HashParams, config: &Config) -> Option<Self> {
        let positions: Vec<u64> = smers(sequence, params.smer_size as usize)
            .filter_map(|s| params.hash_position(s))
            .collect();
        Self::from_positions(name, positions, threshold, config.dedupe_query_positions)
    }

    #[must_use]
    pub fn num_positions(&self) -> u64 {
        self.num_unresolved + self.num_passed + self.num_failed
    }

    fn push_state(&mut self) {
        self.stack.push((self.num_unresolved, self.num_passed, self.num_failed));
    }

    fn pop_state(&mut self) {
        let (u, p, f) = self.stack.pop().expect("push_state/pop_state calls are paired");
        self.num_unresolved = u;
        self.num_passed = p;
        self.num_failed = f;
    }

    /// Moves `positions[idx]` out of the unresolved window by swapping
    /// it with the last unresolved entry (spec.md §4.5's "swap to the
    /// tail" partitioning).
    fn swap_resolve(&mut self, idx: usize) {
        let last = (self.num_unresolved - 1) as usize;
        self.positions.swap(idx, last);
        self.num_unresolved -= 1;
    }

    fn record_match(&mut self, leaf_name: &str, fpr: f64) {
        let adjusted = (fpr > 0.0).then(|| adjusted_count(self.num_passed, self.num_positions(), fpr));
        self.matches.push(QueryMatch {
            leaf_name: leaf_name.to_string(),
            num_passed: self.num_passed,
            num_positions: self.num_positions(),
            adjusted_count: adjusted,
        });
    }
}

/// Standard Bloom false-positive-rate count adjustment (spec.md §4.5):
/// `round(((observed/|Q|) - fpr) / (1 - fpr) * |Q|)`, clamped at zero.
/// Grounded on `BloomFilter::adjustedCounts` in the original source's
/// `bloom_filter.cc`.
#[must_use]
pub fn adjusted_count(observed: u64, num_positions: u64, fpr: f64) -> u64 {
    if num_positions == 0 || fpr >= 1.0 {
        return observed;
    }
    let observed_rate = observed as f64 / num_positions as f64;
    let adjusted = (observed_rate - fpr) / (1.0 - fpr) * num_positions as f64;
    adjusted.max(0.0).round() as u64
}

enum Disposition {
    Passed,
    Failed,
    Continue,
}

/// Resolves every still-unresolved position against a leaf's filter.
/// At a leaf, `Unresolved` is treated as `Present` (spec.md §4.5: "a
/// leaf has no deeper subtree to refer an undetermined bit to"), and
/// every position is decided in one pass since there is nowhere left
/// to descend.
fn resolve_leaf(q: &mut Query, filter: &BloomFilter) -> Result<Disposition> {
    if q.needed_to_pass == 0 {
        return Ok(Disposition::Passed);
    }
    let n = q.num_unresolved as usize;
    for i in 0..n {
        match filter.lookup(q.positions[i])? {
            Lookup::Absent => q.num_failed += 1,
            Lookup::Present | Lookup::Unresolved => q.num_passed += 1,
        }
    }
    q.num_unresolved = 0;
    Ok(if q.num_passed >= q.needed_to_pass {
        Disposition::Passed
    } else {
        Disposition::Failed
    })
}

/// Resolves positions against an internal node's filter, short-
/// circuiting as soon as a verdict is certain. The present-count
/// short-circuit is skipped in counted mode (spec.md §4.5's "Counted
/// mode"), so a query that has already cleared its pass threshold
/// still descends for every leaf's exact count rather than stopping
/// at this node's coarse one.
fn resolve_internal(q: &mut Query, filter: &BloomFilter, counted_mode: bool) -> Result<Disposition> {
    if q.needed_to_pass == 0 {
        return Ok(Disposition::Passed);
    }
    let mut idx = 0usize;
    while idx < q.num_unresolved as usize {
        match filter.lookup(q.positions[idx])? {
            Lookup::Absent => {
                q.num_failed += 1;
                q.swap_resolve(idx);
                if q.num_failed >= q.needed_to_fail {
                    return Ok(Disposition::Failed);
                }
            }
            Lookup::Present => {
                q.num_passed += 1;
                q.swap_resolve(idx);
                if !counted_mode && q.num_passed >= q.needed_to_pass {
                    return Ok(Disposition::Passed);
                }
            }
            Lookup::Unresolved => idx += 1,
        }
    }
    Ok(if q.num_unresolved > 0 {
        // Every remaining position is genuinely unresolved (a natural
        // loop exit visits each unresolved entry exactly once); there is
        // more to learn by descending, regardless of mode.
        Disposition::Continue
    } else if q.num_passed >= q.needed_to_pass {
        Disposition::Passed
    } else {
        Disposition::Failed
    })
}

/// Runs every query in `queries` against `tree` in a single traversal
/// (spec.md §4.5). Matches accumulate on each `Query`'s `matches` list;
/// call this once per batch, not once per query, to amortize filter
/// loads across queries the way the source's `batchquery` does.
pub fn run_batch(tree: &mut Tree, queries: &mut [Query], config: &Config) -> Result<()> {
    let active: Vec<usize> = (0..queries.len()).collect();
    traverse(&mut tree.root, queries, &active, config, &mut tree.file_manager)
}

fn traverse(
    node: &mut Node,
    queries: &mut [Query],
    active: &[usize],
    config: &Config,
    fm: &mut crate::container::file_manager::FileManager,
) -> Result<()> {
    if active.is_empty() {
        return Ok(());
    }

    if node.is_dummy {
        for child in &mut node.children {
            traverse(child, queries, active, config, fm)?;
        }
        return Ok(());
    }

    for &qi in active {
        queries[qi].push_state();
    }

    let filter = load_filter(&node.filename, &node.name, fm)?;
    let fpr = filter.params().false_positive_rate();
    let is_leaf = node.is_leaf();

    let mut still_active = Vec::with_capacity(active.len());
    let mut passed_here = Vec::new();

    for &qi in active {
        let disposition = if is_leaf {
            resolve_leaf(&mut queries[qi], &filter)?
        } else {
            resolve_internal(&mut queries[qi], &filter, config.counted_mode)?
        };
        match disposition {
            Disposition::Passed => passed_here.push(qi),
            Disposition::Failed => {}
            Disposition::Continue => still_active.push(qi),
        }
    }

    if !passed_here.is_empty() {
        let leaves = node.leaf_names();
        for &qi in &passed_here {
            for leaf_name in &leaves {
                queries[qi].record_match(leaf_name, fpr);
            }
        }
    }

    if !is_leaf && !still_active.is_empty() {
        // DeterminedBrief is the only kind whose children are indexed in
        // a squeezed coordinate space (spec.md §4.2): rewrite every
        // still-active query's unresolved window through rank0 before
        // descending, and back through select0 on the way up.
        let adjustor = match &filter {
            BloomFilter::DeterminedBrief(db) => Some(db.clone()),
            _ => None,
        };
        let windows: Vec<u64> = still_active.iter().map(|&qi| queries[qi].num_unresolved).collect();

        if let Some(db) = &adjustor {
            for &qi in &still_active {
                let n = queries[qi].num_unresolved as usize;
                for i in 0..n {
                    queries[qi].positions[i] = db.rank0(queries[qi].positions[i])?;
                }
            }
        }

        for child in &mut node.children {
            traverse(child, queries, &still_active, config, fm)?;
        }

        if let Some(db) = &adjustor {
            for (&qi, &window) in still_active.iter().zip(&windows) {
                for i in 0..window as usize {
                    queries[qi].positions[i] = db.select0(queries[qi].positions[i])?;
                }
            }
        }
    }

    node.unload();

    for &qi in active {
        queries[qi].pop_state();
    }
    Ok(())
}

/// Evaluates every leaf directly, skipping internal-node pruning
/// entirely (spec.md §4.5's "leaf-only fast path"). Only sound for
/// Simple-kind trees: a Simple internal filter's `lookup` never
/// returns `Present` (it is a plain union), so internal pruning never
/// short-circuits anything for that kind and this path does the same
/// work with far less per-node bookkeeping.
pub fn run_leaf_only(tree: &mut Tree, queries: &mut [Query]) -> Result<()> {
    let mut leaves = Vec::new();
    tree.root.walk_preorder(&mut |n| {
        if !n.is_dummy && n.is_leaf() {
            leaves.push((n.name.clone(), n.filename.clone()));
        }
    });

    for (name, filename) in leaves {
        let filter = load_filter(&filename, &name, &mut tree.file_manager)?;
        let fpr = filter.params().false_positive_rate();
        for q in queries.iter_mut() {
            q.push_state();
            let disposition = resolve_leaf(q, &filter)?;
            if matches!(disposition, Disposition::Passed) {
                q.record_match(&name, fpr);
            }
            q.pop_state();
        }
    }
    Ok(())
}
