// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Explicit configuration threaded through constructors (spec.md §9's
//! "Global state" design note), in the teacher's `Config::new(...)`
//! builder style (`lsm_tree::Config`).

use crate::bitvector::Compressor;

/// RRR compression parameters (spec.md §3's bit-vector table: "block
/// size 255, rank sample period 32 (both configurable, each ≤255,
/// stored in header)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RrrParams {
    pub block_size: u16,
    pub rank_period: u8,
}

impl Default for RrrParams {
    fn default() -> Self {
        Self {
            block_size: u16::from(crate::container::DEFAULT_RRR_BLOCK_SIZE),
            rank_period: crate::container::DEFAULT_RRR_RANK_PERIOD,
        }
    }
}

/// Culling threshold source (spec.md §4.4): either a user-supplied
/// ratio, or derived from the per-node ratio distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CullingThreshold {
    /// No culling: every internal node is kept.
    Disabled,
    /// An explicit ratio in `[0, 1]`.
    Explicit(f64),
    /// `mean - z * stdev`, clamped to `[0, 1]` (population stdev, per
    /// `cmd_cluster.cc`; see DESIGN.md's Open Question resolution).
    ZScore(f64),
}

impl Default for CullingThreshold {
    fn default() -> Self {
        Self::Disabled
    }
}

/// Explicit, value-style configuration threaded through every
/// construction/clustering/query entry point (spec.md §9: "Replace the
/// source's process-wide debug toggles with an explicit configuration
/// struct threaded through constructors").
#[derive(Debug, Clone)]
pub struct Config {
    /// Which compressor internal-node filters are saved with.
    pub compressor: Compressor,
    pub rrr: RrrParams,
    /// Whether to replace a saved vector with `AllZeros`/`AllOnes` when
    /// it simplifies to one (spec.md §4.3's "Simplification",
    /// disable-able per spec.md).
    pub simplify: bool,
    /// `[start, end)` bit interval used for clustering distance
    /// (spec.md §4.4); `None` means "use the whole filter, capped at
    /// the default window".
    pub cluster_window: Option<(u64, u64)>,
    /// Default width of the clustering window when `cluster_window` is
    /// `None` (spec.md §4.4: "end - start <= 100k by default").
    pub default_cluster_window_width: u64,
    pub culling: CullingThreshold,
    /// Disables the present-count short-circuit during query so every
    /// leaf's full k-mer count is available (spec.md §4.5's "Counted
    /// mode").
    pub counted_mode: bool,
    /// Deduplicate a query's hash positions before traversal (spec.md
    /// §4.5 step 1, "Optionally deduplicate").
    pub dedupe_query_positions: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compressor: Compressor::Rrr,
            rrr: RrrParams::default(),
            simplify: true,
            cluster_window: None,
            default_cluster_window_width: 100_000,
            culling: CullingThreshold::default(),
            counted_mode: false,
            dedupe_query_positions: false,
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_compressor(mut self, compressor: Compressor) -> Self {
        self.compressor = compressor;
        self
    }

    #[must_use]
    pub fn with_rrr(mut self, block_size: u16, rank_period: u8) -> Self {
        self.rrr = RrrParams {
            block_size,
            rank_period,
        };
        self
    }

    #[must_use]
    pub fn with_simplify(mut self, simplify: bool) -> Self {
        self.simplify = simplify;
        self
    }

    #[must_use]
    pub fn with_culling(mut self, culling: CullingThreshold) -> Self {
        self.culling = culling;
        self
    }

    #[must_use]
    pub fn with_counted_mode(mut self, counted_mode: bool) -> Self {
        self.counted_mode = counted_mode;
        self
    }

    /// Resolves the effective clustering window against a filter
    /// length, honoring the default width cap (spec.md §4.4).
    #[must_use]
    pub fn resolved_cluster_window(&self, num_bits: u64) -> (u64, u64) {
        match self.cluster_window {
            Some((start, end)) => (start.min(num_bits), end.min(num_bits)),
            None => (0, num_bits.min(self.default_cluster_window_width)),
        }
    }
}
