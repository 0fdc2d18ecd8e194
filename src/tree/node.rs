// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The tree node (spec.md §3's "Tree node"): either a dummy root
//! carrying no filter, or a real node owning exactly one Bloom filter.
//! A node owns its children outright (spec.md §9: "A node owns its
//! children (destruction cascades)"), so this is a plain recursive
//! struct rather than anything reference-counted.

use crate::bloom::BloomFilter;
use std::path::PathBuf;

/// One node of the tree. `filter` is resident only while loaded
/// (spec.md §3's node lifecycle: "preload only, no bit data resident"
/// until build/query time loads it).
#[derive(Debug)]
pub struct Node {
    pub name: String,
    pub filename: PathBuf,
    pub children: Vec<Node>,
    /// `true` for the implicit forest root that carries no filter
    /// (spec.md §3). A dummy root is never returned to callers once a
    /// singleton forest has been collapsed away (spec.md §4.3).
    pub is_dummy: bool,
    pub filter: Option<BloomFilter>,
}

impl Node {
    #[must_use]
    pub fn new_leaf(name: String, filename: PathBuf) -> Self {
        Self {
            name,
            filename,
            children: Vec::new(),
            is_dummy: false,
            filter: None,
        }
    }

    #[must_use]
    pub fn new_dummy_root(children: Vec<Node>) -> Self {
        Self {
            name: String::new(),
            filename: PathBuf::new(),
            children,
            is_dummy: true,
            filter: None,
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Discards this node's resident filter, releasing its bit-vector
    /// buffers (spec.md §3: "marked unloadable (memory discarded; the
    /// file remains the source of truth)").
    pub fn unload(&mut self) {
        self.filter = None;
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.filter.is_some()
    }

    /// Visits every node of the subtree rooted at `self`, pre-order.
    pub fn walk_preorder<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in &self.children {
            child.walk_preorder(visit);
        }
    }

    /// Visits every node of the subtree rooted at `self`, post-order
    /// (children before parent) — the order construction (spec.md
    /// §4.3) and culling (spec.md §4.4) both traverse in.
    pub fn walk_postorder_mut(&mut self, visit: &mut impl FnMut(&mut Node)) {
        for child in &mut self.children {
            child.walk_postorder_mut(visit);
        }
        visit(self);
    }

    /// Collects the names of every leaf in the subtree rooted at
    /// `self`, in left-to-right order (used by query to record matches
    /// for a subtree that passed as a whole, spec.md §4.5).
    pub fn leaf_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk_preorder(&mut |n| {
            if n.is_leaf() {
                out.push(n.name.as_str());
            }
        });
        out
    }
}
