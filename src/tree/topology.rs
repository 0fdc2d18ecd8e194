// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Parsing and emitting the depth-marked topology text file (spec.md
//! §4.6). Grounded on the original source's `BloomTree::read_topology`
//! convention (leading `*` depth markers, `name[file]` lines) as
//! described by spec.md; rewritten here as a small explicit-stack
//! parser rather than the recursive-descent the original uses.

use super::node::Node;
use crate::error::{Error, Result};
use crate::path::resolve_relative_to;
use rustc_hash::FxHashSet;
use std::path::Path;

fn parse_line(line: &str) -> (usize, &str) {
    let depth = line.chars().take_while(|&c| c == '*').count();
    (depth, line[depth..].trim())
}

/// Splits a topology line's payload into `(name, filename)`. The
/// `name[filename]` form names the node explicitly; a bare filename is
/// also used as the node's name (spec.md §4.6).
fn parse_name_and_file(payload: &str) -> (String, String) {
    if let Some(open) = payload.find('[') {
        if let Some(close) = payload.rfind(']') {
            if close > open {
                let name = payload[..open].trim().to_string();
                let filename = payload[open + 1..close].trim().to_string();
                return (name, filename);
            }
        }
    }
    (payload.to_string(), payload.to_string())
}

/// Parses a topology file's text into its (possibly collapsed) root
/// node. `base_dir` is prepended to any node filename lacking a path
/// component (spec.md §4.6).
pub fn parse_topology(text: &str, base_dir: &Path) -> Result<Node> {
    // Explicit stack of (depth, node-under-construction); a line whose
    // depth doesn't exceed the stack top's pops entries back up to
    // their parent, attaching each popped node as a child.
    let mut stack: Vec<(usize, Node)> = Vec::new();
    let mut forest_roots: Vec<Node> = Vec::new();
    let mut prev_depth: Option<usize> = None;

    fn pop_to_depth(stack: &mut Vec<(usize, Node)>, forest_roots: &mut Vec<Node>, depth: usize) {
        while let Some((top_depth, _)) = stack.last() {
            if *top_depth < depth {
                break;
            }
            let (_, finished) = stack.pop().expect("just peeked");
            match stack.last_mut() {
                Some((_, parent)) => parent.children.push(finished),
                None => forest_roots.push(finished),
            }
        }
    }

    for raw_line in text.lines() {
        if raw_line.trim().is_empty() {
            continue;
        }
        let (depth, payload) = parse_line(raw_line);
        if payload.is_empty() {
            continue;
        }
        if let Some(prev) = prev_depth {
            if depth > prev + 1 {
                return Err(Error::Structure(format!(
                    "topology depth jumped from {prev} to {depth} (may only increase by 1)"
                )));
            }
        } else if depth != 0 {
            return Err(Error::Structure(format!(
                "topology must start at depth 0, found depth {depth}"
            )));
        }
        prev_depth = Some(depth);

        pop_to_depth(&mut stack, &mut forest_roots, depth);

        let (name, filename) = parse_name_and_file(payload);
        let resolved = resolve_relative_to(base_dir, &filename);
        stack.push((depth, Node::new_leaf(name, resolved)));
    }
    pop_to_depth(&mut stack, &mut forest_roots, 0);

    if forest_roots.is_empty() {
        return Err(Error::Structure("topology file describes an empty tree".to_string()));
    }

    // Wrap in a dummy root unconditionally, then collapse a singleton
    // away (spec.md §4.3: "A root having exactly one child is
    // collapsed: the child becomes the new root").
    let mut root = Node::new_dummy_root(forest_roots);
    if root.children.len() == 1 {
        root = root.children.pop().expect("checked len == 1");
    }

    validate_structure(&root)?;
    Ok(root)
}

fn validate_structure(root: &Node) -> Result<()> {
    let mut seen_names = FxHashSet::default();
    validate_node(root, true, &mut seen_names)
}

fn validate_node<'a>(node: &'a Node, is_root: bool, seen_names: &mut FxHashSet<&'a str>) -> Result<()> {
    if !node.is_leaf() && node.children.len() == 1 && !is_root {
        return Err(Error::Structure(format!(
            "node '{}' has exactly one child, which is not allowed",
            node.name
        )));
    }
    if !node.is_dummy && !seen_names.insert(node.name.as_str()) {
        return Err(Error::Structure(format!("duplicate node name '{}'", node.name)));
    }
    for child in &node.children {
        validate_node(child, false, seen_names)?;
    }
    Ok(())
}

/// Emits a topology text for the subtree rooted at `root`, skipping
/// the dummy root itself if present (depth markers restart at 0 for
/// its children in that case).
#[must_use]
pub fn emit_topology(root: &Node) -> String {
    let mut out = String::new();
    fn emit(node: &Node, depth: usize, out: &mut String) {
        if !node.is_dummy {
            for _ in 0..depth {
                out.push('*');
            }
            out.push_str(&node.name);
            out.push('[');
            out.push_str(&node.filename.to_string_lossy());
            out.push(']');
            out.push('\n');
        }
        let child_depth = if node.is_dummy { depth } else { depth + 1 };
        for child in &node.children {
            emit(child, child_depth, out);
        }
    }
    emit(root, 0, &mut out);
    out
}
