// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Tree topology, node lifecycle, and container-file I/O glue (spec.md
//! §3's "Tree node", §4.6's topology file, §3's "File manager").

pub mod io;
pub mod node;
pub mod topology;

pub use node::Node;

use crate::container::file_manager::FileManager;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// A parsed, not-yet-materialized tree: its topology plus the shared
/// file-open cache every load/save goes through (spec.md §3, §5).
pub struct Tree {
    pub root: Node,
    pub base_dir: PathBuf,
    pub file_manager: FileManager,
}

impl Tree {
    /// Reads a topology file from `path` and registers every node's
    /// filename with a fresh file manager (spec.md §4.6, §3).
    pub fn load_topology(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let base_dir = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let root = topology::parse_topology(&text, &base_dir)?;

        let mut file_manager = FileManager::new();
        root.walk_preorder(&mut |n| {
            if !n.is_dummy {
                file_manager.register_node(&n.filename, &n.name);
            }
        });

        Ok(Self {
            root,
            base_dir,
            file_manager,
        })
    }

    /// Writes this tree's topology back out (spec.md §4.6).
    pub fn save_topology(&self, path: &Path) -> Result<()> {
        let text = topology::emit_topology(&self.root);
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn load_topology_registers_every_node() {
        let dir = tempfile::tempdir().unwrap();
        let topo_path = dir.path().join("tree.sbt");
        std::fs::write(&topo_path, "root.bf\n*leafA.bf\n*leafB.bf\n").unwrap();

        let tree = Tree::load_topology(&topo_path).unwrap();
        assert_eq!(tree.root.children.len(), 2);
        assert!(tree.file_manager.names_in_file(&dir.path().join("leafA.bf")).contains(&"leafA.bf".to_string()));
    }
}
