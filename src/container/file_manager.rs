// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Process-wide shared-file bookkeeping (spec.md §3's "File manager",
//! §5's "one open file" cache). Grounded on `FileManager` in the
//! original source's `file_manager.h`/`.cc`, adapted away from that
//! class's raw node pointers (`nameToNode`) into plain name bookkeeping
//! — this crate's tree owns its nodes outright (spec.md §9's "Ownership
//! of bits" note), so the manager only needs to know which node names
//! share which file, not hold onto the nodes themselves.

use crate::error::Result;
use crate::fs::{FileSystem, StdFileSystem};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Tracks, for every container file touched so far, which node names'
/// filters live inside it (spec.md §3: "a process-wide map from
/// filename to list of node names that share that file").
#[derive(Debug, Default)]
pub struct FileManager {
    filename_to_names: FxHashMap<PathBuf, Vec<String>>,
    /// The one file currently held open, if any (spec.md §5: "the file
    /// manager caches at most one open file; any request for a
    /// different file closes the previous").
    open: Option<(PathBuf, File)>,
}

impl FileManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers that `node_name`'s filter lives in `filename`
    /// (multiple nodes may share one container file, spec.md §4.6).
    pub fn register_node(&mut self, filename: &Path, node_name: &str) {
        self.filename_to_names
            .entry(filename.to_path_buf())
            .or_default()
            .push(node_name.to_string());
    }

    /// Node names known to share `filename`, in registration order.
    #[must_use]
    pub fn names_in_file(&self, filename: &Path) -> &[String] {
        self.filename_to_names
            .get(filename)
            .map_or(&[], Vec::as_slice)
    }

    /// Returns a reader positioned at the start of `filename`, closing
    /// whichever different file was previously cached open.
    pub fn open_for_read(&mut self, filename: &Path) -> Result<&mut File> {
        let needs_open = match &self.open {
            Some((cached, _)) => cached != filename,
            None => true,
        };
        if needs_open {
            self.open = Some((filename.to_path_buf(), StdFileSystem::open(filename)?));
        }
        let (_, file) = self.open.as_mut().expect("just inserted");
        Ok(file)
    }

    /// Drops the cached open file, if any (spec.md §5: lifetime is
    /// "initialize on first use, close on program end or explicit
    /// shutdown").
    pub fn close(&mut self) {
        self.open = None;
    }

    #[must_use]
    pub fn is_open(&self, filename: &Path) -> bool {
        self.open.as_ref().is_some_and(|(cached, _)| cached == filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use test_log::test;

    #[test]
    fn registers_multiple_names_per_file() {
        let mut mgr = FileManager::new();
        let path = Path::new("shared.bf");
        mgr.register_node(path, "nodeA");
        mgr.register_node(path, "nodeB");
        assert_eq!(mgr.names_in_file(path), ["nodeA", "nodeB"]);
    }

    #[test]
    fn opening_a_different_file_closes_the_previous() {
        let dir = tempdir().unwrap();
        let path_a = dir.path().join("a.bf");
        let path_b = dir.path().join("b.bf");
        File::create(&path_a).unwrap().write_all(b"a").unwrap();
        File::create(&path_b).unwrap().write_all(b"b").unwrap();

        let mut mgr = FileManager::new();
        mgr.open_for_read(&path_a).unwrap();
        assert!(mgr.is_open(&path_a));
        mgr.open_for_read(&path_b).unwrap();
        assert!(mgr.is_open(&path_b));
        assert!(!mgr.is_open(&path_a));
    }
}
