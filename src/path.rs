// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::path::{Path, PathBuf};

/// Resolves `path` to an absolute path without requiring the path to exist
/// (plain `fs::canonicalize` does).
#[allow(clippy::module_name_repetitions)]
pub fn absolute_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        // NOTE: not much we can do if the current directory is gone
        #[allow(clippy::expect_used)]
        std::env::current_dir()
            .expect("should have a current directory")
            .join(path)
    }
}

/// Resolves `node_filename` relative to the directory containing the
/// topology file it was read from (spec.md §4.6: "the base directory of the
/// topology file is prepended to any node filename lacking a path
/// component").
#[must_use]
pub fn resolve_relative_to(base_dir: &Path, node_filename: &str) -> PathBuf {
    let candidate = Path::new(node_filename);
    if candidate.is_absolute() || candidate.parent().is_some_and(|p| !p.as_os_str().is_empty()) {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn resolves_bare_filename_against_base_dir() {
        let base = Path::new("/data/trees");
        assert_eq!(
            resolve_relative_to(base, "leaf1.bf"),
            PathBuf::from("/data/trees/leaf1.bf")
        );
    }

    #[test]
    fn leaves_path_with_components_untouched() {
        let base = Path::new("/data/trees");
        assert_eq!(
            resolve_relative_to(base, "../leaves/leaf1.bf"),
            PathBuf::from("../leaves/leaf1.bf")
        );
    }

    #[test]
    fn leaves_absolute_path_untouched() {
        let base = Path::new("/data/trees");
        assert_eq!(
            resolve_relative_to(base, "/abs/leaf1.bf"),
            PathBuf::from("/abs/leaf1.bf")
        );
    }
}
