use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Create a temporary source tree from (relative path, content) pairs.
/// The caller must hold onto `TempDir` to keep the directory alive.
pub fn setup_repo(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (rel, content) in files {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    dir
}

/// Write a cover profile next to the repo and return its path.
pub fn write_profile(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
