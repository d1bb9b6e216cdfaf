//! Scratch build trees.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

/// A temporary directory standing in for a built Kbuild tree.
pub struct BuildTree {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl BuildTree {
    /// Create an empty tree.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let canonical = dir.path().canonicalize().expect("canonical temp dir");
        let root = Utf8PathBuf::from_path_buf(canonical).expect("utf8 temp dir");
        Self { _dir: dir, root }
    }

    /// Absolute root of the tree.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Write `content` to `rel`, creating parent directories.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write(&self, rel: &str, content: impl AsRef<[u8]>) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, content).expect("write file");
    }

    /// Create each of `rels` as an empty file.
    pub fn touch_all(&self, rels: &[&str]) {
        for rel in rels {
            self.write(rel, "");
        }
    }

    /// Remove `rel` from the tree.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be removed.
    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.root.join(rel)).expect("remove file");
    }

    /// Read `rel` as bytes.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be read.
    #[must_use]
    pub fn read(&self, rel: &str) -> Vec<u8> {
        fs::read(self.root.join(rel)).expect("read file")
    }

    /// Read `rel` as UTF-8 text.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be read or is not UTF-8.
    #[must_use]
    pub fn read_string(&self, rel: &str) -> String {
        String::from_utf8(self.read(rel)).expect("utf8 file")
    }

    /// Whether `rel` exists in the tree.
    #[must_use]
    pub fn exists(&self, rel: &str) -> bool {
        self.root.join(rel).exists()
    }
}

impl Default for BuildTree {
    fn default() -> Self {
        Self::new()
    }
}
