//! Result types for navigate operations

use std::path::PathBuf;

/// A directory resolved inside a user's sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDir {
    /// Normalized path relative to the user root, `/`-separated, empty for the root itself
    pub relative_path: String,
    /// Canonical absolute path on disk
    pub real_path: PathBuf,
}

impl ResolvedDir {
    /// Joins `name` onto the relative path of this directory.
    pub fn child_relative(&self, name: &str) -> String {
        if self.relative_path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.relative_path, name)
        }
    }
}
