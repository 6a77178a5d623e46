//! File system helpers
//!
//! Tree walking and metadata conversion shared by quota accounting and
//! directory listing. Walks never follow symlinks and tolerate entries that
//! disappear while they run.

use chrono::{DateTime, Local};
use log::warn;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Totals gathered by walking a subtree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeUsage {
    pub bytes: u64,
    pub files: u64,
}

/// Sums the sizes of all regular files below `root` and counts them.
///
/// A missing root yields zero usage. Unreadable entries are logged and
/// skipped, so the result is a best-effort snapshot of a tree that may be
/// changing underneath.
pub fn tree_usage(root: &Path) -> TreeUsage {
    let mut usage = TreeUsage::default();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!("Skipping unreadable directory {}: {}", dir.display(), e);
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };

            // DirEntry::metadata does not traverse symlinks
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            if metadata.is_dir() {
                pending.push(entry.path());
            } else if metadata.is_file() {
                usage.bytes = usage.bytes.saturating_add(metadata.len());
                usage.files += 1;
            }
        }
    }

    usage
}

/// Modification time of `metadata`, falling back to the Unix epoch.
pub fn modified_at(metadata: &Metadata) -> DateTime<Local> {
    to_local(metadata.modified().ok())
}

/// Creation time of `metadata`, falling back to the modification time where
/// the platform does not record it.
pub fn created_at(metadata: &Metadata) -> DateTime<Local> {
    to_local(metadata.created().or_else(|_| metadata.modified()).ok())
}

fn to_local(time: Option<SystemTime>) -> DateTime<Local> {
    DateTime::<Local>::from(time.unwrap_or(UNIX_EPOCH))
}

/// Check if a regular file exists at `path` (symlinks are not followed)
pub fn file_exists(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Check if anything at all exists at `path`, including dangling symlinks
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tree_usage_missing_root_is_zero() {
        let temp_dir = TempDir::new().unwrap();
        let usage = tree_usage(&temp_dir.path().join("nope"));
        assert_eq!(usage, TreeUsage::default());
    }

    #[test]
    fn test_tree_usage_counts_nested_files_only() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("top.txt"), vec![0u8; 10]).unwrap();
        fs::write(root.join("a/one.bin"), vec![0u8; 100]).unwrap();
        fs::write(root.join("a/b/c/deep.bin"), vec![0u8; 1000]).unwrap();

        let usage = tree_usage(root);

        assert_eq!(usage.bytes, 1110);
        assert_eq!(usage.files, 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_tree_usage_does_not_follow_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let outside = temp_dir.path().join("outside");
        let root = temp_dir.path().join("root");
        fs::create_dir_all(&outside).unwrap();
        fs::create_dir_all(&root).unwrap();
        fs::write(outside.join("big.bin"), vec![0u8; 4096]).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();
        std::os::unix::fs::symlink(&root, root.join("loop")).unwrap();

        let usage = tree_usage(&root);

        assert_eq!(usage, TreeUsage::default());
    }

    #[test]
    fn test_exists_helpers() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("f.txt");
        fs::write(&file, b"x").unwrap();

        assert!(file_exists(&file));
        assert!(!file_exists(temp_dir.path()));
        assert!(entry_exists(temp_dir.path()));
        assert!(!entry_exists(&temp_dir.path().join("missing")));
    }
}
