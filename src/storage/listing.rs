//! Directory listing
//!
//! Lists the immediate children of a user directory. Directories report
//! the recursive size of their contents. Order is part of the contract:
//! directories first, then case-insensitive name.

use log::{info, warn};
use std::cmp::Ordering;
use std::fs;

use crate::error::Result;
use crate::navigate::PathResolver;
use crate::storage::filesystem::{created_at, modified_at, tree_usage};
use crate::storage::results::{Entry, EntryKind, FileRecord, Listing};
use crate::user::UserId;

/// Produces directory listings for a user's tree.
#[derive(Debug, Clone)]
pub struct EntryLister {
    resolver: PathResolver,
}

impl EntryLister {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Lists the directory at `relative_path`, creating it if it is missing.
    pub fn list(&self, user: UserId, relative_path: &str) -> Result<Listing> {
        let dir = self.resolver.resolve(user, relative_path)?;
        let mut entries = Vec::new();

        for item in fs::read_dir(&dir.real_path)? {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", dir.real_path.display(), e);
                    continue;
                }
            };
            let metadata = match item.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Skipping {}: {}", item.path().display(), e);
                    continue;
                }
            };

            // Symlinks are never created through this API; they are not listed.
            let (kind, size) = if metadata.is_dir() {
                (EntryKind::Directory, tree_usage(&item.path()).bytes)
            } else if metadata.is_file() {
                (EntryKind::File, metadata.len())
            } else {
                continue;
            };

            let name = item.file_name().to_string_lossy().to_string();
            entries.push(Entry {
                kind,
                path: dir.child_relative(&name),
                name,
                size,
                modified_at: modified_at(&metadata),
            });
        }

        entries.sort_by(compare_entries);

        info!(
            "Listed directory {:?} for user {} - {} entries",
            dir.relative_path,
            user,
            entries.len()
        );

        Ok(Listing {
            path: dir.relative_path,
            count: entries.len(),
            entries,
        })
    }

    /// Files stored directly in the user root, newest first.
    pub fn recent_files(&self, user: UserId) -> Result<Vec<FileRecord>> {
        let user_root = self.resolver.user_root(user)?;
        let mut files = Vec::new();

        for item in fs::read_dir(&user_root)?.flatten() {
            let Ok(metadata) = item.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            files.push(FileRecord {
                filename: item.file_name().to_string_lossy().to_string(),
                size: metadata.len(),
                created_at: created_at(&metadata),
                modified_at: modified_at(&metadata),
            });
        }

        files.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(files)
    }
}

/// Directories before files, then case-insensitive name, then exact name
/// so the order is total.
pub(crate) fn compare_entries(a: &Entry, b: &Entry) -> Ordering {
    a.kind
        .cmp(&b.kind)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}
