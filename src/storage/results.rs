//! Storage result types
//!
//! Defines result structures returned by storage operations. All of them
//! are computed per request and never persisted.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::File;

/// Kind of a listed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum EntryKind {
    #[serde(rename = "dir")]
    Directory,
    #[serde(rename = "file")]
    File,
}

/// A file or directory inside a user's tree
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub name: String,
    /// Path relative to the user root
    pub path: String,
    /// File size, or the recursive size of everything below a directory
    pub size: u64,
    pub modified_at: DateTime<Local>,
}

impl Entry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Result of a directory listing operation
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub path: String,
    pub entries: Vec<Entry>,
    pub count: usize,
}

/// Usage figures for one quota scope
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuotaSnapshot {
    pub used: u64,
    pub max: u64,
    pub available: u64,
    pub percentage: f64,
    pub files_count: u64,
}

/// User and global usage reported together
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StorageInfo {
    pub user: QuotaSnapshot,
    pub global: QuotaSnapshot,
}

/// Result of a file storage operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    /// Composite on-disk name
    pub filename: String,
    /// Name as supplied by the uploader
    pub original_filename: String,
    pub size: u64,
    /// Path relative to the storage root
    pub path: String,
}

/// Result of a move operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovedFile {
    pub filename: String,
    /// New location relative to the user root
    pub path: String,
}

/// A file directly in the user root, as reported by the flat file list
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub filename: String,
    pub size: u64,
    pub created_at: DateTime<Local>,
    pub modified_at: DateTime<Local>,
}

/// An opened stored file ready to be streamed to a client
#[derive(Debug)]
pub struct Download {
    pub file: File,
    pub size: u64,
    /// Suggested name for the client, recovered from the composite name
    pub display_name: String,
}
