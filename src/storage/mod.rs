//! File system storage management
//!
//! Handles quota accounting, listings, stored-file naming and the mutating
//! file operations on user trees.

pub mod filesystem;
pub mod listing;
pub mod locks;
pub mod naming;
pub mod operations;
pub mod quota;
pub mod results;

// Re-export commonly used types
pub use listing::EntryLister;
pub use locks::UserLocks;
pub use naming::{original_name, sanitize_filename, stored_name};
pub use operations::FileStore;
pub use quota::QuotaAccountant;
pub use results::{
    Download, Entry, EntryKind, FileRecord, Listing, MovedFile, QuotaSnapshot, StorageInfo,
    StoredFile,
};
