//! Storage manager
//!
//! The facade the routing layer talks to. It owns the storage root and
//! composes path resolution, quota accounting, listing and the mutating
//! file operations. Every call is independent and blocking.

use log::info;
use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{QuotaLimits, StorageConfig};
use crate::error::{Result, StorageError};
use crate::navigate::PathResolver;
use crate::storage::locks::UserLocks;
use crate::storage::naming::original_name;
use crate::storage::{
    Download, EntryLister, FileRecord, FileStore, Listing, MovedFile, QuotaAccountant,
    QuotaSnapshot, StorageInfo, StoredFile,
};
use crate::user::UserId;

/// Per-user quota-enforced file storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct StorageManager {
    resolver: PathResolver,
    quota: QuotaAccountant,
    lister: EntryLister,
    store: FileStore,
}

impl StorageManager {
    /// Opens (and creates if needed) the storage root with per-user write
    /// serialization enabled.
    pub fn open(storage_root: impl AsRef<Path>, limits: QuotaLimits) -> Result<Self> {
        Self::with_locking(storage_root, limits, true)
    }

    /// Builds a manager from loaded configuration.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::with_locking(
            config.storage_root_path(),
            config.limits(),
            config.serialize_user_writes,
        )
    }

    /// Opens the storage root; with `serialize_user_writes == false` uploads
    /// from one user may race the quota check.
    pub fn with_locking(
        storage_root: impl AsRef<Path>,
        limits: QuotaLimits,
        serialize_user_writes: bool,
    ) -> Result<Self> {
        let resolver = PathResolver::new(storage_root)?;
        let quota = QuotaAccountant::new(resolver.clone(), limits);
        let lister = EntryLister::new(resolver.clone());
        let locks = Arc::new(UserLocks::new(serialize_user_writes));

        info!(
            "Storage root: {} (global {} bytes, per user {} bytes, per file {} bytes, per-user write lock {})",
            resolver.storage_root().display(),
            limits.max_total_bytes,
            limits.max_user_bytes,
            limits.max_file_bytes,
            if locks.is_enabled() { "on" } else { "off" }
        );

        let store = FileStore::new(resolver.clone(), quota.clone(), locks);

        Ok(Self {
            resolver,
            quota,
            lister,
            store,
        })
    }

    pub fn storage_root(&self) -> &Path {
        self.resolver.storage_root()
    }

    pub fn limits(&self) -> QuotaLimits {
        self.quota.limits()
    }

    /// Reserves a directory for every known user and clears uploads a
    /// previous process left half-written. Returns how many user
    /// directories were new. Run it before serving requests.
    pub fn initialize<I>(&self, users: I) -> Result<usize>
    where
        I: IntoIterator<Item = UserId>,
    {
        self.store.purge_staged_uploads()?;

        let mut created = 0;
        for user in users {
            if !self.resolver.user_root_path(user).exists() {
                self.resolver.user_root(user)?;
                created += 1;
            }
        }
        if created > 0 {
            info!("Reserved {} user directories", created);
        }
        Ok(created)
    }

    pub fn list(&self, user: UserId, relative_path: &str) -> Result<Listing> {
        self.lister.list(user, relative_path)
    }

    /// Files directly in the user root, newest first.
    pub fn list_user_files(&self, user: UserId) -> Result<Vec<FileRecord>> {
        self.lister.recent_files(user)
    }

    pub fn global_usage(&self) -> QuotaSnapshot {
        self.quota.global_usage()
    }

    pub fn user_usage(&self, user: UserId) -> QuotaSnapshot {
        self.quota.user_usage(user)
    }

    pub fn storage_info(&self, user: UserId) -> StorageInfo {
        StorageInfo {
            user: self.quota.user_usage(user),
            global: self.quota.global_usage(),
        }
    }

    pub fn has_space_available(&self, file_size: u64, user: Option<UserId>) -> bool {
        self.quota.has_space_available(file_size, user)
    }

    pub fn upload<R: Read + Seek>(
        &self,
        user: UserId,
        reader: R,
        original_name: &str,
        size_hint: Option<u64>,
    ) -> Result<StoredFile> {
        self.store.save(user, reader, original_name, size_hint)
    }

    /// Opens a stored file for streaming back to its owner.
    pub fn download(&self, user: UserId, stored_name: &str) -> Result<Download> {
        let file_path = self.store.get_path(user, stored_name)?;
        let file = File::open(&file_path).map_err(|e| StorageError::from_io(stored_name, e))?;
        let size = file.metadata()?.len();

        Ok(Download {
            file,
            size,
            display_name: original_name(stored_name).to_string(),
        })
    }

    /// Reads a whole stored file into memory.
    pub fn read(&self, user: UserId, stored_name: &str) -> Result<Vec<u8>> {
        let mut download = self.download(user, stored_name)?;
        let mut content = Vec::with_capacity(download.size as usize);
        download.file.read_to_end(&mut content)?;
        Ok(content)
    }

    pub fn delete(&self, user: UserId, stored_name: &str) -> Result<()> {
        self.store.delete(user, stored_name)
    }

    pub fn move_file(
        &self,
        user: UserId,
        stored_name: &str,
        target_relative_path: &str,
    ) -> Result<MovedFile> {
        self.store.move_file(user, stored_name, target_relative_path)
    }

    pub fn create_empty(&self, user: UserId, name: &str, relative_path: &str) -> Result<String> {
        self.store.create_empty(user, name, relative_path)
    }

    pub fn mkdir(&self, user: UserId, name: &str, relative_path: &str) -> Result<String> {
        self.store.create_directory(user, name, relative_path)
    }

    pub fn get_path(&self, user: UserId, stored_name: &str) -> Result<PathBuf> {
        self.store.get_path(user, stored_name)
    }

    /// Size of a stored file, without opening it.
    pub fn file_size(&self, user: UserId, stored_name: &str) -> Result<u64> {
        let file_path = self.store.get_path(user, stored_name)?;
        fs::metadata(&file_path)
            .map(|m| m.len())
            .map_err(|e| StorageError::from_io(stored_name, e))
    }
}
