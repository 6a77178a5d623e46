//! Storage operations
//!
//! Mutating file operations for user trees: save, delete, move, create an
//! empty file, create a directory, and direct stored-name lookup.
//!
//! Uploads are measured and checked against the per-file limit and both
//! quotas before a single byte reaches the user directory. The bytes are
//! then written to a temporary file in the staging directory and persisted
//! into the user root with a rename that never overwrites. An in-flight
//! upload is never visible in, or deletable from, the user's tree.

use chrono::Local;
use log::{debug, error, info, warn};
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{QuotaScope, Result, StorageError};
use crate::navigate::PathResolver;
use crate::storage::filesystem::{entry_exists, file_exists};
use crate::storage::locks::UserLocks;
use crate::storage::naming::{FALLBACK_NAME, sanitize_filename, stored_name};
use crate::storage::quota::QuotaAccountant;
use crate::storage::results::{MovedFile, StoredFile};
use crate::user::UserId;

const UPLOAD_PREFIX: &str = ".upload-";

/// Performs the mutating operations on user trees.
#[derive(Debug, Clone)]
pub struct FileStore {
    resolver: PathResolver,
    quota: QuotaAccountant,
    locks: Arc<UserLocks>,
}

impl FileStore {
    pub fn new(resolver: PathResolver, quota: QuotaAccountant, locks: Arc<UserLocks>) -> Self {
        Self {
            resolver,
            quota,
            locks,
        }
    }

    /// Stores the remaining bytes of `reader` in the user's root directory
    /// under a generated composite name.
    ///
    /// `size_hint` is the length the client declared, if any. A hint above
    /// the per-file limit is rejected without touching the stream; otherwise
    /// the measured length is authoritative.
    pub fn save<R: Read + Seek>(
        &self,
        user: UserId,
        mut reader: R,
        original_name: &str,
        size_hint: Option<u64>,
    ) -> Result<StoredFile> {
        let max_file_bytes = self.quota.limits().max_file_bytes;

        if let Some(hint) = size_hint {
            if hint > max_file_bytes {
                return Err(StorageError::FileTooLarge {
                    size: hint,
                    max: max_file_bytes,
                });
            }
        }

        let size = stream_len(&mut reader)?;
        if let Some(hint) = size_hint {
            if hint != size {
                warn!(
                    "Upload {:?} from user {} declared {} bytes but carries {}",
                    original_name, user, hint, size
                );
            }
        }

        if size > max_file_bytes {
            return Err(StorageError::FileTooLarge {
                size,
                max: max_file_bytes,
            });
        }

        self.locks
            .with_user(user, || self.save_checked(user, reader, original_name, size))
    }

    fn save_checked<R: Read>(
        &self,
        user: UserId,
        mut reader: R,
        original_name: &str,
        size: u64,
    ) -> Result<StoredFile> {
        let user_quota = self.quota.user_usage(user);
        if user_quota.available < size {
            return Err(StorageError::QuotaExceeded {
                scope: QuotaScope::User,
                requested: size,
                available: user_quota.available,
            });
        }

        let global_quota = self.quota.global_usage();
        if global_quota.available < size {
            return Err(StorageError::QuotaExceeded {
                scope: QuotaScope::Global,
                requested: size,
                available: global_quota.available,
            });
        }

        let mut sanitized = sanitize_filename(original_name);
        if sanitized.is_empty() {
            sanitized = FALLBACK_NAME.to_string();
        }
        let filename = stored_name(user, Local::now().naive_local(), &sanitized);

        let user_root = self.resolver.user_root(user)?;
        let file_path = user_root.join(&filename);
        if entry_exists(&file_path) {
            return Err(StorageError::Conflict(filename));
        }

        let mut temp_file = tempfile::Builder::new()
            .prefix(UPLOAD_PREFIX)
            .tempfile_in(self.resolver.staging_dir()?)?;

        let written = io::copy(&mut (&mut reader).take(size), temp_file.as_file_mut())
            .inspect_err(|e| error!("Failed to write upload {filename} for user {user}: {e}"))?;
        if written != size {
            error!("Upload {filename} for user {user} ended after {written} of {size} bytes");
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended after {written} of {size} bytes"),
            )));
        }
        temp_file.as_file().sync_all()?;

        temp_file.persist_noclobber(&file_path).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                StorageError::Conflict(filename.clone())
            } else {
                error!("Failed to persist upload {}: {}", file_path.display(), e.error);
                StorageError::Io(e.error)
            }
        })?;

        info!(
            "Stored file for user {}: {} ({} bytes)",
            user,
            file_path.display(),
            size
        );

        Ok(StoredFile {
            path: format!("{}/{}", user.dir_name(), filename),
            filename,
            original_filename: original_name.to_string(),
            size,
        })
    }

    /// Removes uploads left in the staging directory by a crashed process.
    /// Must run before uploads are accepted; an in-flight upload would lose
    /// its temporary file.
    pub fn purge_staged_uploads(&self) -> Result<usize> {
        let staging = self.resolver.staging_dir()?;
        let mut removed = 0;

        for item in fs::read_dir(&staging)?.flatten() {
            let name = item.file_name();
            if !name.to_string_lossy().starts_with(UPLOAD_PREFIX) {
                continue;
            }
            match fs::remove_file(item.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove stale upload {}: {}", item.path().display(), e),
            }
        }

        if removed > 0 {
            info!("Removed {} stale uploads from {}", removed, staging.display());
        }
        Ok(removed)
    }

    /// Deletes a stored file directly under the user root.
    pub fn delete(&self, user: UserId, stored_name: &str) -> Result<()> {
        self.locks.with_user(user, || {
            let file_path = self.resolver.user_entry(user, stored_name)?;
            if !file_exists(&file_path) {
                return Err(StorageError::NotFound(stored_name.to_string()));
            }

            fs::remove_file(&file_path).map_err(|e| {
                error!("Failed to delete {}: {}", file_path.display(), e);
                StorageError::from_io(stored_name, e)
            })?;

            info!("Deleted file for user {}: {}", user, file_path.display());
            Ok(())
        })
    }

    /// Moves a stored file from the user root into `target_relative_path`,
    /// creating the destination directory if needed.
    pub fn move_file(
        &self,
        user: UserId,
        stored_name: &str,
        target_relative_path: &str,
    ) -> Result<MovedFile> {
        self.locks.with_user(user, || {
            let source = self.resolver.user_entry(user, stored_name)?;
            if !file_exists(&source) {
                return Err(StorageError::NotFound(stored_name.to_string()));
            }

            let target = self.resolver.resolve(user, target_relative_path)?;
            let destination = target.real_path.join(stored_name);
            let relative = target.child_relative(stored_name);
            if entry_exists(&destination) {
                return Err(StorageError::Conflict(relative));
            }

            fs::rename(&source, &destination).map_err(|e| {
                error!(
                    "Failed to move {} to {}: {}",
                    source.display(),
                    destination.display(),
                    e
                );
                StorageError::from_io(stored_name, e)
            })?;

            info!("Moved file for user {}: {} -> {}", user, stored_name, relative);
            Ok(MovedFile {
                filename: stored_name.to_string(),
                path: relative,
            })
        })
    }

    /// Creates a zero-byte file named after the sanitized `name`. Returns
    /// the name it was created under.
    pub fn create_empty(&self, user: UserId, name: &str, relative_path: &str) -> Result<String> {
        self.locks.with_user(user, || {
            let dir = self.resolver.resolve(user, relative_path)?;
            let filename = sanitize_filename(name);
            if filename.is_empty() {
                return Err(StorageError::InvalidPath(name.to_string()));
            }

            let file_path = dir.real_path.join(&filename);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&file_path)
            {
                Ok(_) => {
                    info!("Created empty file for user {}: {}", user, file_path.display());
                    Ok(filename)
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    Err(StorageError::Conflict(dir.child_relative(&filename)))
                }
                Err(e) => Err(StorageError::Io(e)),
            }
        })
    }

    /// Creates the directory `name` below `relative_path`. Returns its path
    /// relative to the user root. Creating an existing directory succeeds.
    pub fn create_directory(&self, user: UserId, name: &str, relative_path: &str) -> Result<String> {
        let dirname = sanitize_filename(name);
        if dirname.is_empty() {
            return Err(StorageError::InvalidPath(name.to_string()));
        }

        let dir = self
            .resolver
            .resolve(user, &format!("{relative_path}/{dirname}"))?;

        debug!("Ensured directory for user {}: {}", user, dir.real_path.display());
        Ok(dir.relative_path)
    }

    /// Absolute path of a stored file directly under the user root.
    pub fn get_path(&self, user: UserId, stored_name: &str) -> Result<PathBuf> {
        let file_path = self.resolver.user_entry(user, stored_name)?;
        if file_exists(&file_path) {
            Ok(file_path)
        } else {
            Err(StorageError::NotFound(stored_name.to_string()))
        }
    }
}

/// Length of the unread part of `stream`; the position is restored.
fn stream_len<S: Seek>(stream: &mut S) -> io::Result<u64> {
    let start = stream.stream_position()?;
    let end = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(start))?;
    Ok(end.saturating_sub(start))
}
