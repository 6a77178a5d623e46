//! Async storage service
//!
//! Wraps a [`StorageManager`] for async routing layers. Each call runs the
//! blocking filesystem work on tokio's blocking pool so request handlers
//! never stall the runtime.

use std::io::{self, Read, Seek};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Result, StorageError};
use crate::manager::StorageManager;
use crate::storage::{FileRecord, Listing, MovedFile, QuotaSnapshot, StorageInfo, StoredFile};
use crate::user::UserId;

/// Cloneable async handle over a shared [`StorageManager`].
#[derive(Debug, Clone)]
pub struct StorageService {
    manager: Arc<StorageManager>,
}

impl StorageService {
    pub fn new(manager: StorageManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }

    async fn run<T, F>(&self, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&StorageManager) -> Result<T> + Send + 'static,
    {
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || task(&manager))
            .await
            .map_err(|e| StorageError::Io(io::Error::other(e)))?
    }

    pub async fn initialize(&self, users: Vec<UserId>) -> Result<usize> {
        self.run(move |m| m.initialize(users)).await
    }

    pub async fn list(&self, user: UserId, relative_path: &str) -> Result<Listing> {
        let relative_path = relative_path.to_string();
        self.run(move |m| m.list(user, &relative_path)).await
    }

    pub async fn list_user_files(&self, user: UserId) -> Result<Vec<FileRecord>> {
        self.run(move |m| m.list_user_files(user)).await
    }

    pub async fn storage_info(&self, user: UserId) -> Result<StorageInfo> {
        self.run(move |m| Ok(m.storage_info(user))).await
    }

    pub async fn global_usage(&self) -> Result<QuotaSnapshot> {
        self.run(|m| Ok(m.global_usage())).await
    }

    pub async fn upload<R>(
        &self,
        user: UserId,
        reader: R,
        original_name: &str,
        size_hint: Option<u64>,
    ) -> Result<StoredFile>
    where
        R: Read + Seek + Send + 'static,
    {
        let original_name = original_name.to_string();
        self.run(move |m| m.upload(user, reader, &original_name, size_hint))
            .await
    }

    pub async fn read(&self, user: UserId, stored_name: &str) -> Result<Vec<u8>> {
        let stored_name = stored_name.to_string();
        self.run(move |m| m.read(user, &stored_name)).await
    }

    pub async fn delete(&self, user: UserId, stored_name: &str) -> Result<()> {
        let stored_name = stored_name.to_string();
        self.run(move |m| m.delete(user, &stored_name)).await
    }

    pub async fn move_file(
        &self,
        user: UserId,
        stored_name: &str,
        target_relative_path: &str,
    ) -> Result<MovedFile> {
        let stored_name = stored_name.to_string();
        let target = target_relative_path.to_string();
        self.run(move |m| m.move_file(user, &stored_name, &target))
            .await
    }

    pub async fn create_empty(
        &self,
        user: UserId,
        name: &str,
        relative_path: &str,
    ) -> Result<String> {
        let name = name.to_string();
        let relative_path = relative_path.to_string();
        self.run(move |m| m.create_empty(user, &name, &relative_path))
            .await
    }

    pub async fn mkdir(&self, user: UserId, name: &str, relative_path: &str) -> Result<String> {
        let name = name.to_string();
        let relative_path = relative_path.to_string();
        self.run(move |m| m.mkdir(user, &name, &relative_path)).await
    }

    pub async fn get_path(&self, user: UserId, stored_name: &str) -> Result<PathBuf> {
        let stored_name = stored_name.to_string();
        self.run(move |m| m.get_path(user, &stored_name)).await
    }
}
