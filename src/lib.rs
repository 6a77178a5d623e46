//! docstore - per-user quota-enforced file storage
//!
//! Maps user file operations (list, upload, download, delete, move, mkdir)
//! onto a sandboxed on-disk tree laid out as `<storage_root>/user_<id>/...`.

pub mod config;
pub mod error;
pub mod manager;
pub mod navigate;
pub mod service;
pub mod storage;
pub mod user;
pub mod utils;

pub use config::{QuotaLimits, StorageConfig};
pub use error::{ErrorKind, QuotaScope, Result, StorageError};
pub use manager::StorageManager;
pub use service::StorageService;
pub use user::UserId;
