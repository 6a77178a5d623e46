//! Configuration management for docstore
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `DOCSTORE_*` environment variables. The storage manager is always built
//! from an explicit `StorageConfig`; nothing reads configuration globally.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Default location of the configuration file (extension resolved by `config`).
pub const DEFAULT_CONFIG_PATH: &str = "docstore";

/// Storage configuration, read-only after startup.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Root directory holding every `user_<id>` directory.
    /// Environment: DOCSTORE_STORAGE_ROOT
    pub storage_root: String,

    /// Global quota in MB.
    /// Environment: DOCSTORE_MAX_STORAGE_SIZE_MB
    pub max_storage_size_mb: u64,

    /// Per-user quota in MB.
    /// Environment: DOCSTORE_MAX_USER_STORAGE_SIZE_MB
    pub max_user_storage_size_mb: u64,

    /// Largest single upload in MB.
    /// Environment: DOCSTORE_MAX_FILE_SIZE_MB
    pub max_file_size_mb: u64,

    /// Serialize save/delete/move per user directory.
    /// Environment: DOCSTORE_SERIALIZE_USER_WRITES
    pub serialize_user_writes: bool,
}

/// Byte-level limits enforced by the storage core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    pub max_total_bytes: u64,
    pub max_user_bytes: u64,
    pub max_file_bytes: u64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            max_total_bytes: 10 * 1024 * BYTES_PER_MB,
            max_user_bytes: 2 * 1024 * BYTES_PER_MB,
            max_file_bytes: 100 * BYTES_PER_MB,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let limits = QuotaLimits::default();
        Self {
            storage_root: "./storage".to_string(),
            max_storage_size_mb: limits.max_total_bytes / BYTES_PER_MB,
            max_user_storage_size_mb: limits.max_user_bytes / BYTES_PER_MB,
            max_file_size_mb: limits.max_file_bytes / BYTES_PER_MB,
            serialize_user_writes: true,
        }
    }
}

impl StorageConfig {
    /// Load configuration from `docstore.toml` (if present) with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from the given file (optional) with environment overrides
    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        let defaults = StorageConfig::default();
        let config_path = config_path.as_ref().to_string_lossy().to_string();

        let settings = Config::builder()
            .set_default("storage_root", defaults.storage_root)?
            .set_default("max_storage_size_mb", defaults.max_storage_size_mb as i64)?
            .set_default(
                "max_user_storage_size_mb",
                defaults.max_user_storage_size_mb as i64,
            )?
            .set_default("max_file_size_mb", defaults.max_file_size_mb as i64)?
            .set_default("serialize_user_writes", defaults.serialize_user_writes)?
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("DOCSTORE").try_parsing(true))
            .build()?;

        let config: StorageConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.storage_root.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "storage_root cannot be empty".into(),
            ));
        }

        if self.max_storage_size_mb == 0 {
            return Err(config::ConfigError::Message(
                "max_storage_size_mb must be greater than 0".into(),
            ));
        }

        if self.max_user_storage_size_mb == 0 {
            return Err(config::ConfigError::Message(
                "max_user_storage_size_mb must be greater than 0".into(),
            ));
        }

        if self.max_file_size_mb == 0 {
            return Err(config::ConfigError::Message(
                "max_file_size_mb must be greater than 0".into(),
            ));
        }

        if self.max_file_size_mb > self.max_user_storage_size_mb {
            return Err(config::ConfigError::Message(
                "max_file_size_mb cannot exceed max_user_storage_size_mb".into(),
            ));
        }

        Ok(())
    }

    /// Get the storage root as PathBuf
    pub fn storage_root_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_root)
    }

    /// Get all limits in bytes
    pub fn limits(&self) -> QuotaLimits {
        QuotaLimits {
            max_total_bytes: self.max_storage_size_mb.saturating_mul(BYTES_PER_MB),
            max_user_bytes: self.max_user_storage_size_mb.saturating_mul(BYTES_PER_MB),
            max_file_bytes: self.max_file_size_mb.saturating_mul(BYTES_PER_MB),
        }
    }
}
