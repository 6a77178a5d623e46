//! docstore - Entry Point
//!
//! Prepares the storage root: loads configuration, creates the root,
//! reserves directories for the user ids given on the command line and
//! reports global usage.
//!
//! Usage: `docstore [--config <path>] [user_id ...]`

use log::{error, info};
use std::process::ExitCode;

use docstore::utils::logging::setup_logging;
use docstore::{StorageConfig, StorageManager, StorageService, UserId};

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    let mut config_path = None;
    let mut users = Vec::new();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        if arg == "--config" {
            config_path = args.next();
            continue;
        }
        match arg.parse::<u64>() {
            Ok(id) => users.push(UserId::new(id)),
            Err(_) => {
                error!("Invalid user id: {arg}");
                return ExitCode::FAILURE;
            }
        }
    }

    let config = match config_path {
        Some(path) => StorageConfig::load_from(path),
        None => StorageConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let manager = match StorageManager::from_config(&config) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Failed to open storage root {}: {e}", config.storage_root);
            return ExitCode::FAILURE;
        }
    };
    let service = StorageService::new(manager);

    match service.initialize(users).await {
        Ok(created) => info!("{created} user directories created"),
        Err(e) => {
            error!("Failed to reserve user directories: {e}");
            return ExitCode::FAILURE;
        }
    }

    match service.global_usage().await {
        Ok(usage) => info!(
            "Global usage: {} of {} bytes ({}%), {} files",
            usage.used, usage.max, usage.percentage, usage.files_count
        ),
        Err(e) => {
            error!("Failed to compute usage: {e}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
