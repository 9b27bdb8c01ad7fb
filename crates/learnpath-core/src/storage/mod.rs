mod config;
pub mod database;
pub mod migrations;
mod queue;

pub use config::{Config, EngagementConfig, QuizConfig, StorageConfig};
pub use database::{Database, ProgressStore};
pub use queue::{progress_queue, run_writer, QueueSink, WriterStats};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `LEARNPATH_DATA_DIR` wins when set. Otherwise `~/.config/learnpath[-dev]/`
/// based on `LEARNPATH_ENV`; set `LEARNPATH_ENV=dev` for the development
/// directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("LEARNPATH_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("LEARNPATH_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("learnpath-dev")
            } else {
                base_dir.join("learnpath")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
