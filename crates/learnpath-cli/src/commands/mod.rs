pub mod config;
pub mod course;
pub mod progress;
pub mod quiz;
pub mod stats;
pub mod study;

use std::path::PathBuf;

use learnpath_core::storage::data_dir;
use learnpath_core::{Config, CourseCatalog, Database, ProgressionService};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Course documents live in `<data_dir>/courses/*.json`.
pub fn courses_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let dir = data_dir()?.join("courses");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn load_catalog() -> Result<CourseCatalog, Box<dyn std::error::Error>> {
    let mut catalog = CourseCatalog::new();
    let loaded = catalog.load_dir(&courses_dir()?)?;
    tracing::debug!(loaded, "course catalog loaded");
    Ok(catalog)
}

/// Service over the configured database and the installed courses.
pub fn open_service(
    config: &Config,
) -> Result<ProgressionService<Database>, Box<dyn std::error::Error>> {
    let db = Database::open_in_data_dir(&config.storage.database_file)?;
    Ok(ProgressionService::new(db, load_catalog()?).with_quiz_config(config.quiz.clone()))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
