//! Core error types for learnpath-core.
//!
//! Every fallible operation in the engine returns [`CoreError`]. Stale progress
//! writes are deliberately absent from this hierarchy: they are merged away by
//! the store and reported as [`crate::progress::MergeOutcome::StaleIgnored`].

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for learnpath-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Missing or malformed input; no state was changed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unknown course, module, content or question reference.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// True when retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CoreError::Database(e) => e.is_transient(),
            CoreError::Io(_) => true,
            _ => false,
        }
    }
}

/// The kind of entity a [`CoreError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Course,
    Module,
    Content,
    Question,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Course => "Course",
            EntityKind::Module => "Module",
            EntityKind::Content => "Content",
            EntityKind::Question => "Question",
        };
        f.write_str(name)
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// The write queue's consumer has gone away.
    #[error("Progress write queue is closed")]
    QueueClosed,
}

impl DatabaseError {
    /// Transient failures are retried by the next autosave cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, DatabaseError::Locked | DatabaseError::QueueClosed)
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Identifier is empty or whitespace
    #[error("Missing identifier: {field}")]
    MissingIdentifier { field: String },

    /// The same id appears twice where ids must be unique
    #[error("Duplicate {collection} id: {id}")]
    DuplicateId { collection: String, id: String },

    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    /// Answer option index outside the four available options
    #[error("Option index {index} out of range for question {question_id}")]
    OptionOutOfRange { question_id: String, index: usize },

    /// Answer given for a question that was not part of the sample
    #[error("Question {0} is not part of the submitted sample")]
    AnswerOutsideSample(String),

    /// A passing record already exists for this module
    #[error("Module {module_id} is already completed; quiz is review-only")]
    AlreadyCompleted { module_id: String },

    /// The module is locked for this student
    #[error("Module {module_id} is locked")]
    ModuleLocked { module_id: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    pub fn missing(field: impl Into<String>) -> Self {
        ValidationError::MissingIdentifier {
            field: field.into(),
        }
    }
}

/// Reject empty or whitespace-only identifiers.
pub fn require_id(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::missing(field))
    } else {
        Ok(())
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
