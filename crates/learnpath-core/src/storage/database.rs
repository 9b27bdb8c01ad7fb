//! SQLite-based progress storage.
//!
//! Provides persistent storage for:
//! - Per-content engagement, merged so it never regresses
//! - Module completions (passing quiz attempts)
//! - Course completion timestamps
//! - Key-value store for application state

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{data_dir, migrations};
use crate::error::{require_id, DatabaseError, Result};
use crate::progress::{ContentProgress, MergeOutcome, ModuleCompletion};

/// Default database file name inside the data directory.
pub const DEFAULT_DATABASE_FILE: &str = "learnpath.db";

/// Persistence seam used by the progression service and the write queue.
pub trait ProgressStore {
    /// Merge `incoming` into the stored record for its (student, content):
    /// max of seconds, OR of completion. Returns the stored record after the
    /// merge.
    fn upsert_content_progress(
        &self,
        incoming: &ContentProgress,
    ) -> Result<(ContentProgress, MergeOutcome)>;

    fn content_progress(&self, student_id: &str, content_id: &str)
        -> Result<Option<ContentProgress>>;

    /// Stored records for `content_ids`; items with no record are skipped.
    fn content_progress_for(
        &self,
        student_id: &str,
        content_ids: &[&str],
    ) -> Result<Vec<ContentProgress>>;

    /// Insert or replace the completion for (student, module).
    fn record_completion(&self, completion: &ModuleCompletion) -> Result<()>;

    fn completion(&self, student_id: &str, module_id: &str) -> Result<Option<ModuleCompletion>>;

    fn completions_for(&self, student_id: &str) -> Result<Vec<ModuleCompletion>>;

    /// Record the first completion of a course. Returns false if one exists.
    fn mark_course_completed(
        &self,
        student_id: &str,
        course_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    fn course_completed_at(&self, student_id: &str, course_id: &str)
        -> Result<Option<DateTime<Utc>>>;
}

/// SQLite database for progress storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/learnpath.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_in_data_dir(DEFAULT_DATABASE_FILE)
    }

    /// Open `file_name` inside the data directory.
    pub fn open_in_data_dir(file_name: &str) -> Result<Self> {
        let path = data_dir()?.join(file_name);
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn content_progress_from_row(row: &Row<'_>) -> rusqlite::Result<ContentProgress> {
    Ok(ContentProgress {
        student_id: row.get(0)?,
        content_id: row.get(1)?,
        engaged_seconds: row.get(2)?,
        is_completed: row.get(3)?,
        updated_at: parse_timestamp(4, &row.get::<_, String>(4)?)?,
    })
}

fn completion_from_row(row: &Row<'_>) -> rusqlite::Result<ModuleCompletion> {
    Ok(ModuleCompletion {
        student_id: row.get(0)?,
        module_id: row.get(1)?,
        score: row.get(2)?,
        is_fast_tracked: row.get(3)?,
        completed_at: parse_timestamp(4, &row.get::<_, String>(4)?)?,
    })
}

fn select_content_progress(
    conn: &Connection,
    student_id: &str,
    content_id: &str,
) -> rusqlite::Result<Option<ContentProgress>> {
    conn.query_row(
        "SELECT student_id, content_id, engaged_seconds, is_completed, updated_at
         FROM content_progress
         WHERE student_id = ?1 AND content_id = ?2",
        params![student_id, content_id],
        content_progress_from_row,
    )
    .optional()
}

impl ProgressStore for Database {
    fn upsert_content_progress(
        &self,
        incoming: &ContentProgress,
    ) -> Result<(ContentProgress, MergeOutcome)> {
        require_id("student_id", &incoming.student_id)?;
        require_id("content_id", &incoming.content_id)?;

        let tx = self.conn.unchecked_transaction()?;
        let (merged, outcome) =
            match select_content_progress(&tx, &incoming.student_id, &incoming.content_id)? {
                None => (incoming.clone(), MergeOutcome::Inserted),
                Some(mut stored) => {
                    let outcome = stored.merge(incoming);
                    (stored, outcome)
                }
            };

        if outcome == MergeOutcome::StaleIgnored {
            tracing::debug!(
                student_id = %incoming.student_id,
                content_id = %incoming.content_id,
                incoming = incoming.engaged_seconds,
                stored = merged.engaged_seconds,
                "stale progress write ignored"
            );
        } else {
            tx.execute(
                "INSERT INTO content_progress
                    (student_id, content_id, engaged_seconds, is_completed, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(student_id, content_id) DO UPDATE SET
                    engaged_seconds = excluded.engaged_seconds,
                    is_completed    = excluded.is_completed,
                    updated_at      = excluded.updated_at",
                params![
                    merged.student_id,
                    merged.content_id,
                    merged.engaged_seconds,
                    merged.is_completed,
                    merged.updated_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok((merged, outcome))
    }

    fn content_progress(
        &self,
        student_id: &str,
        content_id: &str,
    ) -> Result<Option<ContentProgress>> {
        Ok(select_content_progress(&self.conn, student_id, content_id)?)
    }

    fn content_progress_for(
        &self,
        student_id: &str,
        content_ids: &[&str],
    ) -> Result<Vec<ContentProgress>> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, content_id, engaged_seconds, is_completed, updated_at
             FROM content_progress
             WHERE student_id = ?1 AND content_id = ?2",
        )?;
        let mut records = Vec::new();
        for content_id in content_ids {
            if let Some(p) = stmt
                .query_row(params![student_id, content_id], content_progress_from_row)
                .optional()?
            {
                records.push(p);
            }
        }
        Ok(records)
    }

    fn record_completion(&self, completion: &ModuleCompletion) -> Result<()> {
        require_id("student_id", &completion.student_id)?;
        require_id("module_id", &completion.module_id)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO module_completions
                (student_id, module_id, score, is_fast_tracked, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                completion.student_id,
                completion.module_id,
                completion.score,
                completion.is_fast_tracked,
                completion.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn completion(&self, student_id: &str, module_id: &str) -> Result<Option<ModuleCompletion>> {
        let completion = self
            .conn
            .query_row(
                "SELECT student_id, module_id, score, is_fast_tracked, completed_at
                 FROM module_completions
                 WHERE student_id = ?1 AND module_id = ?2",
                params![student_id, module_id],
                completion_from_row,
            )
            .optional()?;
        Ok(completion)
    }

    fn completions_for(&self, student_id: &str) -> Result<Vec<ModuleCompletion>> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, module_id, score, is_fast_tracked, completed_at
             FROM module_completions
             WHERE student_id = ?1
             ORDER BY completed_at, module_id",
        )?;
        let rows = stmt.query_map(params![student_id], completion_from_row)?;
        let mut completions = Vec::new();
        for row in rows {
            completions.push(row?);
        }
        Ok(completions)
    }

    fn mark_course_completed(
        &self,
        student_id: &str,
        course_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO course_completions (student_id, course_id, completed_at)
             VALUES (?1, ?2, ?3)",
            params![student_id, course_id, at.to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }

    fn course_completed_at(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let at = self
            .conn
            .query_row(
                "SELECT completed_at FROM course_completions
                 WHERE student_id = ?1 AND course_id = ?2",
                params![student_id, course_id],
                |row| parse_timestamp(0, &row.get::<_, String>(0)?),
            )
            .optional()?;
        Ok(at)
    }
}
