//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::harvest::{ItemRef, PageRef};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{CheckpointRecord, RunRecord, RunStatus, UNATTRIBUTED_ITEM};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;

/// Maximum number of bound parameters per existence query
const EXISTENCE_CHUNK: usize = 500;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = init_database(path)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Interrupted),
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Reports =====

    fn insert_item(&mut self, item_ref: &ItemRef, data: &str, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO items (uri, data, harvested_at, run_id) VALUES (?1, ?2, ?3, ?4)",
            params![item_ref.as_str(), data, now, run_id],
        )?;
        Ok(())
    }

    fn existing_item_refs(&self, candidates: &[ItemRef]) -> StorageResult<HashSet<ItemRef>> {
        let mut existing = HashSet::new();

        for chunk in candidates.chunks(EXISTENCE_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let query = format!("SELECT uri FROM items WHERE uri IN ({})", placeholders);
            let mut stmt = self.conn.prepare(&query)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter().map(|r| r.as_str())), |row| {
                row.get::<_, String>(0)
            })?;

            for row in rows {
                existing.insert(ItemRef::from(row?));
            }
        }

        Ok(existing)
    }

    fn count_items(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_items_for_run(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM items WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Checkpoints =====

    fn record_checkpoint(
        &mut self,
        item_ref: Option<&ItemRef>,
        cause: &str,
        page_ref: &PageRef,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let item = item_ref.map(ItemRef::as_str).unwrap_or(UNATTRIBUTED_ITEM);
        let cause = serde_json::to_string(cause)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO checkpoints (item_ref, cause, page_ref, recorded_at) VALUES (?1, ?2, ?3, ?4)",
            params![item, cause, page_ref.as_str(), now],
        )?;
        Ok(())
    }

    fn get_checkpoint(&self) -> StorageResult<Option<CheckpointRecord>> {
        let checkpoint = self
            .conn
            .query_row(
                "SELECT item_ref, cause, page_ref, recorded_at FROM checkpoints ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    let item: String = row.get(0)?;
                    Ok(CheckpointRecord {
                        item_ref: (item != UNATTRIBUTED_ITEM).then(|| ItemRef::from(item)),
                        cause: row.get(1)?,
                        page_ref: PageRef::from(row.get::<_, String>(2)?),
                        recorded_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(checkpoint)
    }

    fn clear_checkpoints(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM checkpoints", [])?;
        Ok(())
    }
}

/// Initializes or opens a database at the given path
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(Connection)` - Successfully opened/created database
/// * `Err(rusqlite::Error)` - Failed to open database
pub fn init_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}
