//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::harvest::{ItemRef, PageRef};
use crate::storage::{CheckpointRecord, RunRecord, RunStatus};
use std::collections::HashSet;
use std::sync::Mutex;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the harvester.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new harvest run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as finished with the given status and a finish timestamp
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Reports =====

    /// Persists a harvested report
    ///
    /// Inserting a reference that already exists replaces its data.
    fn insert_item(&mut self, item_ref: &ItemRef, data: &str, run_id: i64) -> StorageResult<()>;

    /// Returns the subset of `candidates` that is already persisted
    fn existing_item_refs(&self, candidates: &[ItemRef]) -> StorageResult<HashSet<ItemRef>>;

    /// Counts all persisted reports
    fn count_items(&self) -> StorageResult<u64>;

    /// Counts the reports persisted by one run
    fn count_items_for_run(&self, run_id: i64) -> StorageResult<u64>;

    // ===== Checkpoints =====

    /// Records the point at which a run failed
    ///
    /// `None` as item reference means the failure could not be attributed to
    /// a single report.
    fn record_checkpoint(
        &mut self,
        item_ref: Option<&ItemRef>,
        cause: &str,
        page_ref: &PageRef,
    ) -> StorageResult<()>;

    /// Gets the most recently recorded checkpoint
    fn get_checkpoint(&self) -> StorageResult<Option<CheckpointRecord>>;

    /// Removes every recorded checkpoint
    fn clear_checkpoints(&mut self) -> StorageResult<()>;
}

/// Existence check used to skip reports that were already harvested
///
/// The order of the returned set carries no meaning.
pub trait DedupIndex: Send + Sync {
    fn existing_refs(&self, candidates: &[ItemRef]) -> StorageResult<HashSet<ItemRef>>;
}

impl<S: Storage + Send> DedupIndex for Mutex<S> {
    fn existing_refs(&self, candidates: &[ItemRef]) -> StorageResult<HashSet<ItemRef>> {
        let storage = self.lock().map_err(|_| StorageError::LockPoisoned)?;
        storage.existing_item_refs(candidates)
    }
}

/// A dedup index that never reports anything as persisted
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDedup;

impl DedupIndex for NoDedup {
    fn existing_refs(&self, _candidates: &[ItemRef]) -> StorageResult<HashSet<ItemRef>> {
        Ok(HashSet::new())
    }
}
