//! Storage module for persisting harvest data
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Report persistence and the existence check used for deduplication
//! - Checkpoints recording where a failed run stopped
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{init_database, SqliteStorage};
pub use traits::{DedupIndex, NoDedup, Storage, StorageError, StorageResult};

use crate::harvest::{ItemRef, PageRef};

/// Item reference stored when a failure is not attributable to one report
pub const UNATTRIBUTED_ITEM: &str = "NA";

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Last known failure point of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRecord {
    /// Failing report, `None` when stored as `"NA"`
    pub item_ref: Option<ItemRef>,

    /// JSON-encoded error message
    pub cause: String,

    /// Page being processed when the failure happened
    pub page_ref: PageRef,

    pub recorded_at: String,
}

impl CheckpointRecord {
    /// Decodes the stored cause back into the plain error message
    pub fn cause_message(&self) -> String {
        serde_json::from_str::<String>(&self.cause).unwrap_or_else(|_| self.cause.clone())
    }
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
