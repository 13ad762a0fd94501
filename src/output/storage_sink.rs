//! SQLite-backed report sink
//!
//! Persists every accepted report into the `items` table of the shared
//! storage, which is also what the dedup check of later runs reads.

use crate::harvest::Harvested;
use crate::output::traits::{ItemSink, SinkError, SinkResult};
use crate::storage::{Storage, StorageError};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Sink inserting reports into storage, serialized as JSON
pub struct StorageSink<S> {
    storage: Arc<Mutex<S>>,
    run_id: Option<i64>,
    inserted: u64,
}

impl<S: Storage> StorageSink<S> {
    pub fn new(storage: Arc<Mutex<S>>) -> Self {
        Self {
            storage,
            run_id: None,
            inserted: 0,
        }
    }

    /// Number of reports inserted so far
    pub fn inserted(&self) -> u64 {
        self.inserted
    }
}

impl<S: Storage, T: Serialize> ItemSink<T> for StorageSink<S> {
    fn begin_run(&mut self, run_id: i64) -> SinkResult<()> {
        self.run_id = Some(run_id);
        Ok(())
    }

    fn accept(&mut self, item: &Harvested<T>) -> SinkResult<()> {
        let run_id = self
            .run_id
            .ok_or_else(|| SinkError::Rejected("no run in progress".to_string()))?;
        let data = serde_json::to_string(&item.item)?;

        let mut storage = self.storage.lock().map_err(|_| StorageError::LockPoisoned)?;
        storage.insert_item(&item.item_ref, &data, run_id)?;
        self.inserted += 1;
        Ok(())
    }
}
