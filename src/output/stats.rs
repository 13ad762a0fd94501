//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{CheckpointRecord, RunRecord, Storage};
use crate::HarvestError;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of persisted reports
    pub total_items: u64,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Reports persisted by the most recent run
    pub latest_run_items: u64,

    /// Pending failure point the next run will resume from
    pub checkpoint: Option<CheckpointRecord>,
}

impl HarvestStatistics {
    /// Duration of the latest run in seconds, when it has finished
    pub fn latest_run_duration(&self) -> Option<i64> {
        let run = self.latest_run.as_ref()?;
        let started = run.started_at.parse::<chrono::DateTime<chrono::Utc>>().ok()?;
        let finished = run
            .finished_at
            .as_deref()?
            .parse::<chrono::DateTime<chrono::Utc>>()
            .ok()?;
        Some((finished - started).num_seconds())
    }
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics, HarvestError> {
    let total_items = storage.count_items()?;
    let latest_run = storage.get_latest_run()?;
    let latest_run_items = match &latest_run {
        Some(run) => storage.count_items_for_run(run.id)?,
        None => 0,
    };
    let checkpoint = storage.get_checkpoint()?;

    Ok(HarvestStatistics {
        total_items,
        latest_run,
        latest_run_items,
        checkpoint,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Total reports persisted: {}", stats.total_items);
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  ID: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            if let Some(seconds) = stats.latest_run_duration() {
                println!("  Duration: {}s", seconds);
            }
            println!("  Reports persisted: {}", stats.latest_run_items);
        }
        None => println!("No harvest runs recorded yet."),
    }
    println!();

    if let Some(checkpoint) = &stats.checkpoint {
        println!("Pending Checkpoint:");
        println!("  Page: {}", checkpoint.page_ref);
        println!(
            "  Report: {}",
            checkpoint
                .item_ref
                .as_ref()
                .map(|item| item.as_str())
                .unwrap_or(crate::storage::UNATTRIBUTED_ITEM)
        );
        println!("  Cause: {}", checkpoint.cause_message());
        println!("  Recorded: {}", checkpoint.recorded_at);
    }
}
