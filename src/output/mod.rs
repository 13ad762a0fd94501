//! Output module for harvested reports
//!
//! This module handles:
//! - The [`ItemSink`] consumer interface the pipeline feeds reports into
//! - Persisting reports to storage and writing them as JSON lines
//! - Harvest statistics read back from storage

mod jsonl;
pub mod stats;
mod storage_sink;
mod traits;

pub use jsonl::JsonLinesWriter;
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
pub use storage_sink::StorageSink;
pub use traits::{CollectingSink, ItemSink, SinkError, SinkResult, TeeSink};
