//! Consumer traits and error types
//!
//! An [`ItemSink`] receives every harvested report in listing order. A sink
//! error halts the run and is recorded as a checkpoint on the report that
//! caused it.

use crate::harvest::Harvested;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur while consuming reports
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to persist report: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to encode report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report rejected: {0}")]
    Rejected(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Consumer of harvested reports
pub trait ItemSink<T> {
    /// Called once the run record exists, before the first report
    fn begin_run(&mut self, _run_id: i64) -> SinkResult<()> {
        Ok(())
    }

    /// Processes one report
    fn accept(&mut self, item: &Harvested<T>) -> SinkResult<()>;

    /// Called after the last report of a successful run
    fn finish(&mut self) -> SinkResult<()> {
        Ok(())
    }
}

impl<T, K: ItemSink<T> + ?Sized> ItemSink<T> for &mut K {
    fn begin_run(&mut self, run_id: i64) -> SinkResult<()> {
        (**self).begin_run(run_id)
    }

    fn accept(&mut self, item: &Harvested<T>) -> SinkResult<()> {
        (**self).accept(item)
    }

    fn finish(&mut self) -> SinkResult<()> {
        (**self).finish()
    }
}

/// Feeds every report to two sinks, `first` then `second`
///
/// A report rejected by `first` never reaches `second`.
#[derive(Debug)]
pub struct TeeSink<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> TeeSink<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<T, A: ItemSink<T>, B: ItemSink<T>> ItemSink<T> for TeeSink<A, B> {
    fn begin_run(&mut self, run_id: i64) -> SinkResult<()> {
        self.first.begin_run(run_id)?;
        self.second.begin_run(run_id)
    }

    fn accept(&mut self, item: &Harvested<T>) -> SinkResult<()> {
        self.first.accept(item)?;
        self.second.accept(item)
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.first.finish()?;
        self.second.finish()
    }
}

/// Sink that keeps every report in memory
#[derive(Debug, Default)]
pub struct CollectingSink<T> {
    pub items: Vec<Harvested<T>>,
    pub finished: bool,
}

impl<T: Clone> ItemSink<T> for CollectingSink<T> {
    fn accept(&mut self, item: &Harvested<T>) -> SinkResult<()> {
        self.items.push(item.clone());
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.finished = true;
        Ok(())
    }
}
