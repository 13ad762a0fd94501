//! Run-level orchestration
//!
//! Ties a harvest to persistent storage:
//! - resolves the start point and consumes stored checkpoints
//! - records the run and its final status
//! - feeds every report to the sink
//! - records a checkpoint when anything fails, so the next run resumes there

use crate::config::HarvestConfig;
use crate::harvest::observer::ProgressReporter;
use crate::harvest::resume::{resolve_start, ResumeOptions, StartPoint};
use crate::harvest::stream::harvest;
use crate::harvest::{ListingSource, PageRef};
use crate::output::ItemSink;
use crate::storage::{DedupIndex, RunStatus, Storage, StorageError};
use crate::HarvestError;
use std::sync::{Arc, Mutex, MutexGuard};

/// Per-run settings of the pipeline
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub resume: ResumeOptions,

    /// Hash of the configuration, stored with the run record
    pub config_hash: String,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSummary {
    pub run_id: i64,
    pub start: StartPoint,

    /// Reports handed to the sink
    pub delivered: u64,

    /// References skipped as already persisted
    pub already_persisted: usize,

    /// Page the run ended on
    pub last_page: PageRef,
}

struct Consumed {
    delivered: u64,
    already_persisted: usize,
    last_page: PageRef,
}

struct Failure {
    error: HarvestError,
    current_page: PageRef,
}

impl Failure {
    fn new(error: HarvestError, current_page: PageRef) -> Self {
        Self {
            error,
            current_page,
        }
    }
}

fn lock<S>(storage: &Mutex<S>) -> Result<MutexGuard<'_, S>, HarvestError> {
    storage
        .lock()
        .map_err(|_| HarvestError::from(StorageError::LockPoisoned))
}

/// Runs one complete harvest against persistent storage
///
/// Reports already in storage are skipped. On failure a checkpoint naming the
/// failing report (or `NA`), the cause and the current page is recorded, the
/// run is marked failed and the original error is returned.
pub async fn run_pipeline<S, St, K>(
    source: Arc<S>,
    storage: Arc<Mutex<St>>,
    config: &HarvestConfig,
    options: &PipelineOptions,
    sink: &mut K,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<HarvestSummary, HarvestError>
where
    S: ListingSource + 'static,
    St: Storage + Send + 'static,
    K: ItemSink<S::Item> + ?Sized,
{
    let (run_id, start) = {
        let mut guard = lock(&storage)?;
        let start = resolve_start(source.as_ref(), &mut *guard, config, &options.resume)?;
        let run_id = guard.create_run(&options.config_hash)?;
        (run_id, start)
    };
    tracing::info!(
        "Run {} starting at page {} ({:?})",
        run_id,
        start.page_number,
        start.origin
    );

    let effective = HarvestConfig {
        start_page: start.page_number,
        resume_from: start.resume_from.clone().map(|item| item.into_string()),
        ..config.clone()
    };
    let dedup: Arc<dyn DedupIndex> = storage.clone();

    match consume(source, dedup, &effective, run_id, sink, reporter).await {
        Ok(consumed) => {
            let mut guard = lock(&storage)?;
            guard.clear_checkpoints()?;
            guard.finish_run(run_id, RunStatus::Completed)?;

            tracing::info!(
                "Run {} completed: {} reports delivered, {} already persisted",
                run_id,
                consumed.delivered,
                consumed.already_persisted
            );
            Ok(HarvestSummary {
                run_id,
                start,
                delivered: consumed.delivered,
                already_persisted: consumed.already_persisted,
                last_page: consumed.last_page,
            })
        }
        Err(failure) => {
            record_failure(&storage, run_id, &failure);
            Err(failure.error)
        }
    }
}

async fn consume<S, K>(
    source: Arc<S>,
    dedup: Arc<dyn DedupIndex>,
    config: &HarvestConfig,
    run_id: i64,
    sink: &mut K,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<Consumed, Failure>
where
    S: ListingSource,
    K: ItemSink<S::Item> + ?Sized,
{
    let start_page = source.page_of(config.start_page);
    if let Err(e) = sink.begin_run(run_id) {
        return Err(Failure::new(e.into(), start_page));
    }

    let mut stream = match harvest(source, dedup, config, reporter).await {
        Ok(stream) => stream,
        Err(error) => return Err(Failure::new(error, start_page)),
    };

    let mut delivered = 0;
    while let Some(next) = stream.next().await {
        let harvested = match next {
            Ok(harvested) => harvested,
            Err(error) => return Err(Failure::new(error, stream.current_page_ref())),
        };

        if let Err(e) = sink.accept(&harvested) {
            let current_page = stream.current_page_ref();
            stream.cancel();
            let error = HarvestError::Consumer {
                item: harvested.item_ref,
                page: harvested.page,
                message: e.to_string(),
            };
            return Err(Failure::new(error, current_page));
        }
        delivered += 1;
    }

    let last_page = stream.current_page_ref();
    if let Err(e) = sink.finish() {
        return Err(Failure::new(e.into(), last_page));
    }

    Ok(Consumed {
        delivered,
        already_persisted: stream.already_persisted(),
        last_page,
    })
}

/// Stores the checkpoint of a failed run and marks the run failed
///
/// Bookkeeping failures are logged; the harvest error is what the caller sees.
fn record_failure<St: Storage>(storage: &Mutex<St>, run_id: i64, failure: &Failure) {
    let error = &failure.error;
    let page = error.page_ref().unwrap_or(&failure.current_page);
    let cause = error.cause();

    tracing::error!(
        "Run {} failed at {} (report: {}): {}",
        run_id,
        page,
        error
            .item_ref()
            .map(|item| item.as_str())
            .unwrap_or(crate::storage::UNATTRIBUTED_ITEM),
        cause
    );

    let mut guard = match lock(storage) {
        Ok(guard) => guard,
        Err(e) => {
            tracing::error!("Cannot record checkpoint: {}", e);
            return;
        }
    };
    if let Err(e) = guard.record_checkpoint(error.item_ref(), &cause, page) {
        tracing::error!("Failed to record checkpoint: {}", e);
    }
    if let Err(e) = guard.finish_run(run_id, RunStatus::Failed) {
        tracing::error!("Failed to mark run {} as failed: {}", run_id, e);
    }
}
