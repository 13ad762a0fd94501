//! Pull-based delivery of harvested reports
//!
//! [`ReportStream`] drives a [`PaginationQueue`], buffers the group it fetched
//! and hands reports out one at a time. The pause between two groups is a
//! deadline armed when a group is delivered, so a slow consumer eats into the
//! pause instead of adding to it.

use crate::config::{validate_harvest_config, HarvestConfig};
use crate::harvest::observer::ProgressReporter;
use crate::harvest::queue::{Advance, PaginationQueue, QueueSeed};
use crate::harvest::{Harvested, ListingSource, PageRef};
use crate::state::QueuePhase;
use crate::storage::DedupIndex;
use crate::HarvestError;
use futures::Stream;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::{sleep_until, Instant};

/// One signal of a harvest run
///
/// A run yields any number of `Item`s followed by exactly one of `Completed`
/// or `Failed`.
#[derive(Debug)]
pub enum StreamEvent<T> {
    Item(T),
    Completed,
    Failed(HarvestError),
}

/// Starts a harvest
///
/// Fetches the start page of the listing and returns a stream positioned on
/// it. Reports are only fetched once the stream is polled.
///
/// # Errors
///
/// Returns [`HarvestError::Config`] for invalid settings and
/// [`HarvestError::IndexFetch`] when the start page cannot be read.
pub async fn harvest<S: ListingSource>(
    source: Arc<S>,
    dedup: Arc<dyn DedupIndex>,
    config: &HarvestConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<ReportStream<S>, HarvestError> {
    validate_harvest_config(config)?;

    let page = source.page_of(config.start_page);
    tracing::debug!("Reading start page {}", page);
    let index = source
        .fetch_index(&page)
        .await
        .map_err(|source| HarvestError::IndexFetch { page, source })?;

    let seed = QueueSeed {
        start_page: config.start_page,
        total_pages: index.total_pages,
        pending: index.item_refs,
        resume_from: config.resume_from.clone().map(Into::into),
    };

    Ok(ReportStream::new(PaginationQueue::new(
        source, dedup, seed, config, reporter,
    )))
}

/// Harvested reports in listing order
///
/// Dropping the stream cancels the run.
pub struct ReportStream<S: ListingSource> {
    queue: PaginationQueue<S>,
    buffered: VecDeque<Harvested<S::Item>>,

    /// Earliest instant the next group may be fetched
    resume_at: Option<Instant>,

    /// The queue finished, completion follows the buffered reports
    completing: bool,

    /// The terminal signal was delivered or the run was cancelled
    ended: bool,
}

impl<S: ListingSource> ReportStream<S> {
    pub fn new(queue: PaginationQueue<S>) -> Self {
        Self {
            queue,
            buffered: VecDeque::new(),
            resume_at: None,
            completing: false,
            ended: false,
        }
    }

    /// Returns the next signal, `None` once the run has ended
    ///
    /// Cancel safe: work abandoned mid-fetch is fetched again on the next call.
    pub async fn next_event(&mut self) -> Option<StreamEvent<Harvested<S::Item>>> {
        loop {
            if self.ended {
                return None;
            }
            if let Some(item) = self.buffered.pop_front() {
                return Some(StreamEvent::Item(item));
            }
            if self.completing {
                self.ended = true;
                return Some(StreamEvent::Completed);
            }

            if let Some(deadline) = self.resume_at {
                sleep_until(deadline).await;
                self.resume_at = None;
            }

            match self.queue.advance().await {
                Ok(Advance::Batch(items)) => {
                    self.resume_at = Some(Instant::now() + self.queue.group_interval());
                    self.buffered.extend(items);
                }
                Ok(Advance::Finished(items)) => {
                    self.buffered.extend(items);
                    self.completing = true;
                }
                Err(error) => {
                    self.ended = true;
                    return Some(StreamEvent::Failed(error));
                }
            }
        }
    }

    /// Returns the next report, `None` on completion
    pub async fn next(&mut self) -> Option<Result<Harvested<S::Item>, HarvestError>> {
        match self.next_event().await? {
            StreamEvent::Item(item) => Some(Ok(item)),
            StreamEvent::Failed(error) => Some(Err(error)),
            StreamEvent::Completed => None,
        }
    }

    /// Converts into a `futures` stream of reports
    pub fn into_stream(self) -> impl Stream<Item = Result<Harvested<S::Item>, HarvestError>> {
        futures::stream::unfold(self, |mut stream| async move {
            let next = stream.next().await?;
            Some((next, stream))
        })
    }

    /// Stops the run
    ///
    /// Buffered reports are discarded and no completion is signalled.
    pub fn cancel(&mut self) {
        self.buffered.clear();
        self.resume_at = None;
        self.queue.cancel();
        self.ended = true;
    }

    /// Reference of the page currently being processed
    pub fn current_page_ref(&self) -> PageRef {
        self.queue.current_page_ref()
    }

    pub fn phase(&self) -> QueuePhase {
        self.queue.phase()
    }

    /// Cumulative number of references skipped as already persisted
    pub fn already_persisted(&self) -> usize {
        self.queue.already_persisted()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl<S: ListingSource> Drop for ReportStream<S> {
    fn drop(&mut self) {
        if !self.ended {
            self.queue.cancel();
        }
    }
}
