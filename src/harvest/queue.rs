//! Pagination queue
//!
//! This module owns the cursor over the listing and decides, at each step:
//! - which references to fetch next, in groups of `group-size`
//! - when a page is exhausted and the next one has to be loaded
//! - which references can be skipped because they are already persisted
//! - when to stop (last page, stop marker, already-persisted limit, cancellation)
//!
//! The queue never sleeps. Pausing between groups is left to the
//! [`ReportStream`](crate::harvest::ReportStream) driving it.

use crate::config::HarvestConfig;
use crate::harvest::observer::{HarvestEvent, ProgressReporter};
use crate::harvest::resume::apply_resume_filter;
use crate::harvest::{Harvested, ItemRef, ListingSource, PageRef};
use crate::state::{QueuePhase, QueueState};
use crate::storage::DedupIndex;
use crate::HarvestError;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Initial position of a queue, taken from the first index page
#[derive(Debug, Clone, Default)]
pub struct QueueSeed {
    /// Number of the page the references were listed on
    pub start_page: u32,

    /// Page count reported by the first index page
    pub total_pages: Option<u32>,

    /// References listed on the start page
    pub pending: Vec<ItemRef>,

    /// Report to start from (inclusive)
    pub resume_from: Option<ItemRef>,
}

/// Outcome of one advance step
#[derive(Debug)]
pub enum Advance<T> {
    /// A group of reports; more work remains after the group interval
    Batch(Vec<T>),

    /// The final reports of the run, delivered together with completion
    Finished(Vec<T>),
}

impl<T> Advance<T> {
    pub fn items(&self) -> &[T] {
        match self {
            Self::Batch(items) | Self::Finished(items) => items,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Resumable, rate-limited cursor over a paginated listing
pub struct PaginationQueue<S: ListingSource> {
    source: Arc<S>,
    dedup: Arc<dyn DedupIndex>,
    reporter: Arc<dyn ProgressReporter>,
    state: QueueState,

    /// Skip-until marker, cleared once found
    resume_marker: Option<ItemRef>,

    /// Halt marker, never fetched
    stop_marker: Option<ItemRef>,

    /// Group taken off `pending` whose fetch has not settled yet
    in_flight: Option<Vec<ItemRef>>,

    /// Page whose index fetch has not settled yet
    loading_page: Option<u32>,

    group_size: usize,
    group_interval: Duration,
    already_persisted_limit: usize,
}

impl<S: ListingSource> PaginationQueue<S> {
    /// Creates a queue positioned on the seed's start page
    ///
    /// Nothing is fetched or filtered until the first call to [`advance`](Self::advance).
    pub fn new(
        source: Arc<S>,
        dedup: Arc<dyn DedupIndex>,
        seed: QueueSeed,
        config: &HarvestConfig,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        let mut state = QueueState::new(seed.start_page, seed.total_pages, seed.pending);
        state.listing_exhausted = seed.total_pages.is_none() && state.pending.is_empty();

        Self {
            source,
            dedup,
            reporter,
            state,
            resume_marker: seed.resume_from,
            stop_marker: config.stop_before.clone().map(ItemRef::from),
            in_flight: None,
            loading_page: None,
            group_size: config.group_size.max(1),
            group_interval: Duration::from_millis(config.group_interval_ms),
            already_persisted_limit: config.already_persisted_limit,
        }
    }

    /// Produces the next group of reports
    ///
    /// Loads as many index pages as needed to find work, without pausing in
    /// between. Once the queue is done or errored this is a no-op returning an
    /// empty [`Advance::Finished`].
    ///
    /// Cancel safe: when the returned future is dropped before it settles,
    /// the group or index page it was fetching is fetched again by the next call.
    pub async fn advance(&mut self) -> Result<Advance<Harvested<S::Item>>, HarvestError> {
        match self.state.phase {
            QueuePhase::Done | QueuePhase::Errored => return Ok(Advance::Finished(Vec::new())),
            QueuePhase::NotStarted => {
                if let Err(error) = self.start() {
                    self.state.phase = QueuePhase::Errored;
                    return Err(error);
                }
            }
            QueuePhase::Running => {}
        }

        match self.step().await {
            Ok(advance) => {
                if advance.is_finished() {
                    self.state.phase = QueuePhase::Done;
                    self.reporter.report(HarvestEvent::Finished {
                        page: self.current_page_ref(),
                    });
                }
                Ok(advance)
            }
            Err(error) => {
                tracing::error!("Harvest halted at {}: {}", self.current_page_ref(), error);
                self.state.phase = QueuePhase::Errored;
                Err(error)
            }
        }
    }

    /// Stops the queue without fetching anything else
    pub fn cancel(&mut self) {
        if self.state.phase.is_terminal() {
            return;
        }
        self.state.phase = QueuePhase::Done;
        self.state.pending.clear();
        self.in_flight = None;
        self.loading_page = None;
        self.reporter.report(HarvestEvent::Cancelled {
            page: self.current_page_ref(),
        });
    }

    /// One-time filtering of the start page
    fn start(&mut self) -> Result<(), HarvestError> {
        let pending: Vec<ItemRef> = std::mem::take(&mut self.state.pending).into();
        self.state.pending = self.apply_resume_marker(pending).into();
        self.state.phase = QueuePhase::Running;

        self.reporter.report(HarvestEvent::Started {
            page: self.current_page_ref(),
            pending: self.state.pending.len(),
            last_page: self.state.last_page,
        });

        self.filter_already_persisted()
    }

    async fn step(&mut self) -> Result<Advance<Harvested<S::Item>>, HarvestError> {
        let batch = match self.in_flight.take() {
            Some(batch) => {
                tracing::debug!(
                    "Fetching abandoned group of {} again at {}",
                    batch.len(),
                    self.current_page_ref()
                );
                batch
            }
            None => match self.next_batch().await? {
                Some(batch) => batch,
                None => return Ok(Advance::Finished(Vec::new())),
            },
        };

        self.in_flight = Some(batch.clone());
        let items = self.fetch_batch(batch).await;
        self.in_flight = None;
        let items = items?;

        Ok(if self.state.is_terminal() {
            Advance::Finished(items)
        } else {
            Advance::Batch(items)
        })
    }

    /// Takes the next group off `pending`, loading pages as needed
    ///
    /// Returns `None` once the run is over.
    async fn next_batch(&mut self) -> Result<Option<Vec<ItemRef>>, HarvestError> {
        loop {
            if self.state.is_terminal() {
                return Ok(None);
            }

            if self.state.pending.is_empty() {
                if self.state.already_persisted >= self.already_persisted_limit {
                    self.reporter.report(HarvestEvent::EarlyExit {
                        already_persisted: self.state.already_persisted,
                        limit: self.already_persisted_limit,
                    });
                    return Ok(None);
                }

                self.load_next_page().await?;
                continue;
            }

            let mut batch = self.state.take_batch(self.group_size);
            if let Some(stop) = &self.stop_marker {
                if let Some(index) = batch.iter().position(|item| item == stop) {
                    batch.truncate(index);
                    self.state.stop_reached = true;
                    self.reporter
                        .report(HarvestEvent::StopMarkerReached { marker: stop.clone() });
                }
            }
            return Ok(Some(batch));
        }
    }

    /// Moves the cursor to the next page and makes its references pending
    async fn load_next_page(&mut self) -> Result<(), HarvestError> {
        let number = match self.loading_page {
            Some(number) => number,
            None => match self.state.current_page.checked_add(1) {
                Some(number) => number,
                None => {
                    self.state.last_page = Some(self.state.current_page);
                    return Ok(());
                }
            },
        };

        let page = self.source.page_of(number);
        self.loading_page = Some(number);
        let fetched = self.source.fetch_index(&page).await;
        let index = fetched.map_err(|source| HarvestError::IndexFetch {
            page: page.clone(),
            source,
        })?;
        self.loading_page = None;

        if let Some(total) = index.total_pages {
            if let Some(Some(previous)) = self.state.refine_last_page(total) {
                tracing::warn!("Page count changed from {} to {} at {}", previous, total, page);
            }
        }
        if index.item_refs.is_empty() && self.state.last_page.is_none() {
            self.state.listing_exhausted = true;
        }

        self.reporter.report(HarvestEvent::PageLoaded {
            page,
            number,
            items: index.item_refs.len(),
        });

        let refs = self.apply_resume_marker(index.item_refs);
        self.state.load_page(number, refs);
        self.filter_already_persisted()
    }

    /// Drops references before the resume marker while it has not been found
    fn apply_resume_marker(&mut self, refs: Vec<ItemRef>) -> Vec<ItemRef> {
        let Some(marker) = &self.resume_marker else {
            return refs;
        };

        let (filtered, found) = apply_resume_filter(refs, marker);
        self.reporter.report(HarvestEvent::ResumeMarker {
            marker: marker.clone(),
            found,
        });
        if found {
            self.resume_marker = None;
        }
        filtered
    }

    /// Removes pending references that are already persisted
    fn filter_already_persisted(&mut self) -> Result<(), HarvestError> {
        if self.state.pending.is_empty() {
            return Ok(());
        }

        let existing = self
            .dedup
            .existing_refs(self.state.pending.make_contiguous())?;
        if existing.is_empty() {
            return Ok(());
        }

        let before = self.state.pending.len();
        self.state.pending.retain(|item| !existing.contains(item));
        let count = before - self.state.pending.len();
        self.state.already_persisted += count;

        self.reporter.report(HarvestEvent::AlreadyPersisted {
            page: self.current_page_ref(),
            count,
            total: self.state.already_persisted,
        });
        Ok(())
    }

    /// Fetches a group concurrently and waits for every fetch to settle
    ///
    /// A failure is attributed to the first failing reference in group order.
    async fn fetch_batch(
        &mut self,
        batch: Vec<ItemRef>,
    ) -> Result<Vec<Harvested<S::Item>>, HarvestError> {
        let page = self.current_page_ref();
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let source = &self.source;
        let results = join_all(batch.iter().map(|item| source.fetch_item(item))).await;

        let mut items = Vec::with_capacity(batch.len());
        for (item_ref, result) in batch.into_iter().zip(results) {
            match result {
                Ok(item) => items.push(Harvested {
                    item_ref,
                    page: page.clone(),
                    item,
                }),
                Err(source) if source.is_skip() => {
                    self.reporter.report(HarvestEvent::ItemSkipped {
                        item: item_ref,
                        reason: source.to_string(),
                    });
                }
                Err(source) => {
                    return Err(HarvestError::ItemFetch {
                        item: item_ref,
                        page,
                        source,
                    })
                }
            }
        }

        self.reporter.report(HarvestEvent::BatchFetched {
            page,
            count: items.len(),
        });
        Ok(items)
    }

    /// Number of the page currently being processed
    pub fn current_page(&self) -> u32 {
        self.loading_page.unwrap_or(self.state.current_page)
    }

    /// Reference of the page currently being processed
    pub fn current_page_ref(&self) -> PageRef {
        self.source.page_of(self.current_page())
    }

    pub fn phase(&self) -> QueuePhase {
        self.state.phase
    }

    /// Cumulative number of references skipped as already persisted
    pub fn already_persisted(&self) -> usize {
        self.state.already_persisted
    }

    /// Number of references waiting on the current page
    pub fn pending_len(&self) -> usize {
        self.state.pending.len()
    }

    /// Pause to observe between two groups
    pub fn group_interval(&self) -> Duration {
        self.group_interval
    }
}
