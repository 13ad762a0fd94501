//! Progress reporting for harvest runs
//!
//! The queue never prints anything itself. It reports [`HarvestEvent`]s to an
//! injected [`ProgressReporter`]; [`TracingReporter`] turns them into log lines.

use crate::harvest::{ItemRef, PageRef};

/// Something observable that happened during a harvest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    /// The run is about to process its first page
    Started {
        page: PageRef,
        pending: usize,
        last_page: Option<u32>,
    },

    /// The resume marker was searched for in a page listing
    ResumeMarker { marker: ItemRef, found: bool },

    /// Already persisted references were removed from the pending list
    AlreadyPersisted { page: PageRef, count: usize, total: usize },

    /// A new index page was loaded
    PageLoaded {
        page: PageRef,
        number: u32,
        items: usize,
    },

    /// A group of reports was fetched
    BatchFetched { page: PageRef, count: usize },

    /// A report was left out because the source asked to skip it
    ItemSkipped { item: ItemRef, reason: String },

    /// The stop marker was found, nothing at or after it will be fetched
    StopMarkerReached { marker: ItemRef },

    /// Pagination stopped because too many reports were already persisted
    EarlyExit { already_persisted: usize, limit: usize },

    /// The run was cancelled by its consumer
    Cancelled { page: PageRef },

    /// The run finished without error
    Finished { page: PageRef },
}

/// Receives progress events from a harvest run
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: HarvestEvent);
}

/// Reporter that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn report(&self, _event: HarvestEvent) {}
}

/// Reporter that logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::Started {
                page,
                pending,
                last_page,
            } => tracing::info!(
                "Harvest starting at {} with {} listed reports (last page: {:?})",
                page,
                pending,
                last_page
            ),
            HarvestEvent::ResumeMarker { marker, found } => {
                if found {
                    tracing::info!("Resuming at report {}", marker);
                } else {
                    tracing::debug!("Resume marker {} not on this page", marker);
                }
            }
            HarvestEvent::AlreadyPersisted { page, count, total } => tracing::debug!(
                "{} reports of {} already persisted ({} so far)",
                count,
                page,
                total
            ),
            HarvestEvent::PageLoaded {
                page,
                number,
                items,
            } => tracing::debug!("Loaded page {} ({}) with {} reports", number, page, items),
            HarvestEvent::BatchFetched { page, count } => {
                tracing::debug!("Fetched {} reports from {}", count, page)
            }
            HarvestEvent::ItemSkipped { item, reason } => {
                tracing::warn!("Skipping report {}: {}", item, reason)
            }
            HarvestEvent::StopMarkerReached { marker } => {
                tracing::info!("Reached stop marker {}", marker)
            }
            HarvestEvent::EarlyExit {
                already_persisted,
                limit,
            } => tracing::info!(
                "{} reports already persisted (limit {}), looks like there is nothing new",
                already_persisted,
                limit
            ),
            HarvestEvent::Cancelled { page } => tracing::info!("Harvest cancelled at {}", page),
            HarvestEvent::Finished { page } => tracing::info!("Harvest finished at {}", page),
        }
    }
}
