//! Resume handling
//!
//! Decides where a run starts (explicit override, stored checkpoint or the
//! configured defaults) and filters the first listing down to the resume marker.

use crate::config::HarvestConfig;
use crate::harvest::{ItemRef, ListingSource, PageRef};
use crate::storage::Storage;
use crate::HarvestError;

/// Where a run starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPoint {
    /// Number of the first page to read
    pub page_number: u32,

    /// Report to start from (inclusive)
    pub resume_from: Option<ItemRef>,

    pub origin: StartOrigin,
}

/// What decided the start point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOrigin {
    /// Page and report given by the caller
    Explicit,

    /// Failure point recorded by a previous run
    Checkpoint,

    /// `start-page` / `resume-from` from the configuration
    Configured,
}

/// Page and report given explicitly by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOverride {
    pub page: PageRef,
    pub item: ItemRef,
}

/// Caller-side resume settings
#[derive(Debug, Clone, Default)]
pub struct ResumeOptions {
    /// Takes precedence over any stored checkpoint
    pub explicit: Option<StartOverride>,

    /// Discard the stored checkpoint instead of resuming from it
    pub ignore_checkpoint: bool,
}

/// Drops every reference before the resume marker
///
/// Returns the filtered list and whether the marker was found. When it is not
/// found the whole list is dropped: the marker may be listed on a later page.
pub fn apply_resume_filter(pending: Vec<ItemRef>, marker: &ItemRef) -> (Vec<ItemRef>, bool) {
    match pending.iter().position(|item| item == marker) {
        Some(index) => {
            let mut pending = pending;
            (pending.split_off(index), true)
        }
        None => (Vec::new(), false),
    }
}

/// Computes the start point of a run and consumes stored checkpoints
///
/// An explicit override wins and leaves stored checkpoints untouched. Otherwise
/// the latest checkpoint is read (unless `ignore_checkpoint` is set) and every
/// checkpoint is cleared before the run begins.
pub fn resolve_start<S, St>(
    source: &S,
    storage: &mut St,
    config: &HarvestConfig,
    options: &ResumeOptions,
) -> Result<StartPoint, HarvestError>
where
    S: ListingSource + ?Sized,
    St: Storage + ?Sized,
{
    if let Some(explicit) = &options.explicit {
        let page_number = source.number_of(&explicit.page).ok_or_else(|| {
            HarvestError::InvalidStart(format!("{} is not a page of the listing", explicit.page))
        })?;

        tracing::info!(
            "Starting from given page {} and report {}",
            explicit.page,
            explicit.item
        );
        return Ok(StartPoint {
            page_number,
            resume_from: Some(explicit.item.clone()),
            origin: StartOrigin::Explicit,
        });
    }

    let checkpoint = if options.ignore_checkpoint {
        None
    } else {
        storage.get_checkpoint()?
    };
    storage.clear_checkpoints()?;

    if let Some(checkpoint) = checkpoint {
        match source.number_of(&checkpoint.page_ref) {
            Some(page_number) => {
                tracing::info!(
                    "Resuming from checkpoint at {} (report: {}, cause: {})",
                    checkpoint.page_ref,
                    checkpoint
                        .item_ref
                        .as_ref()
                        .map(ItemRef::as_str)
                        .unwrap_or("none"),
                    checkpoint.cause_message()
                );
                return Ok(StartPoint {
                    page_number,
                    resume_from: checkpoint.item_ref,
                    origin: StartOrigin::Checkpoint,
                });
            }
            None => tracing::warn!(
                "Checkpoint page {} is not part of the listing, ignoring it",
                checkpoint.page_ref
            ),
        }
    }

    Ok(StartPoint {
        page_number: config.start_page,
        resume_from: config.resume_from.clone().map(ItemRef::from),
        origin: StartOrigin::Configured,
    })
}
