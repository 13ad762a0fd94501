use crate::harvest::ItemRef;
use std::collections::VecDeque;
use std::fmt;

/// Lifecycle phase of a pagination queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueuePhase {
    /// Constructed, the resume filter has not been applied yet
    NotStarted,

    /// Advancing through pages and batches
    Running,

    /// Finished: listing exhausted, stop marker reached, early exit or cancelled
    Done,

    /// Halted by an unrecovered fetch or storage failure
    Errored,
}

impl QueuePhase {
    /// Returns true if no further work will ever be done
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Errored)
    }
}

impl fmt::Display for QueuePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Done => "done",
            Self::Errored => "errored",
        };
        write!(f, "{}", name)
    }
}

/// Cursor over pages and pending report references
///
/// Owned exclusively by one queue and only mutated from its advance step.
#[derive(Debug, Clone)]
pub struct QueueState {
    /// Page number currently being processed
    pub current_page: u32,

    /// Last page of the listing, when the source reported it
    pub last_page: Option<u32>,

    /// References waiting to be fetched, front first
    pub pending: VecDeque<ItemRef>,

    /// Cumulative number of references dropped because they were already persisted
    pub already_persisted: usize,

    /// Set when the stop marker was reached
    pub stop_reached: bool,

    /// Set when a source without a page count returned an empty listing
    pub listing_exhausted: bool,

    pub phase: QueuePhase,
}

impl QueueState {
    /// Creates the state for a run starting at `start_page`
    pub fn new(start_page: u32, last_page: Option<u32>, pending: Vec<ItemRef>) -> Self {
        Self {
            current_page: start_page,
            last_page,
            pending: pending.into(),
            already_persisted: 0,
            stop_reached: false,
            listing_exhausted: false,
            phase: QueuePhase::NotStarted,
        }
    }

    /// Returns true once nothing is left to fetch
    ///
    /// Either the stop marker was reached, or the pending list is empty and the
    /// cursor sits on the last known page.
    pub fn is_terminal(&self) -> bool {
        if self.stop_reached {
            return true;
        }
        if !self.pending.is_empty() {
            return false;
        }
        match self.last_page {
            Some(last) => self.current_page >= last,
            None => self.listing_exhausted,
        }
    }

    /// Removes up to `size` references from the front of the pending list
    pub fn take_batch(&mut self, size: usize) -> Vec<ItemRef> {
        let count = size.min(self.pending.len());
        self.pending.drain(..count).collect()
    }

    /// Replaces the pending list with a freshly loaded page
    pub fn load_page(&mut self, page: u32, refs: Vec<ItemRef>) {
        self.current_page = page;
        self.pending = refs.into();
    }

    /// Records a page count reported by the source
    ///
    /// Returns the previous value when it differed.
    pub fn refine_last_page(&mut self, total_pages: u32) -> Option<Option<u32>> {
        if self.last_page == Some(total_pages) {
            return None;
        }
        let previous = self.last_page;
        self.last_page = Some(total_pages);
        Some(previous)
    }
}
