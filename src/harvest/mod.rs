//! Harvest module - pagination, batching and delivery of reports
//!
//! This module contains the harvesting engine:
//! - [`ListingSource`]: how to read index pages and fetch reports
//! - [`PaginationQueue`]: the cursor deciding what to fetch next
//! - [`ReportStream`]: pull-based delivery with the pause between groups
//! - [`run_pipeline`]: a run against storage, with checkpoints on failure

mod fetcher;
pub mod observer;
mod pipeline;
mod queue;
pub mod resume;
mod source;
mod stream;

pub use fetcher::{build_http_client, user_agent_string, HttpJsonSource};
pub use observer::{HarvestEvent, ProgressReporter, SilentReporter, TracingReporter};
pub use pipeline::{run_pipeline, HarvestSummary, PipelineOptions};
pub use queue::{Advance, PaginationQueue, QueueSeed};
pub use resume::{
    apply_resume_filter, resolve_start, ResumeOptions, StartOrigin, StartOverride, StartPoint,
};
pub use source::{Harvested, IndexPage, ItemRef, ListingSource, PageRef, SourceError};
pub use stream::{harvest, ReportStream, StreamEvent};
