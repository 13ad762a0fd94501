//! Report-Harvest: a resumable, rate-limited report harvester
//!
//! This crate walks a paginated listing of reports, fetches every report it has
//! not persisted yet in small concurrent groups, and hands them one at a time to
//! a consumer. Failures are recorded as a checkpoint so the next run resumes at
//! the exact report that broke the previous one.

pub mod config;
pub mod harvest;
pub mod output;
pub mod state;
pub mod storage;

use harvest::{ItemRef, PageRef, SourceError};
use thiserror::Error;

/// Main error type for Report-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to fetch index page {page}: {source}")]
    IndexFetch { page: PageRef, source: SourceError },

    #[error("Failed to fetch report {item} (page {page}): {source}")]
    ItemFetch {
        item: ItemRef,
        page: PageRef,
        source: SourceError,
    },

    #[error("Consumer rejected report {item} (page {page}): {message}")]
    Consumer {
        item: ItemRef,
        page: PageRef,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Sink(#[from] output::SinkError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid start point: {0}")]
    InvalidStart(String),
}

impl HarvestError {
    /// The most specific item reference this failure can be attributed to
    pub fn item_ref(&self) -> Option<&ItemRef> {
        match self {
            Self::ItemFetch { item, .. } | Self::Consumer { item, .. } => Some(item),
            _ => None,
        }
    }

    /// The page reference carried by the failure, if any
    pub fn page_ref(&self) -> Option<&PageRef> {
        match self {
            Self::IndexFetch { page, .. }
            | Self::ItemFetch { page, .. }
            | Self::Consumer { page, .. } => Some(page),
            _ => None,
        }
    }

    /// Human readable cause, without the attribution prefix
    pub fn cause(&self) -> String {
        match self {
            Self::IndexFetch { source, .. } | Self::ItemFetch { source, .. } => source.to_string(),
            Self::Consumer { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Report-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{harvest, run_pipeline, PaginationQueue, ReportStream};
pub use state::QueuePhase;
