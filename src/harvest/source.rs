//! Listing source abstraction
//!
//! A source knows how to read one index page of the listing and how to fetch
//! one report. The queue treats reports as opaque values; it only ever looks at
//! their references.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Opaque identifier of a listing page (typically its URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageRef(String);

/// Opaque identifier of one report (typically its URL or URI)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemRef(String);

macro_rules! string_ref {
    ($name:ident) => {
        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_ref!(PageRef);
string_ref!(ItemRef);

/// One parsed index page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexPage {
    /// Report references in listing order
    pub item_refs: Vec<ItemRef>,

    /// Total number of pages, may be omitted after the first page
    pub total_pages: Option<u32>,
}

impl IndexPage {
    pub fn new(item_refs: Vec<ItemRef>, total_pages: Option<u32>) -> Self {
        Self {
            item_refs,
            total_pages,
        }
    }
}

/// A delivered report together with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Harvested<T> {
    pub item_ref: ItemRef,
    pub page: PageRef,
    pub item: T,
}

/// Errors reported by a listing source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed response from {url}: {message}")]
    Malformed { url: String, message: String },

    /// The report cannot be harvested and should be left out of the run
    #[error("Skipped: {reason}")]
    Skipped { reason: String },

    #[error("{0}")]
    Other(String),
}

impl SourceError {
    /// Returns true if the failure only means the report should be left out
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Fetch collaborators plus the page numbering scheme of a listing
///
/// `page_of` and `number_of` must be inverse functions.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// The parsed report type
    type Item: Send;

    /// Fetches and parses one index page
    async fn fetch_index(&self, page: &PageRef) -> Result<IndexPage, SourceError>;

    /// Fetches and parses one report
    async fn fetch_item(&self, item: &ItemRef) -> Result<Self::Item, SourceError>;

    /// Returns the reference of the page with the given number
    fn page_of(&self, number: u32) -> PageRef;

    /// Returns the number of the given page, `None` if it is not part of the listing
    fn number_of(&self, page: &PageRef) -> Option<u32>;
}
