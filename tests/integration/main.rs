//! Integration tests for report harvesting
//!
//! Listing behavior is tested against an in-memory source on a paused clock;
//! the HTTP source is tested against wiremock servers.

mod common;
mod http_source_tests;
mod pipeline_tests;
