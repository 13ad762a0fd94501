//! Shared fixtures for the integration tests

use async_trait::async_trait;
use report_harvest::config::HarvestConfig;
use report_harvest::harvest::{IndexPage, ItemRef, ListingSource, PageRef, SourceError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// In-memory listing whose pages are named `page-<n>`
///
/// Every report is the string of its own reference.
#[derive(Default)]
pub struct MockListing {
    pages: HashMap<u32, IndexPage>,
    failing_pages: HashMap<u32, String>,
    failing_items: HashMap<String, String>,
    item_delay: Option<Duration>,
    index_calls: Mutex<Vec<u32>>,
    item_calls: Mutex<Vec<String>>,
}

impl MockListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, number: u32, refs: &[&str], total_pages: Option<u32>) -> Self {
        let refs = refs.iter().map(|r| ItemRef::from(*r)).collect();
        self.pages.insert(number, IndexPage::new(refs, total_pages));
        self
    }

    pub fn failing_page(mut self, number: u32, message: &str) -> Self {
        self.failing_pages.insert(number, message.to_string());
        self
    }

    pub fn failing_item(mut self, item: &str, message: &str) -> Self {
        self.failing_items
            .insert(item.to_string(), message.to_string());
        self
    }

    /// Every report takes `delay` to arrive
    pub fn slow_items(mut self, delay: Duration) -> Self {
        self.item_delay = Some(delay);
        self
    }

    pub fn index_calls(&self) -> Vec<u32> {
        self.index_calls.lock().unwrap().clone()
    }

    pub fn item_calls(&self) -> Vec<String> {
        self.item_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingSource for MockListing {
    type Item = String;

    async fn fetch_index(&self, page: &PageRef) -> Result<IndexPage, SourceError> {
        let number = self
            .number_of(page)
            .ok_or_else(|| SourceError::Other(format!("unknown page {}", page)))?;
        self.index_calls.lock().unwrap().push(number);

        if let Some(message) = self.failing_pages.get(&number) {
            return Err(SourceError::Other(message.clone()));
        }
        Ok(self.pages.get(&number).cloned().unwrap_or_default())
    }

    async fn fetch_item(&self, item: &ItemRef) -> Result<String, SourceError> {
        self.item_calls.lock().unwrap().push(item.to_string());
        if let Some(delay) = self.item_delay {
            tokio::time::sleep(delay).await;
        }

        match self.failing_items.get(item.as_str()) {
            Some(message) => Err(SourceError::Other(message.clone())),
            None => Ok(item.to_string()),
        }
    }

    fn page_of(&self, number: u32) -> PageRef {
        PageRef::from(format!("page-{}", number))
    }

    fn number_of(&self, page: &PageRef) -> Option<u32> {
        page.as_str().strip_prefix("page-")?.parse().ok()
    }
}

/// Harvest settings with a short pause between groups
pub fn harvest_config(group_size: usize, group_interval_ms: u64) -> HarvestConfig {
    HarvestConfig {
        group_size,
        group_interval_ms,
        ..HarvestConfig::default()
    }
}
