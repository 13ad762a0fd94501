//! HTTP listing source
//!
//! This module reads listings published as JSON over HTTP:
//! - Building HTTP clients with proper user agent strings
//! - Index pages addressed by a URL template with a `{page}` placeholder
//! - Report references resolved against the index page URL
//! - Error classification (missing reports are skipped, other failures halt)

use crate::config::{Config, SourceConfig, UserAgentConfig, PAGE_PLACEHOLDER};
use crate::harvest::{IndexPage, ItemRef, ListingSource, PageRef, SourceError};
use crate::HarvestError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use report_harvest::config::UserAgentConfig;
/// use report_harvest::harvest::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "ReportHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Format: Name/Version (+ContactURL; ContactEmail)
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Listing whose index pages and reports are JSON documents
///
/// An index page looks like:
///
/// ```json
/// { "items": ["/reports/1", "/reports/2"], "total_pages": 12 }
/// ```
///
/// Both field names are configurable. Reports are returned as raw JSON values.
#[derive(Debug, Clone)]
pub struct HttpJsonSource {
    client: Client,
    prefix: String,
    suffix: String,
    items_field: String,
    total_pages_field: String,
}

impl HttpJsonSource {
    /// Creates a source from a validated source configuration
    pub fn new(client: Client, config: &SourceConfig) -> Result<Self, HarvestError> {
        let (prefix, suffix) = config
            .index_url
            .split_once(PAGE_PLACEHOLDER)
            .ok_or_else(|| {
                crate::ConfigError::Validation(format!(
                    "index-url must contain {}",
                    PAGE_PLACEHOLDER
                ))
            })?;

        Ok(Self {
            client,
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            items_field: config.items_field.clone(),
            total_pages_field: config.total_pages_field.clone(),
        })
    }

    /// Creates a source and its HTTP client from the full configuration
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.user_agent)?;
        Self::new(client, &config.source)
    }

    async fn get_json(&self, url: &str) -> Result<Value, SourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| SourceError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(SourceError::Skipped {
                reason: format!("{} returned {}", url, status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SourceError::Malformed {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    fn parse_index(&self, url: &str, body: &Value) -> Result<IndexPage, SourceError> {
        let malformed = |message: String| SourceError::Malformed {
            url: url.to_string(),
            message,
        };

        let base = Url::parse(url).map_err(|e| malformed(e.to_string()))?;

        let entries = body
            .get(&self.items_field)
            .and_then(Value::as_array)
            .ok_or_else(|| malformed(format!("missing array field '{}'", self.items_field)))?;

        let mut item_refs = Vec::with_capacity(entries.len());
        for entry in entries {
            let reference = entry
                .as_str()
                .ok_or_else(|| malformed(format!("non-string entry in '{}'", self.items_field)))?;
            let resolved = base
                .join(reference)
                .map_err(|e| malformed(format!("invalid reference '{}': {}", reference, e)))?;
            item_refs.push(ItemRef::from(String::from(resolved)));
        }

        let total_pages = match body.get(&self.total_pages_field) {
            None | Some(Value::Null) => None,
            Some(value) => {
                let total = value
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| {
                        malformed(format!("invalid '{}': {}", self.total_pages_field, value))
                    })?;
                Some(total)
            }
        };

        Ok(IndexPage::new(item_refs, total_pages))
    }
}

#[async_trait]
impl ListingSource for HttpJsonSource {
    type Item = Value;

    async fn fetch_index(&self, page: &PageRef) -> Result<IndexPage, SourceError> {
        let body = match self.get_json(page.as_str()).await {
            // A missing index page is not a report that can be left out
            Err(SourceError::Skipped { .. }) => {
                return Err(SourceError::Status {
                    url: page.to_string(),
                    status: StatusCode::NOT_FOUND.as_u16(),
                })
            }
            other => other?,
        };
        self.parse_index(page.as_str(), &body)
    }

    async fn fetch_item(&self, item: &ItemRef) -> Result<Value, SourceError> {
        self.get_json(item.as_str()).await
    }

    fn page_of(&self, number: u32) -> PageRef {
        PageRef::from(format!("{}{}{}", self.prefix, number, self.suffix))
    }

    fn number_of(&self, page: &PageRef) -> Option<u32> {
        let number = page
            .as_str()
            .strip_prefix(&self.prefix)?
            .strip_suffix(&self.suffix)?;
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        number.parse().ok()
    }
}
