use serde::Deserialize;

/// Main configuration structure for Report-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestConfig,
    pub source: SourceConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Pagination, batching and rate limiting behavior
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Number of reports fetched concurrently in one group
    #[serde(rename = "group-size", default = "default_group_size")]
    pub group_size: usize,

    /// Pause between two groups of requests (milliseconds)
    #[serde(rename = "group-interval-ms", default = "default_group_interval_ms")]
    pub group_interval_ms: u64,

    /// Cumulative number of already persisted reports after which the harvest
    /// stops paginating
    #[serde(
        rename = "already-persisted-limit",
        default = "default_already_persisted_limit"
    )]
    pub already_persisted_limit: usize,

    /// Page number the harvest starts from
    #[serde(rename = "start-page", default = "default_start_page")]
    pub start_page: u32,

    /// Report reference to start from (inclusive)
    #[serde(rename = "resume-from", default)]
    pub resume_from: Option<String>,

    /// Report reference to stop before (exclusive)
    #[serde(rename = "stop-before", default)]
    pub stop_before: Option<String>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            group_size: default_group_size(),
            group_interval_ms: default_group_interval_ms(),
            already_persisted_limit: default_already_persisted_limit(),
            start_page: default_start_page(),
            resume_from: None,
            stop_before: None,
        }
    }
}

fn default_group_size() -> usize {
    5
}

fn default_group_interval_ms() -> u64 {
    30_000
}

fn default_already_persisted_limit() -> usize {
    10
}

fn default_start_page() -> u32 {
    1
}

/// Remote listing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Index page URL template, `{page}` is replaced with the page number
    #[serde(rename = "index-url")]
    pub index_url: String,

    /// Name of the JSON array listing the report references
    #[serde(rename = "items-field", default = "default_items_field")]
    pub items_field: String,

    /// Name of the JSON number holding the total page count
    #[serde(rename = "total-pages-field", default = "default_total_pages_field")]
    pub total_pages_field: String,
}

fn default_items_field() -> String {
    "items".to_string()
}

fn default_total_pages_field() -> String {
    "total_pages".to_string()
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the harvester
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the harvester
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the harvester
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for harvester-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}
