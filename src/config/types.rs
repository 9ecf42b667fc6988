use crate::state::Direction;
use crate::url::UrlTemplate;
use crate::UrlError;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Range-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetch: FetchConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Returns the run direction: explicit if configured, otherwise inferred
    pub fn direction(&self) -> Direction {
        self.crawler
            .direction
            .unwrap_or_else(|| Direction::from_range(self.crawler.start_id, self.crawler.end_id))
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// First identifier to visit
    #[serde(rename = "start-id")]
    pub start_id: i64,

    /// Last identifier to visit (inclusive)
    #[serde(rename = "end-id")]
    pub end_id: i64,

    /// Explicit walk direction; must agree with the range when set
    #[serde(default)]
    pub direction: Option<Direction>,

    /// Number of identifiers fetched concurrently per batch
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Consecutive adverse outcomes that stop the run (0 disables)
    #[serde(rename = "fail-limit", default = "default_fail_limit")]
    pub fail_limit: u32,

    /// What to do with identifiers whose fetch failed at the transport level
    #[serde(rename = "transport-errors", default)]
    pub transport_errors: TransportErrorPolicy,
}

/// Handling of transport failures (timeouts, refused connections)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportErrorPolicy {
    /// Log and move past the identifier; nothing is persisted
    #[default]
    Skip,

    /// Also record the identifier in the error table so it can be retried
    Record,
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Explicit request template containing `{id}`
    #[serde(rename = "url-template", default)]
    pub url_template: Option<String>,

    /// Mirror link the request template is derived from
    #[serde(default)]
    pub mirror: Option<String>,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl FetchConfig {
    /// Builds the request template from whichever source is configured
    pub fn template(&self) -> Result<UrlTemplate, UrlError> {
        match (&self.url_template, &self.mirror) {
            (Some(template), _) => UrlTemplate::parse(template),
            (None, Some(mirror)) => UrlTemplate::from_mirror_link(mirror),
            (None, None) => Err(UrlError::Parse(
                "neither url-template nor mirror is set".to_string(),
            )),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Database size at which the run stops (bytes, 0 disables)
    #[serde(rename = "max-database-bytes", default = "default_max_database_bytes")]
    pub max_database_bytes: u64,
}

fn default_workers() -> u32 {
    150
}

fn default_fail_limit() -> u32 {
    500
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_timeout_secs() -> u64 {
    7
}

fn default_max_database_bytes() -> u64 {
    20 * 1024 * 1024 * 1024
}
