//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Keyed upserts of classified records and append-only tombstones
//! - Batched, transactional writes (one transaction per batch)
//! - Resume-point queries and the run ledger
//! - The paginated read side used to browse the archive

mod category;
mod schema;
mod sqlite;
mod traits;

pub use category::{CategoryPath, CATEGORY_SEPARATOR};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{HaltReason, RecordStatus};
use crate::SweepError;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Default number of records per listing page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Title stored for blank responses
pub const BLANK_TITLE: &str = "[Blank Page]";

/// Title stored for unknown responses with no usable title text
pub const GATEWAY_ERROR_TITLE: &str = "[Gateway Error]";

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(SweepError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, SweepError> {
    SqliteStorage::new(path)
}

/// A classified document
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlRecord {
    pub id: i64,
    pub title: String,
    pub category: CategoryPath,
    /// Display string as found on the page, e.g. `1.37 GiB (1475739525 Bytes`
    pub size: String,
    pub seeders: u32,
    pub magnet: Option<String>,
    pub status: RecordStatus,
    pub recorded_at: DateTime<Utc>,
}

impl CrawlRecord {
    /// Placeholder record for an empty response
    pub fn blank(id: i64) -> Self {
        Self {
            id,
            title: BLANK_TITLE.to_string(),
            category: CategoryPath::default(),
            size: String::new(),
            seeders: 0,
            magnet: None,
            status: RecordStatus::Blank,
            recorded_at: Utc::now(),
        }
    }

    /// Partial record for a page without a usable title
    pub fn unknown(id: i64, title: Option<String>) -> Self {
        Self {
            id,
            title: title.unwrap_or_else(|| GATEWAY_ERROR_TITLE.to_string()),
            category: CategoryPath::default(),
            size: String::new(),
            seeders: 0,
            magnet: None,
            status: RecordStatus::Unknown,
            recorded_at: Utc::now(),
        }
    }
}

/// Tombstone for an identifier that is permanently gone
#[derive(Debug, Clone, PartialEq)]
pub struct DeadMarker {
    pub id: i64,
    pub discovered_at: DateTime<Utc>,
}

/// An identifier whose last fetch failed at the transport level
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub id: i64,
    pub attempts: u32,
    pub last_error: String,
    pub last_attempt_at: DateTime<Utc>,
}

/// One write produced by applying an outcome, committed with its batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchWrite {
    /// Keyed replace of a content record
    Record(CrawlRecord),

    /// Insert-if-absent tombstone
    Dead(i64),

    /// Transport failure, only produced when errors are recorded
    Error { id: i64, message: String },
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub range_start: i64,
    pub range_end: i64,
    pub status: RunStatus,
    pub live_count: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Halted(HaltReason),
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Halted(reason) => reason.to_db_string(),
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            other => HaltReason::from_db_string(other).map(Self::Halted),
        }
    }
}

/// Filters for the paginated record listing
#[derive(Debug, Clone)]
pub struct RecordQuery {
    /// Substring matched against the title or the identifier
    pub search: Option<String>,

    /// Restrict to this category or any of its descendants
    pub category: Option<CategoryPath>,

    /// 1-based page number; clamped into range
    pub page: u32,

    pub per_page: u32,

    /// Keep records whose title is a gateway-error page
    pub include_gateway_errors: bool,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
            include_gateway_errors: false,
        }
    }
}

/// One page of listing results
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<CrawlRecord>,
    pub total_count: u64,
    pub page: u32,
    pub total_pages: u32,
}
