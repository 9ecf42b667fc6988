//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{Direction, HaltReason, RecordStatus};
use crate::storage::{
    BatchWrite, CategoryPath, CrawlRecord, DeadMarker, ErrorRecord, RecordPage, RecordQuery,
    RunRecord,
};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The run coordinator is the only writer; it calls [`Storage::write_batch`]
/// once per batch after every unit in the batch has resolved.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run and returns its ID
    fn create_run(&mut self, config_hash: &str, range_start: i64, range_end: i64)
        -> StorageResult<i64>;

    /// Records why a run stopped and how many live records it produced
    fn finish_run(&mut self, run_id: i64, reason: HaltReason, live_count: u64)
        -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Records and Tombstones =====

    /// Inserts a record, fully replacing any earlier record with the same id
    fn upsert_record(&mut self, record: &CrawlRecord) -> StorageResult<()>;

    /// Inserts a tombstone unless one already exists
    ///
    /// Returns true if a new tombstone was written.
    fn insert_dead_if_absent(&mut self, id: i64) -> StorageResult<bool>;

    /// Records (or bumps the attempt count of) a transport failure
    fn record_error(&mut self, id: i64, message: &str) -> StorageResult<()>;

    /// Applies every write of one batch inside a single transaction
    fn write_batch(&mut self, writes: &[BatchWrite]) -> StorageResult<()>;

    fn get_record(&self, id: i64) -> StorageResult<Option<CrawlRecord>>;

    fn get_dead(&self, id: i64) -> StorageResult<Option<DeadMarker>>;

    fn get_error(&self, id: i64) -> StorageResult<Option<ErrorRecord>>;

    /// Recorded transport-failure identifiers in visitation order for `direction`
    fn get_error_ids(&self, direction: Direction) -> StorageResult<Vec<i64>>;

    // ===== Resume and Housekeeping =====

    /// Extremum identifier over records and tombstones
    ///
    /// Maximum for ascending runs, minimum for descending runs, None if both
    /// sets are empty. Recorded transport errors are not consulted.
    fn resume_point(&self, direction: Direction) -> StorageResult<Option<i64>>;

    /// Current database size in bytes
    fn size_on_disk(&self) -> StorageResult<u64>;

    /// Discards every record, tombstone, error and run
    fn clear_all(&mut self) -> StorageResult<()>;

    // ===== Read Side =====

    /// Paginated, filtered listing of records ordered by id
    fn list_records(&self, query: &RecordQuery) -> StorageResult<RecordPage>;

    /// Distinct categories grouped under their top-level segment
    fn category_tree(&self) -> StorageResult<BTreeMap<String, Vec<CategoryPath>>>;

    // ===== Statistics =====

    fn count_records_by_status(&self, status: RecordStatus) -> StorageResult<u64>;

    fn count_dead(&self) -> StorageResult<u64>;

    fn count_errors(&self) -> StorageResult<u64>;
}
