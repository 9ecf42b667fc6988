//! Statistics generation from the archive database
//!
//! This module provides functionality for extracting and displaying
//! archive statistics from the storage layer.

use crate::output::progress::format_duration;
use crate::state::{Direction, RecordStatus};
use crate::storage::{RunRecord, RunStatus, Storage};
use crate::SweepError;
use chrono::DateTime;
use std::collections::BTreeMap;
use std::time::Duration;

/// Archive statistics summary
#[derive(Debug, Clone)]
pub struct ArchiveStatistics {
    /// Total number of content records
    pub total_records: u64,

    /// Count of records by status
    pub records_by_status: BTreeMap<RecordStatus, u64>,

    /// Number of tombstoned identifiers
    pub dead_count: u64,

    /// Number of identifiers with a recorded transport error
    pub error_count: u64,

    /// Highest persisted identifier (ascending resume point)
    pub highest_id: Option<i64>,

    /// Lowest persisted identifier (descending resume point)
    pub lowest_id: Option<i64>,

    /// Database size in bytes
    pub database_bytes: u64,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(ArchiveStatistics)` - Successfully loaded statistics
/// * `Err(SweepError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<ArchiveStatistics, SweepError> {
    let mut records_by_status = BTreeMap::new();
    for status in RecordStatus::all_statuses() {
        let count = storage.count_records_by_status(status)?;
        if count > 0 {
            records_by_status.insert(status, count);
        }
    }

    Ok(ArchiveStatistics {
        total_records: records_by_status.values().sum(),
        records_by_status,
        dead_count: storage.count_dead()?,
        error_count: storage.count_errors()?,
        highest_id: storage.resume_point(Direction::Ascending)?,
        lowest_id: storage.resume_point(Direction::Descending)?,
        database_bytes: storage.size_on_disk()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &ArchiveStatistics) {
    println!("=== Archive Statistics ===\n");

    println!("Overview:");
    println!("  Records: {}", stats.total_records);
    println!("  Dead identifiers: {}", stats.dead_count);
    println!("  Recorded transport errors: {}", stats.error_count);
    println!("  Database size: {}", format_bytes(stats.database_bytes));
    println!();

    println!("Records by Status:");
    for (status, count) in &stats.records_by_status {
        let percentage = if stats.total_records > 0 {
            (*count as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    match (stats.lowest_id, stats.highest_id) {
        (Some(low), Some(high)) => {
            println!("Persisted Range: {} ..= {}", low, high);
            println!("  Ascending runs resume at {}", high.saturating_add(1));
            println!("  Descending runs resume at {}", low.saturating_sub(1));
        }
        _ => println!("Persisted Range: (empty)"),
    }
    println!();

    if let Some(run) = &stats.latest_run {
        println!("Latest Run (#{}):", run.id);
        println!("  Range: {} -> {}", run.range_start, run.range_end);
        println!("  Started: {}", run.started_at);
        match &run.finished_at {
            Some(finished) => println!("  Finished: {}", finished),
            None => println!("  Finished: (never, interrupted)"),
        }
        if let Some(duration) = run_duration(run) {
            println!("  Duration: {}", format_duration(duration));
        }
        let status = match run.status {
            RunStatus::Running => "running".to_string(),
            RunStatus::Halted(reason) => format!("halted ({})", reason),
        };
        println!("  Status: {}", status);
        println!("  Live records: {}", run.live_count);
    }
}

/// Wall-clock duration of a finished run
pub fn run_duration(run: &RunRecord) -> Option<Duration> {
    let started = DateTime::parse_from_rfc3339(&run.started_at).ok()?;
    let finished = DateTime::parse_from_rfc3339(run.finished_at.as_deref()?).ok()?;
    (finished - started).to_std().ok()
}

/// Formats a byte count with a binary unit
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
