//! Output module for progress reporting and archive summaries
//!
//! This module handles:
//! - Completion fraction, ETA and the per-batch progress line
//! - Archive statistics for `--stats`
//! - Plain-text rendering of listing pages and the category tree

pub mod listing;
pub mod progress;
pub mod stats;

pub use listing::{print_category_tree, print_record_page};
pub use progress::{format_duration, Progress, ProgressReporter};
pub use stats::{load_statistics, print_statistics, ArchiveStatistics};
