//! Range scheduler
//!
//! Cuts a directional closed identifier range into bounded batches. The
//! batch size doubles as the concurrency cap, since every identifier in a
//! batch is dispatched at once.

use crate::state::Direction;

/// Produces the next batch of identifiers starting at `pointer`
///
/// Yields up to `batch_size` identifiers stepping in `direction`, clipped at
/// `range_end` (inclusive). Returns an empty batch once `pointer` has passed
/// `range_end`.
///
/// # Examples
///
/// ```
/// use range_sweep::crawler::next_batch;
/// use range_sweep::Direction;
///
/// assert_eq!(next_batch(100, Direction::Descending, 95, 4), vec![100, 99, 98, 97]);
/// assert_eq!(next_batch(96, Direction::Descending, 95, 4), vec![96, 95]);
/// assert!(next_batch(94, Direction::Descending, 95, 4).is_empty());
/// ```
pub fn next_batch(pointer: i64, direction: Direction, range_end: i64, batch_size: usize) -> Vec<i64> {
    let mut ids = Vec::with_capacity(batch_size);
    if direction.has_passed(pointer, range_end) {
        return ids;
    }

    let mut id = pointer;
    while ids.len() < batch_size {
        ids.push(id);
        if id == range_end {
            break;
        }
        id = direction.step(id);
    }

    ids
}

/// Batch scheduler bound to one run's range
#[derive(Debug, Clone)]
pub struct RangeScheduler {
    direction: Direction,
    range_end: i64,
    batch_size: usize,
}

impl RangeScheduler {
    /// Creates a scheduler; a batch size of 0 is raised to 1
    pub fn new(direction: Direction, range_end: i64, batch_size: usize) -> Self {
        Self {
            direction,
            range_end,
            batch_size: batch_size.max(1),
        }
    }

    pub fn next_batch(&self, pointer: i64) -> Vec<i64> {
        next_batch(pointer, self.direction, self.range_end, self.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Pointer value once the whole range has been attempted
    pub fn target(&self) -> i64 {
        self.direction.step(self.range_end)
    }
}
