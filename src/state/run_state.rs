use crate::SweepError;
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Direction a run walks the identifier space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    /// Infers the direction from the sign of `end - start`
    ///
    /// A single-identifier range (`start == end`) is treated as ascending.
    pub fn from_range(start: i64, end: i64) -> Self {
        if end < start {
            Self::Descending
        } else {
            Self::Ascending
        }
    }

    /// Returns the identifier one step after `id` in this direction
    pub fn step(&self, id: i64) -> i64 {
        match self {
            Self::Ascending => id.saturating_add(1),
            Self::Descending => id.saturating_sub(1),
        }
    }

    /// Like [`Direction::step`], but None once `id` is the last representable identifier
    pub fn checked_step(&self, id: i64) -> Option<i64> {
        match self {
            Self::Ascending => id.checked_add(1),
            Self::Descending => id.checked_sub(1),
        }
    }

    /// Returns true if `pointer` lies beyond `end` in this direction
    pub fn has_passed(&self, pointer: i64, end: i64) -> bool {
        match self {
            Self::Ascending => pointer > end,
            Self::Descending => pointer < end,
        }
    }

    /// Returns whichever of `a` and `b` comes later in this direction
    pub fn furthest(&self, a: i64, b: i64) -> i64 {
        match self {
            Self::Ascending => a.max(b),
            Self::Descending => a.min(b),
        }
    }

    /// Orders two identifiers by visitation order in this direction
    pub fn compare(&self, a: i64, b: i64) -> std::cmp::Ordering {
        match self {
            Self::Ascending => a.cmp(&b),
            Self::Descending => b.cmp(&a),
        }
    }

    /// Sorts identifiers into visitation order for this direction
    pub fn sort(&self, ids: &mut [i64]) {
        ids.sort_unstable_by(|a, b| self.compare(*a, *b));
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HaltReason {
    /// The scheduler produced an empty batch
    RangeExhausted,

    /// The consecutive-failure threshold was reached
    CircuitOpen,

    /// An interrupt was received and the in-flight batch was committed
    Cancelled,

    /// The database grew past the configured cap
    StorageLimit,
}

impl HaltReason {
    /// Converts the reason to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::RangeExhausted => "range_exhausted",
            Self::CircuitOpen => "circuit_open",
            Self::Cancelled => "cancelled",
            Self::StorageLimit => "storage_limit",
        }
    }

    /// Parses a reason from a database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "range_exhausted" => Some(Self::RangeExhausted),
            "circuit_open" => Some(Self::CircuitOpen),
            "cancelled" => Some(Self::Cancelled),
            "storage_limit" => Some(Self::StorageLimit),
            _ => None,
        }
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Lifecycle of a run: `Init -> Running -> Halted(_) -> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    Running,
    Halted(HaltReason),
    Stopped,
}

impl RunPhase {
    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        matches!(
            (self, next),
            (Self::Init, Self::Running)
                | (Self::Running, Self::Halted(_))
                | (Self::Halted(_), Self::Stopped)
        )
    }
}

/// Shared cancellation flag
///
/// Set from the interrupt handler; the run loop only reads it at batch
/// boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the run
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation has been requested
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mutable state of a single run, owned by the coordinator
///
/// The failure streak lives in the coordinator's circuit breaker; the
/// cancellation flag is the only piece written from outside the run loop.
#[derive(Debug)]
pub struct RunState {
    /// First identifier of the configured range
    pub range_start: i64,

    /// Last identifier of the configured range (inclusive)
    pub range_end: i64,

    /// Walk direction, derived from the range
    pub direction: Direction,

    /// Pointer at the moment the run started (after resuming)
    pub initial_pointer: i64,

    /// Next identifier to be scheduled
    pub current_pointer: i64,

    /// LIVE outcomes applied during this run
    pub total_live_count: u64,

    /// When the run loop started
    pub started_at: Instant,

    phase: RunPhase,
    cancel: CancelFlag,
}

impl RunState {
    /// Creates the state for a run over `range_start..=range_end` beginning at `pointer`
    pub fn new(
        range_start: i64,
        range_end: i64,
        direction: Direction,
        pointer: i64,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            range_start,
            range_end,
            direction,
            initial_pointer: pointer,
            current_pointer: pointer,
            total_live_count: 0,
            started_at: Instant::now(),
            phase: RunPhase::Init,
            cancel,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Moves the run to the next lifecycle phase
    pub fn transition(&mut self, next: RunPhase) -> Result<(), SweepError> {
        if !self.phase.can_transition_to(next) {
            return Err(SweepError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }

        tracing::trace!("Run phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Replaces the cancellation flag with one shared with an interrupt handler
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns a handle to the cancellation flag
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_requested()
    }
}
