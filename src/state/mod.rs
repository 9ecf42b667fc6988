//! State module for tracking run progress
//!
//! # Components
//!
//! - `RecordStatus`: Status stored with each content record (live, unknown, blank)
//! - `Direction`: Which way a run walks the identifier range
//! - `RunState`: Pointer, counters and cancellation flag of the current run
//! - `RunPhase` / `HaltReason`: Run lifecycle and why it ended

mod record_status;
mod run_state;

// Re-export main types
pub use record_status::{is_gateway_error, RecordStatus, GATEWAY_ERROR_MARKERS};
pub use run_state::{CancelFlag, Direction, HaltReason, RunPhase, RunState};
