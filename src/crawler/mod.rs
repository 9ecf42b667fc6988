//! Crawler module for sweeping an identifier range
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching without redirect following
//! - HTML classification of description pages
//! - Outcome resolution and the consecutive-failure breaker
//! - Batch scheduling over a directional range
//! - Overall run coordination

mod breaker;
mod coordinator;
mod fetcher;
mod outcome;
mod parser;
mod scheduler;

pub use breaker::CircuitBreaker;
pub use coordinator::{resume_pointer, Coordinator, RunSummary};
pub use fetcher::{build_http_client, FetchResponse, Fetcher, HttpFetcher, TransportError};
pub use outcome::{is_dead_status, resolve, Outcome};
pub use parser::{Classifier, ExtractedPage, HtmlClassifier, DEFAULT_CATEGORY, DEFAULT_SIZE};
pub use scheduler::{next_batch, RangeScheduler};
