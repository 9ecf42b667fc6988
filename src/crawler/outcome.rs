//! Outcome resolution
//!
//! Every dispatched identifier resolves to exactly one [`Outcome`]. The
//! resolver is a pure function of the fetch result and the classifier, so
//! replaying a captured response always yields the same outcome.

use crate::config::TransportErrorPolicy;
use crate::crawler::fetcher::{FetchResponse, TransportError};
use crate::crawler::parser::{Classifier, ExtractedPage};
use crate::state::is_gateway_error;
use crate::storage::{BatchWrite, CrawlRecord};

const NOT_FOUND: u16 = 404;

/// Result of visiting one identifier
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Cancellation was requested before the unit was dispatched
    Stop { id: i64 },

    /// The fetch failed below the HTTP layer
    Error { id: i64, message: String },

    /// Empty or whitespace-only body
    Blank { id: i64 },

    /// Redirect or not-found status
    Dead { id: i64, status: u16 },

    /// No usable title; carries the gateway-error title when there was one
    Unknown { id: i64, title: Option<String> },

    /// A real document
    Live { id: i64, page: ExtractedPage },
}

impl Outcome {
    pub fn id(&self) -> i64 {
        match self {
            Self::Stop { id }
            | Self::Error { id, .. }
            | Self::Blank { id }
            | Self::Dead { id, .. }
            | Self::Unknown { id, .. }
            | Self::Live { id, .. } => *id,
        }
    }

    /// Short tag used in per-identifier log lines
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stop { .. } => "STOP",
            Self::Error { .. } => "ERR",
            Self::Blank { .. } => "BLANK",
            Self::Dead { .. } => "DEAD",
            Self::Unknown { .. } => "UNKNOWN",
            Self::Live { .. } => "HIT",
        }
    }

    /// Returns true if the unit was actually attempted
    pub fn was_attempted(&self) -> bool {
        !matches!(self, Self::Stop { .. })
    }

    /// Persistence effect of this outcome, if any
    pub fn to_write(&self, policy: TransportErrorPolicy) -> Option<BatchWrite> {
        match self {
            Self::Stop { .. } => None,
            Self::Error { id, message } => match policy {
                TransportErrorPolicy::Skip => None,
                TransportErrorPolicy::Record => Some(BatchWrite::Error {
                    id: *id,
                    message: message.clone(),
                }),
            },
            Self::Blank { id } => Some(BatchWrite::Record(CrawlRecord::blank(*id))),
            Self::Dead { id, .. } => Some(BatchWrite::Dead(*id)),
            Self::Unknown { id, title } => {
                Some(BatchWrite::Record(CrawlRecord::unknown(*id, title.clone())))
            }
            Self::Live { id, page } => Some(BatchWrite::Record(page.clone().into_record(*id))),
        }
    }
}

/// Returns true for statuses that mark an identifier as permanently gone
pub fn is_dead_status(status: u16) -> bool {
    (300..400).contains(&status) || status == NOT_FOUND
}

/// Maps a fetch result to its outcome
///
/// Precedence: transport error, blank body, dead status, missing or gateway
/// title, live.
pub fn resolve(
    id: i64,
    fetched: &Result<FetchResponse, TransportError>,
    classifier: &dyn Classifier,
) -> Outcome {
    let response = match fetched {
        Ok(response) => response,
        Err(e) => {
            return Outcome::Error {
                id,
                message: e.to_string(),
            }
        }
    };

    if response.body.trim().is_empty() {
        return Outcome::Blank { id };
    }

    if is_dead_status(response.status) {
        return Outcome::Dead {
            id,
            status: response.status,
        };
    }

    match classifier.extract(&response.body) {
        None => Outcome::Unknown { id, title: None },
        Some(page) if is_gateway_error(&page.title) => Outcome::Unknown {
            id,
            title: Some(page.title),
        },
        Some(page) => Outcome::Live { id, page },
    }
}
