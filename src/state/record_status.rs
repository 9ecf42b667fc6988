/// Status definitions for persisted crawl records
///
/// Only outcomes that produce a content record carry a status. Dead
/// identifiers are tombstoned separately and transport errors are never
/// stored as records.
use std::fmt;

/// Title fragments that mark an upstream or edge-proxy error page
pub const GATEWAY_ERROR_MARKERS: &[&str] = &[
    "Bad Gateway",
    "Error code 502",
    "Error code 504",
    "Gateway Time-out",
    "Just a moment...",
    "Attention Required! | Cloudflare",
];

/// Returns true if `title` carries any gateway-error marker
pub fn is_gateway_error(title: &str) -> bool {
    GATEWAY_ERROR_MARKERS
        .iter()
        .any(|marker| title.contains(marker))
}

/// Status of a row in the record table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordStatus {
    /// The page parsed and carried a real title
    Live,

    /// The page parsed but had no title, or the title was a gateway error
    Unknown,

    /// The response body was empty or whitespace only
    Blank,
}

impl RecordStatus {
    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Unknown => "unknown",
            Self::Blank => "blank",
        }
    }

    /// Parses a status from a database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "live" => Some(Self::Live),
            "unknown" => Some(Self::Unknown),
            "blank" => Some(Self::Blank),
            _ => None,
        }
    }

    /// Returns all record statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![Self::Live, Self::Unknown, Self::Blank]
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
