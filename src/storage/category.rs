//! Hierarchical category paths
//!
//! Categories are kept as an ordered list of segments. The persisted form
//! joins them with [`CATEGORY_SEPARATOR`], so `["Video", "HD - Movies"]` is
//! stored as `Video > HD - Movies`.

use std::fmt;

/// Separator used in the persisted form of a category path
pub const CATEGORY_SEPARATOR: &str = " > ";

/// An ordered list of category segments, root first
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CategoryPath {
    segments: Vec<String>,
}

impl CategoryPath {
    /// Builds a path from segments, trimming each and dropping empty ones
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments = segments
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { segments }
    }

    /// Parses a separator-joined path such as `Audio > Music`
    ///
    /// Whitespace around `>` is not significant, so `Audio>Music` parses to
    /// the same path.
    pub fn parse(s: &str) -> Self {
        Self::new(s.split('>'))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Top-level segment, if any
    pub fn root(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// The path one level up, or None for a root or empty path
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Every prefix of this path from the root down to the path itself
    ///
    /// # Examples
    ///
    /// ```
    /// use range_sweep::storage::CategoryPath;
    ///
    /// let crumbs = CategoryPath::parse("Video > Movies > HD").ancestors();
    /// let joined: Vec<String> = crumbs.iter().map(|c| c.to_string()).collect();
    /// assert_eq!(joined, vec!["Video", "Video > Movies", "Video > Movies > HD"]);
    /// ```
    pub fn ancestors(&self) -> Vec<Self> {
        (1..=self.segments.len())
            .map(|len| Self {
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }

    /// Returns true if `other` is a strict descendant of this path
    pub fn is_ancestor_of(&self, other: &CategoryPath) -> bool {
        !self.is_empty()
            && other.segments.len() > self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Returns true if `other` is this path or one of its descendants
    pub fn contains(&self, other: &CategoryPath) -> bool {
        self == other || self.is_ancestor_of(other)
    }

    /// Persisted, separator-joined form
    pub fn to_db_string(&self) -> String {
        self.segments.join(CATEGORY_SEPARATOR)
    }
}

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_db_string())
    }
}
