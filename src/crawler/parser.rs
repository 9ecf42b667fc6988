//! HTML classifier for description pages
//!
//! Pulls the structured fields of a description page out of the raw body.
//! A page without a title element is reported as absent; every other field
//! falls back to a default when it cannot be found.

use crate::state::RecordStatus;
use crate::storage::{CategoryPath, CrawlRecord};
use chrono::Utc;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Category stored when the page has no `Type:` entry
pub const DEFAULT_CATEGORY: &str = "Unknown";

/// Size stored when the page has no `Size:` entry
pub const DEFAULT_SIZE: &str = "N/A";

/// Structured fields of a description page
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub title: String,
    pub category: CategoryPath,
    pub size: String,
    pub seeders: u32,
    pub magnet: Option<String>,
}

impl ExtractedPage {
    /// Turns the extracted fields into a live record for `id`
    pub fn into_record(self, id: i64) -> CrawlRecord {
        CrawlRecord {
            id,
            title: self.title,
            category: self.category,
            size: self.size,
            seeders: self.seeders,
            magnet: self.magnet,
            status: RecordStatus::Live,
            recorded_at: Utc::now(),
        }
    }
}

/// Capability that turns a response body into structured fields
///
/// Returns None when the body has no canonical title field.
pub trait Classifier: Send + Sync {
    fn extract(&self, body: &str) -> Option<ExtractedPage>;
}

/// Classifier for the mirror's HTML description pages
#[derive(Debug, Clone)]
pub struct HtmlClassifier {
    size_pattern: Regex,
    seeders_pattern: Regex,
}

impl HtmlClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            size_pattern: Regex::new(r"(?i)Size:\s*(.*?Bytes)")?,
            seeders_pattern: Regex::new(r"(?i)Seeders:\s*(\d+)")?,
        })
    }
}

impl Classifier for HtmlClassifier {
    fn extract(&self, body: &str) -> Option<ExtractedPage> {
        let document = Html::parse_document(body);

        let title = extract_title(&document)?;
        let text: String = document.root_element().text().collect();

        let category = extract_category(&document)
            .unwrap_or_else(|| CategoryPath::parse(DEFAULT_CATEGORY));

        let size = self
            .size_pattern
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| DEFAULT_SIZE.to_string());

        let seeders = self
            .seeders_pattern
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);

        Some(ExtractedPage {
            title,
            category,
            size,
            seeders,
            magnet: extract_magnet(&document),
        })
    }
}

/// Title from `div#title`, falling back to the first `h1`
fn extract_title(document: &Html) -> Option<String> {
    ["div#title", "h1"].iter().find_map(|selector| {
        let selector = Selector::parse(selector).ok()?;
        document
            .select(&selector)
            .next()
            .map(|element| collapse_text(&element))
            .filter(|s| !s.is_empty())
    })
}

/// Category from the `dd` that follows the `Type:` label
fn extract_category(document: &Html) -> Option<CategoryPath> {
    let dt_selector = Selector::parse("dt").ok()?;

    let label = document
        .select(&dt_selector)
        .find(|dt| collapse_text(dt).to_lowercase().contains("type:"))?;

    let value = label
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == "dd")?;

    let path = CategoryPath::parse(&collapse_text(&value));
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

fn extract_magnet(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"a[href^="magnet:?xt=urn:btih:"]"#).ok()?;

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .map(str::to_string)
}

/// Concatenates the trimmed text nodes of an element
fn collapse_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
