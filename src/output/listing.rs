//! Plain-text rendering of the read side
//!
//! Used by `--list` to browse the archive page by page.

use crate::storage::{CategoryPath, CrawlRecord, RecordPage};
use std::collections::BTreeMap;

const TITLE_WIDTH: usize = 60;

/// Renders one listing row: id, seeders, size, category and title
pub fn format_record_row(record: &CrawlRecord) -> String {
    let title: String = record.title.chars().take(TITLE_WIDTH).collect();
    format!(
        "{:>10}  {:>6}  {:<24}  {:<28}  {}",
        record.id,
        record.seeders,
        record.size,
        record.category.to_string(),
        title
    )
}

/// Renders the breadcrumb trail of a category filter, e.g. `Video / HD`
pub fn format_breadcrumbs(category: &CategoryPath) -> String {
    category
        .ancestors()
        .iter()
        .filter_map(|path| path.segments().last().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" / ")
}

/// Prints one page of listing results to stdout
pub fn print_record_page(page: &RecordPage, category: Option<&CategoryPath>) {
    if let Some(category) = category {
        println!("Category: {}", format_breadcrumbs(category));
    }

    println!(
        "Page {} of {} ({} matching records)\n",
        page.page, page.total_pages, page.total_count
    );

    println!(
        "{:>10}  {:>6}  {:<24}  {:<28}  {}",
        "ID", "SEEDS", "SIZE", "CATEGORY", "TITLE"
    );
    for record in &page.records {
        println!("{}", format_record_row(record));
        if let Some(magnet) = &record.magnet {
            println!("{:>10}  {}", "", magnet);
        }
    }
}

/// Prints every known category grouped under its top-level segment
pub fn print_category_tree(tree: &BTreeMap<String, Vec<CategoryPath>>) {
    println!("Categories:");
    for (root, paths) in tree {
        println!("  {}", root);
        for path in paths.iter().filter(|p| p.depth() > 1) {
            println!("    {}", path);
        }
    }
}
