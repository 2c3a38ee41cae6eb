//! Embedded state extraction
//!
//! Result pages carry their data in a single
//! `<script data-mfe-state="true">` element whose text is HTML-entity-encoded
//! JSON. This module locates and decodes that block into a [`PageState`]:
//! - `data.mainCount` is the total number of results
//! - `data.catalog.items` are the raw listing items
//! - `data.catalog.pager.last` is the URL of the last result page
//!
//! A missing or undecodable block is not an error: it yields an empty
//! [`PageState`], meaning "no data on this page".

use crate::storage::ListingRecord;
use scraper::{Html, Selector};
use serde_json::Value;

/// Results shown per page by the upstream site
pub const PAGE_SIZE: u64 = 50;

/// Upstream ceiling on retrievable results per search
pub const MAX_RESULTS: u64 = 5000;

/// Most result pages ever requested for one target
pub const MAX_PAGES: u32 = 100;

const STATE_SELECTOR: &str = r#"script[data-mfe-state="true"]"#;

/// Decoded embedded state of one result page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageState {
    /// Total results reported for the search
    pub total_count: u64,

    /// Listing items on this page; the upstream's leading slot is already dropped
    pub items: Vec<Value>,

    /// URL of the last result page, entity-unescaped
    pub last_page_url: Option<String>,
}

impl PageState {
    /// Number of result pages the search spans
    pub fn pages_count(&self) -> u32 {
        pages_count(self.total_count)
    }

    pub fn is_empty(&self) -> bool {
        self.total_count == 0 && self.items.is_empty() && self.last_page_url.is_none()
    }

    /// Converts the page's items into listing records
    ///
    /// Relative listing paths are resolved against `site_base`.
    pub fn listings(&self, site_base: &str) -> Vec<ListingRecord> {
        self.items
            .iter()
            .map(|item| listing_from_item(item, site_base))
            .collect()
    }
}

/// Computes the number of result pages for a total result count
///
/// The count is capped at [`MAX_RESULTS`] and split into pages of [`PAGE_SIZE`].
///
/// # Example
///
/// ```
/// use listing_harvest::crawler::pages_count;
///
/// assert_eq!(pages_count(120), 3);
/// assert_eq!(pages_count(0), 0);
/// assert_eq!(pages_count(6000), 100);
/// ```
pub fn pages_count(total_count: u64) -> u32 {
    let capped = total_count.min(MAX_RESULTS);
    capped.div_ceil(PAGE_SIZE) as u32
}

/// Returns true if the HTML carries an embedded state block
pub fn has_embedded_state(html: &str) -> bool {
    let document = Html::parse_document(html);
    match Selector::parse(STATE_SELECTOR) {
        Ok(selector) => document.select(&selector).next().is_some(),
        Err(_) => false,
    }
}

/// Extracts the embedded state of a result page
///
/// Never fails: absent or malformed state yields `PageState::default()`.
pub fn extract_page_state(html: &str) -> PageState {
    match decode_state(html) {
        Some(data) => page_state_from_json(&data),
        None => PageState::default(),
    }
}

/// Locates the state script and decodes its JSON
fn decode_state(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(STATE_SELECTOR).ok()?;
    let script = document.select(&selector).next()?;

    let raw = script.text().collect::<String>();
    if raw.trim().is_empty() {
        return None;
    }

    let decoded = html_escape::decode_html_entities(&raw);
    match serde_json::from_str(&decoded) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Embedded state is not valid JSON: {}", e);
            None
        }
    }
}

fn page_state_from_json(state: &Value) -> PageState {
    let data = &state["data"];
    let catalog = &data["catalog"];

    let total_count = match &data["mainCount"] {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };

    let items = catalog["items"]
        .as_array()
        .map(|items| items.iter().skip(1).cloned().collect())
        .unwrap_or_default();

    let last_page_url = catalog["pager"]["last"]
        .as_str()
        .map(|last| last.replace("&amp;", "&"))
        .filter(|last| !last.is_empty());

    PageState {
        total_count,
        items,
        last_page_url,
    }
}

fn listing_from_item(item: &Value, site_base: &str) -> ListingRecord {
    let external_id = match &item["id"] {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    let url = item["urlPath"]
        .as_str()
        .filter(|path| !path.is_empty())
        .map(|path| format!("{}{}", site_base.trim_end_matches('/'), path));

    ListingRecord {
        external_id,
        name: item["title"].as_str().unwrap_or_default().to_string(),
        url,
    }
}
