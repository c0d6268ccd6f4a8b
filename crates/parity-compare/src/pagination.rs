//! Marker-based pagination consistency
//!
//! Paged endpoints return a collection plus an optional `marker`; passing
//! the marker back resumes where the previous page stopped. Following the
//! markers from the first page until none is returned must reproduce the
//! collection an unpaged fetch returns, with no item skipped or repeated.
//!
//! Markers are opaque: the full node and the secondary server use different
//! encodings (strings, objects), so only presence and round-trip behaviour
//! are ever inspected.

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Upper bound on pages followed before paging is declared non-terminating
pub const DEFAULT_MAX_PAGES: usize = 64;

/// Field holding the continuation token in a paged response
const MARKER_FIELD: &str = "marker";

/// Errors raised while collecting pages from a server
#[derive(Debug, Error)]
pub enum PaginationError {
    /// A response did not contain the collection field
    #[error("page {page} has no '{key}' collection")]
    MissingCollection { page: usize, key: String },

    /// The collection field was not an array
    #[error("page {page} field '{key}' is not an array")]
    NotACollection { page: usize, key: String },

    /// The server kept returning a marker past the page limit
    #[error("pagination did not terminate after {pages} pages")]
    Unterminated { pages: usize },

    /// The server returned the marker it was just given
    #[error("page {page} returned the same marker it was requested with: {marker}")]
    RepeatedMarker { page: usize, marker: Value },

    /// The caller's fetch failed
    #[error("fetching page {page} failed: {source}")]
    Fetch {
        page: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// One page of a paged endpoint: its items and the marker for the next page
#[derive(Debug, Clone, PartialEq)]
pub struct PagedResult {
    pub items: Vec<Value>,
    pub marker: Option<Value>,
}

impl PagedResult {
    /// Build a page, treating a null or empty-string marker as absent
    pub fn new(items: Vec<Value>, marker: Option<Value>) -> Self {
        Self {
            items,
            marker: marker.and_then(normalize_marker),
        }
    }

    /// Extract a page from a response tree
    ///
    /// `key` names the field holding the collection (`ledger_data` uses
    /// `state`, `account_tx` uses `transactions`, and so on).
    pub fn from_response(response: &Value, key: &str) -> Result<Self, PaginationError> {
        Self::from_response_at(response, key, 0)
    }

    fn from_response_at(response: &Value, key: &str, page: usize) -> Result<Self, PaginationError> {
        let collection = response
            .get(key)
            .ok_or_else(|| PaginationError::MissingCollection {
                page,
                key: key.to_string(),
            })?;
        let items = collection
            .as_array()
            .ok_or_else(|| PaginationError::NotACollection {
                page,
                key: key.to_string(),
            })?
            .clone();

        Ok(Self::new(items, response.get(MARKER_FIELD).cloned()))
    }

    pub fn has_marker(&self) -> bool {
        self.marker.is_some()
    }
}

fn normalize_marker(marker: Value) -> Option<Value> {
    match &marker {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        _ => Some(marker),
    }
}

/// Fetch pages by following markers until the server stops returning one
///
/// `fetch` is called with `None` for the first page and with the previous
/// page's marker afterwards; it is responsible for applying any `limit`.
/// At most `max_pages` pages are fetched.
pub async fn follow_markers<F, Fut, E>(
    key: &str,
    max_pages: usize,
    mut fetch: F,
) -> Result<Vec<PagedResult>, PaginationError>
where
    F: FnMut(Option<Value>) -> Fut,
    Fut: Future<Output = Result<Value, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut pages: Vec<PagedResult> = Vec::new();
    let mut marker: Option<Value> = None;

    for page in 0..max_pages {
        trace!(page, marker = ?marker, "Fetching page");
        let response = fetch(marker.clone())
            .await
            .map_err(|e| PaginationError::Fetch {
                page,
                source: Box::new(e),
            })?;
        let result = PagedResult::from_response_at(&response, key, page)?;

        if let (Some(previous), Some(next)) = (&marker, &result.marker) {
            if previous == next {
                warn!(page, marker = %next, "Server returned the marker it was given");
                return Err(PaginationError::RepeatedMarker {
                    page,
                    marker: next.clone(),
                });
            }
        }

        marker = result.marker.clone();
        pages.push(result);

        if marker.is_none() {
            debug!(pages = pages.len(), "Pagination complete");
            return Ok(pages);
        }
    }

    warn!(max_pages, "Pagination did not terminate");
    Err(PaginationError::Unterminated { pages: max_pages })
}

/// How page contents are matched against the full collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PartitionOrder {
    /// Concatenated pages must equal the full collection item for item
    #[default]
    Ordered,
    /// Concatenated pages must hold the same items, in any order
    ///
    /// Only for endpoints whose ordering is not stable across requests.
    Unordered,
}

/// A structural problem with a sequence of pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionViolation {
    /// The last page still carries a marker
    Unterminated { page: usize },
    /// A page before the last carries no marker
    PrematureEnd { page: usize },
    /// Concatenated pages and the full collection differ in length
    LengthMismatch { expected: usize, actual: usize },
    /// First index at which the ordered sequences disagree
    OrderMismatch { index: usize },
    /// No pages were supplied
    NoPages,
    /// The full fetch itself carried a marker, so it is not the whole collection
    TruncatedFull,
}

impl std::fmt::Display for PartitionViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionViolation::Unterminated { page } => {
                write!(f, "last page {} still has a marker", page)
            }
            PartitionViolation::PrematureEnd { page } => {
                write!(f, "page {} has no marker but more pages follow", page)
            }
            PartitionViolation::LengthMismatch { expected, actual } => {
                write!(f, "expected {} items, pages hold {}", expected, actual)
            }
            PartitionViolation::OrderMismatch { index } => {
                write!(f, "item {} differs from the full collection", index)
            }
            PartitionViolation::NoPages => write!(f, "no pages"),
            PartitionViolation::TruncatedFull => {
                write!(f, "full fetch returned a marker and is incomplete")
            }
        }
    }
}

/// Outcome of checking pages against a full fetch
#[derive(Debug, Clone, Default)]
pub struct PartitionReport {
    pub passed: bool,
    pub page_count: usize,
    pub item_count: usize,
    /// Items in the full collection that no page returned
    pub missing: Vec<Value>,
    /// Items returned by a page that the full collection lacks
    pub unexpected: Vec<Value>,
    /// Items returned by pages more often than the full collection holds them
    pub duplicates: Vec<Value>,
    pub violations: Vec<PartitionViolation>,
}

impl PartitionReport {
    /// Print a summary of the check
    pub fn print_summary(&self, name: &str) {
        if self.passed {
            println!(
                "✅ {} - PASS ({} items in {} pages)",
                name, self.item_count, self.page_count
            );
            return;
        }

        println!("❌ {} - FAIL", name);
        for violation in &self.violations {
            println!("   [PAGING] {}", violation);
        }
        for item in &self.missing {
            println!("   [MISSING] {}", item);
        }
        for item in &self.unexpected {
            println!("   [  EXTRA] {}", item);
        }
        for item in &self.duplicates {
            println!("   [  DUPED] {}", item);
        }
    }
}

/// Check that `pages` partition `full` without gaps or duplicates
pub fn verify_partition(
    full: &PagedResult,
    pages: &[PagedResult],
    order: PartitionOrder,
) -> PartitionReport {
    let mut report = PartitionReport {
        page_count: pages.len(),
        ..Default::default()
    };

    if full.has_marker() {
        report.violations.push(PartitionViolation::TruncatedFull);
    }
    if pages.is_empty() {
        report.violations.push(PartitionViolation::NoPages);
        return report;
    }

    let last = pages.len() - 1;
    for (page, result) in pages.iter().enumerate() {
        if page < last && !result.has_marker() {
            report.violations.push(PartitionViolation::PrematureEnd { page });
        }
        if page == last && result.has_marker() {
            report.violations.push(PartitionViolation::Unterminated { page });
        }
    }

    let paged: Vec<&Value> = pages.iter().flat_map(|p| p.items.iter()).collect();
    report.item_count = paged.len();

    if paged.len() != full.items.len() {
        report.violations.push(PartitionViolation::LengthMismatch {
            expected: full.items.len(),
            actual: paged.len(),
        });
    }

    if order == PartitionOrder::Ordered {
        if let Some(index) = paged
            .iter()
            .zip(full.items.iter())
            .position(|(paged_item, full_item)| *paged_item != full_item)
        {
            report.violations.push(PartitionViolation::OrderMismatch { index });
        }
    }

    tally_items(&full.items, &paged, &mut report);

    report.passed = report.violations.is_empty()
        && report.missing.is_empty()
        && report.unexpected.is_empty()
        && report.duplicates.is_empty();

    if !report.passed {
        debug!(
            violations = report.violations.len(),
            missing = report.missing.len(),
            unexpected = report.unexpected.len(),
            duplicates = report.duplicates.len(),
            "Partition check failed"
        );
    }

    report
}

/// Check raw responses, extracting the collection under `key` from each
pub fn verify_response_partition(
    full: &Value,
    pages: &[Value],
    key: &str,
    order: PartitionOrder,
) -> Result<PartitionReport, PaginationError> {
    let full = PagedResult::from_response(full, key)?;
    let pages = pages
        .iter()
        .enumerate()
        .map(|(page, response)| PagedResult::from_response_at(response, key, page))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(verify_partition(&full, &pages, order))
}

/// Multiset difference between the full collection and the paged items
///
/// `serde_json::Value` is not hashable, so items are keyed by their
/// serialization; object keys serialize in sorted order.
fn tally_items(full: &[Value], paged: &[&Value], report: &mut PartitionReport) {
    let mut counts: HashMap<String, (i64, i64, &Value)> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for item in full {
        let key = item.to_string();
        let entry = counts.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (0, 0, item)
        });
        entry.0 += 1;
    }
    for item in paged {
        let key = item.to_string();
        let entry = counts.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (0, 0, *item)
        });
        entry.1 += 1;
    }

    for key in &order {
        let (in_full, in_pages, item) = counts[key];
        if in_pages < in_full {
            report.missing.push(item.clone());
        } else if in_full == 0 {
            report.unexpected.push(item.clone());
        } else if in_pages > in_full {
            report.duplicates.push(item.clone());
        }
    }
}
