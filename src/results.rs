//! Query result payloads and their presentation helpers.

use crate::highlight::Snippet;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Fixed page size for structured rows.
pub const PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryCategory {
    Structured,
    DocumentSearch,
    Combined,
}

impl QueryCategory {
    /// Badge label shown next to a result set.
    pub fn label(&self) -> &'static str {
        match self {
            QueryCategory::Structured => "SQL",
            QueryCategory::DocumentSearch => "Documents",
            QueryCategory::Combined => "Hybrid",
        }
    }
}

impl fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("null"),
            ScalarValue::Bool(b) => write!(f, "{}", b),
            ScalarValue::Int(i) => write!(f, "{}", i),
            ScalarValue::Float(x) => write!(f, "{}", x),
            ScalarValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Text(v.to_string())
    }
}

/// One structured row. Column order is significant: the first row's columns
/// become the table header. Serializes as a JSON object in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    cells: Vec<(String, ScalarValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. A repeated column replaces the earlier value.
    pub fn with(mut self, column: &str, value: impl Into<ScalarValue>) -> Self {
        let value = value.into();
        match self.cells.iter_mut().find(|(c, _)| c == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column.to_string(), value)),
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&ScalarValue> {
        self.cells.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHit {
    /// Source document label, e.g. a file name
    pub source: String,
    pub snippet: Snippet,
}

/// A routed query's payload. Only `Combined` carries both rows and hits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum QueryResult {
    Structured { rows: Vec<Row> },
    DocumentSearch { hits: Vec<DocumentHit> },
    Combined { rows: Vec<Row>, hits: Vec<DocumentHit> },
}

impl QueryResult {
    pub fn category(&self) -> QueryCategory {
        match self {
            QueryResult::Structured { .. } => QueryCategory::Structured,
            QueryResult::DocumentSearch { .. } => QueryCategory::DocumentSearch,
            QueryResult::Combined { .. } => QueryCategory::Combined,
        }
    }

    pub fn rows(&self) -> &[Row] {
        match self {
            QueryResult::Structured { rows } | QueryResult::Combined { rows, .. } => rows,
            QueryResult::DocumentSearch { .. } => &[],
        }
    }

    pub fn hits(&self) -> &[DocumentHit] {
        match self {
            QueryResult::DocumentSearch { hits } | QueryResult::Combined { hits, .. } => hits,
            QueryResult::Structured { .. } => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty() && self.hits().is_empty()
    }

    /// Header for the structured table, taken from the first row.
    pub fn headers(&self) -> Vec<&str> {
        self.rows().first().map(|r| r.columns().collect()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStatus::Hit => f.write_str("cache hit"),
            CacheStatus::Miss => f.write_str("cache miss"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryMetrics {
    #[serde(rename = "elapsedMs", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub cache: CacheStatus,
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

impl QueryMetrics {
    /// Footer line, e.g. `Query took 0.42s (cache miss)`.
    pub fn summary(&self) -> String {
        format!("Query took {:.2}s ({})", self.elapsed.as_secs_f64(), self.cache)
    }
}

/// One page of a sequence, 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<'a, T> {
    pub page: usize,
    pub total_pages: usize,
    pub items: &'a [T],
}

impl<'a, T> Page<'a, T> {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Pagination controls are only shown for more than one page.
    pub fn needs_controls(&self) -> bool {
        self.total_pages > 1
    }
}

/// Slice `items` into `PAGE_SIZE` pages, clamping `page` into range.
pub fn paginate<T>(items: &[T], page: usize) -> Page<'_, T> {
    let total_pages = items.len().div_ceil(PAGE_SIZE);
    let page = page.clamp(1, total_pages.max(1));
    let start = ((page - 1) * PAGE_SIZE).min(items.len());
    let end = (start + PAGE_SIZE).min(items.len());
    Page {
        page,
        total_pages,
        items: &items[start..end],
    }
}
