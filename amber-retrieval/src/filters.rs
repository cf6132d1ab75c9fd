//! Query filter extraction: `#tags`, `date:` ranges, `doc:` references
//! (spec §4.6 step 2). Grounded on
//! `llmspell-context/src/query/analyzer.rs`'s regex-based, early-exit
//! query-understanding style.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#([A-Za-z0-9_-]+)").unwrap());
static DOC_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"doc:([A-Za-z0-9_-]+)").unwrap());
static DATE_RANGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"date:(\d{4}-\d{2}-\d{2})\.\.(\d{4}-\d{2}-\d{2})").unwrap());
static DATE_SINGLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"date:(\d{4}-\d{2}-\d{2})\b").unwrap());

/// Structured filters extracted from a free-text query (spec §4.6
/// step 2), plus the query text with the matched tokens removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilters {
    pub tags: Vec<String>,
    pub document_ids: Vec<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

/// Extracts `#tag`, `doc:id`, and `date:YYYY-MM-DD[..YYYY-MM-DD]`
/// tokens from `query`, returning the structured filters and the
/// remaining text with those tokens stripped.
#[must_use]
pub fn parse_filters(query: &str) -> (QueryFilters, String) {
    let mut filters = QueryFilters::default();
    let mut remaining = query.to_string();

    for capture in TAG_PATTERN.captures_iter(query) {
        filters.tags.push(capture[1].to_string());
    }
    for capture in DOC_PATTERN.captures_iter(query) {
        filters.document_ids.push(capture[1].to_string());
    }

    if let Some(capture) = DATE_RANGE_PATTERN.captures(query) {
        filters.date_from = parse_date_start(&capture[1]);
        filters.date_to = parse_date_end(&capture[2]);
    } else if let Some(capture) = DATE_SINGLE_PATTERN.captures(query) {
        filters.date_from = parse_date_start(&capture[1]);
        filters.date_to = parse_date_end(&capture[1]);
    }

    for pattern in [&*TAG_PATTERN, &*DOC_PATTERN, &*DATE_RANGE_PATTERN, &*DATE_SINGLE_PATTERN] {
        remaining = pattern.replace_all(&remaining, "").to_string();
    }

    (filters, remaining.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn parse_date_start(ymd: &str) -> Option<DateTime<Utc>> {
    chrono::NaiveDate::parse_from_str(ymd, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_date_end(ymd: &str) -> Option<DateTime<Utc>> {
    chrono::NaiveDate::parse_from_str(ymd, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map(|naive| naive.and_utc())
}
