//! # Record Normalizer
//!
//! Turns raw catalog records into the values the tracking store persists.
//!
//! Everything here is pure: no I/O, no clock. Catalog data is messy, so the
//! rules are lenient where loss is harmless (blank strings become `None`,
//! stray separators in author lists are dropped) and strict where guessing
//! would corrupt data (an unparseable date rejects the record).

use crate::error::{Result, SyncError};
use bridge_traits::catalog::ExternalRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use core_library::NewBook;

/// Datetime layouts accepted after RFC 3339, tried in order.
const DATETIME_WITH_OFFSET: &str = "%Y-%m-%d %H:%M:%S%.f%:z";
const DATETIME_NAIVE: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATE_ONLY: &str = "%Y-%m-%d";

/// Split a delimited author string into individual names.
///
/// Commas and pipes are equivalent separators. Names are trimmed, empty
/// tokens dropped and order preserved.
///
/// ```
/// use core_sync::normalizer::parse_authors;
///
/// assert_eq!(parse_authors(Some("A, B | C")), vec!["A", "B", "C"]);
/// assert!(parse_authors(None).is_empty());
/// ```
pub fn parse_authors(raw: Option<&str>) -> Vec<String> {
    raw.map(|authors| {
        authors
            .split([',', '|'])
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Parse a catalog date or datetime.
///
/// Absent or blank input yields `Ok(None)`. Values without an offset are
/// taken as UTC; date-only values as midnight UTC.
///
/// # Errors
///
/// Returns the offending value in the error message when no supported layout
/// matches.
pub fn parse_date(raw: Option<&str>) -> std::result::Result<Option<DateTime<Utc>>, String> {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    if let Ok(parsed) = DateTime::parse_from_str(value, DATETIME_WITH_OFFSET) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, DATETIME_NAIVE) {
        return Ok(Some(parsed.and_utc()));
    }

    if let Some(midnight) = NaiveDate::parse_from_str(value, DATE_ONLY)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(Some(midnight.and_utc()));
    }

    Err(format!("unrecognized date '{}'", value))
}

/// Build the persisted form of a catalog record.
///
/// Tags are stored verbatim and the rating is passed through unchanged.
///
/// # Errors
///
/// Returns [`SyncError::InvalidRecord`] when the title is blank, a date
/// cannot be parsed, or the rating is not a finite number.
pub fn normalize_record(record: &ExternalRecord, tags: Vec<String>) -> Result<NewBook> {
    let invalid = |reason: String| SyncError::InvalidRecord {
        external_id: record.id,
        reason,
    };

    let title = record.title.trim();
    if title.is_empty() {
        return Err(invalid("title is empty".to_string()));
    }

    let pubdate = parse_date(record.pubdate.as_deref())
        .map_err(|e| invalid(format!("pubdate: {}", e)))?
        .map(|published| published.date_naive());

    let external_modified_at = parse_date(record.last_modified.as_deref())
        .map_err(|e| invalid(format!("last_modified: {}", e)))?
        .map(|modified| modified.timestamp());

    if let Some(rating) = record.rating {
        if !rating.is_finite() {
            return Err(invalid(format!("rating {} is not a number", rating)));
        }
    }

    Ok(NewBook {
        external_id: record.id,
        title: title.to_string(),
        authors: parse_authors(record.authors.as_deref()),
        path: record.path.clone(),
        isbn: non_blank(&record.isbn),
        publisher: non_blank(&record.publisher),
        series: non_blank(&record.series),
        series_index: record.series_index,
        description: non_blank(&record.description),
        rating: record.rating,
        pubdate,
        has_cover: record.has_cover.unwrap_or(false),
        tags,
        external_modified_at,
    })
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
