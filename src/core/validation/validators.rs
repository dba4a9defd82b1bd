//! Reusable argument checks
//!
//! Each check looks at one `(arg name, value)` pair. The built-in validators
//! of the chain apply them to every supplied argument.

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

/// Existence check for records referenced by `<entity>_id` arguments
pub trait RecordLookup: Send + Sync {
    /// `entity` is the lowercase prefix of the argument name (`customer` for `customer_id`)
    fn record_exists(&self, entity: &str, id: &str) -> bool;
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%d/%m/%Y"];

/// Check: value is not blank
pub fn present() -> impl Fn(&str, &str) -> bool + Send + Sync + Clone {
    |_: &str, value: &str| !value.trim().is_empty()
}

/// Check: value parses as a calendar date
pub fn date() -> impl Fn(&str, &str) -> bool + Send + Sync + Clone {
    |_: &str, value: &str| parse_date(value).is_some()
}

/// Check: `<entity>_id` arguments reference an existing record; other arguments pass
pub fn record_reference(records: &dyn RecordLookup) -> impl Fn(&str, &str) -> bool + '_ {
    move |arg: &str, value: &str| match referenced_entity(arg) {
        Some(entity) => records.record_exists(entity, value),
        None => true,
    }
}

/// Parse the date formats accepted by filters
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// `customer_id` -> `customer`
pub fn referenced_entity(arg: &str) -> Option<&str> {
    static ENTITY_ID: OnceLock<Regex> = OnceLock::new();
    let regex = ENTITY_ID.get_or_init(|| Regex::new(r"([a-z]+)_id$").unwrap());
    regex
        .captures(arg)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}
