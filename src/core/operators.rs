//! Filter operations, sort directions and the key scheme built from them

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison applied by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Equals,
    NotEquals,
    Lt,
    Lte,
    Gt,
    Gte,
    DateIsNot,
    DateIs,
    DateBefore,
    DateAfter,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::Equals,
        Operation::NotEquals,
        Operation::Lt,
        Operation::Lte,
        Operation::Gt,
        Operation::Gte,
        Operation::DateIsNot,
        Operation::DateIs,
        Operation::DateBefore,
        Operation::DateAfter,
    ];

    /// Wire code, as used in filter keys and requests
    pub fn code(&self) -> &'static str {
        match self {
            Operation::Equals => "equals",
            Operation::NotEquals => "notequals",
            Operation::Lt => "lt",
            Operation::Lte => "lte",
            Operation::Gt => "gt",
            Operation::Gte => "gte",
            Operation::DateIsNot => "dateisnot",
            Operation::DateIs => "dateis",
            Operation::DateBefore => "datebefore",
            Operation::DateAfter => "dateafter",
        }
    }

    /// Case-insensitive lookup by wire code
    pub fn from_code(code: &str) -> Option<Operation> {
        Operation::ALL
            .into_iter()
            .find(|op| op.code().eq_ignore_ascii_case(code.trim()))
    }

    /// Evaluate the operation for two ordered values
    ///
    /// Date operations map onto the same comparisons as their plain
    /// counterparts.
    pub fn compare<T: PartialOrd + ?Sized>(&self, actual: &T, expected: &T) -> bool {
        match self {
            Operation::Equals | Operation::DateIs => actual == expected,
            Operation::NotEquals | Operation::DateIsNot => actual != expected,
            Operation::Lt | Operation::DateBefore => actual < expected,
            Operation::Lte => actual <= expected,
            Operation::Gt | Operation::DateAfter => actual > expected,
            Operation::Gte => actual >= expected,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Operation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Operation::from_code(s).ok_or_else(|| anyhow!("unknown filter operation '{}'", s))
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn code(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Lookup key for a filter or sort: lowercase concatenation of field and suffix
///
/// `semantic_key("title", "Equals")` is `"titleequals"`.
pub fn semantic_key(field: &str, suffix: &str) -> String {
    let mut key = String::with_capacity(field.len() + suffix.len());
    key.push_str(field);
    key.push_str(suffix);
    key.to_lowercase()
}

/// Parse a date filter value
///
/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (reduced to its date).
pub fn parse_date_value(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.date_naive())
        .map_err(|_| anyhow!("'{}' is not a date (expected YYYY-MM-DD)", value))
}
