//! Calendar helpers for daily logs and history periods.
//!
//! Days are keyed by their UTC calendar date formatted as `YYYY-MM-DD`.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Format a date as `YYYY-MM-DD`.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] if the string is not a valid date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| Error::InvalidDate {
        value: value.to_string(),
    })
}

/// Today's UTC date.
#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Today's UTC date formatted as `YYYY-MM-DD`.
#[must_use]
pub fn current_date() -> String {
    format_date(today())
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// The `days` dates ending at `end`, oldest first.
#[must_use]
pub fn trailing_dates(end: NaiveDate, days: u32) -> Vec<String> {
    (0..i64::from(days))
        .rev()
        .map(|offset| format_date(end - Duration::days(offset)))
        .collect()
}

/// The last seven days ending at `today`, oldest first.
#[must_use]
pub fn week_dates(today: NaiveDate) -> Vec<String> {
    trailing_dates(today, 7)
}

/// The last thirty days ending at `today`, oldest first.
#[must_use]
pub fn month_dates(today: NaiveDate) -> Vec<String> {
    trailing_dates(today, 30)
}

/// Short display form such as `Jan 5`.
///
/// Strings that do not parse as dates are returned unchanged.
#[must_use]
pub fn format_for_display(value: &str) -> String {
    match parse_date(value) {
        Ok(date) => format!(
            "{} {}",
            MONTH_ABBREVIATIONS[date.month0() as usize],
            date.day()
        ),
        Err(_) => value.to_string(),
    }
}

/// A history window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Today only.
    #[default]
    Daily,
    /// The last seven days.
    Weekly,
    /// The last thirty days.
    Monthly,
}

impl Period {
    /// The dates covered by this period, oldest first.
    #[must_use]
    pub fn dates(self, today: NaiveDate) -> Vec<String> {
        match self {
            Self::Daily => vec![format_date(today)],
            Self::Weekly => week_dates(today),
            Self::Monthly => month_dates(today),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}
