//! Timestamp encodings found in the roster, and the retention cutoff.

use anyhow::{Context, Result};
use chrono::{Datelike, Months, NaiveDate, NaiveTime};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// `YYYY-MM-DD`, optionally followed by a time of day.
static ISO_DATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})(?:[ T](\d{2}:\d{2}:\d{2}))?")
        .expect("ISO date pattern is a valid regex")
});

/// Leading `YYYYMMDD` of an LDAP-style generalized time.
static COMPACT_DATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{8})").expect("compact date pattern is a valid regex")
});

/// Why a roster timestamp could not be turned into a date
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("timestamp is empty")]
    Empty,
    #[error("unrecognized timestamp encoding {0:?}")]
    UnrecognizedEncoding(String),
    #[error("{0:?} is not a calendar date")]
    InvalidDate(String),
}

/// The timestamp encodings accepted in the roster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// `YYYYMMDD`, possibly followed by more digits (`20161007172147`)
    CompactDigits(NaiveDate),
    /// `YYYY-MM-DD` with an optional ` hh:mm:ss`
    IsoDateTime(NaiveDate, Option<NaiveTime>),
}

impl Timestamp {
    /// Parse a value that must start with an 8-digit `YYYYMMDD` date.
    pub fn parse_compact(raw: &str) -> Result<Self, TimestampError> {
        if raw.is_empty() {
            return Err(TimestampError::Empty);
        }

        let digits = COMPACT_DATE_PREFIX
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| TimestampError::UnrecognizedEncoding(raw.to_string()))?
            .as_str();

        NaiveDate::parse_from_str(digits, "%Y%m%d")
            .map(Timestamp::CompactDigits)
            .map_err(|_| TimestampError::InvalidDate(digits.to_string()))
    }

    /// Parse either encoding. A `YYYY-MM-DD` prefix wins; anything else is
    /// treated as a compact digit string.
    pub fn parse(raw: &str) -> Result<Self, TimestampError> {
        if raw.is_empty() {
            return Err(TimestampError::Empty);
        }

        let Some(caps) = ISO_DATE_PREFIX.captures(raw) else {
            return Self::parse_compact(raw);
        };

        let date_str = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .map_err(|_| TimestampError::InvalidDate(date_str.to_string()))?;
        // Only the date decides retention; an unreadable time of day is dropped.
        let time = caps
            .get(2)
            .and_then(|m| NaiveTime::parse_from_str(m.as_str(), "%H:%M:%S").ok());

        Ok(Timestamp::IsoDateTime(date, time))
    }

    /// Calendar date of this timestamp
    pub fn date(&self) -> NaiveDate {
        match self {
            Timestamp::CompactDigits(date) | Timestamp::IsoDateTime(date, _) => *date,
        }
    }
}

/// The date before which an account counts as stale.
///
/// The threshold is computed by calendar subtraction, so "12 months before
/// 2024-02-29" is 2023-02-28 rather than a fixed number of seconds earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionCutoff {
    threshold: NaiveDate,
}

impl RetentionCutoff {
    /// Cutoff lying `months` calendar months before `today`
    pub fn months_before(today: NaiveDate, months: u32) -> Result<Self> {
        let threshold = today
            .checked_sub_months(Months::new(months))
            .with_context(|| format!("Cannot go back {} months from {}", months, today))?;
        Ok(RetentionCutoff { threshold })
    }

    pub fn threshold(&self) -> NaiveDate {
        self.threshold
    }

    /// True when `date` lies strictly before the threshold. A date equal to the
    /// threshold is still retained.
    pub fn has_expired(&self, date: NaiveDate) -> bool {
        date < self.threshold
    }
}

/// Parse a date string in YYYY-MM-DD format (used for `--as-of`)
pub fn parse_date(date_str: &str) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").with_context(|| {
        format!(
            "Invalid date format. Expected YYYY-MM-DD, got: {}",
            date_str
        )
    })?;

    let year = date.year();
    if !(1970..=2100).contains(&year) {
        anyhow::bail!("Year must be between 1970 and 2100, got: {}", year);
    }

    Ok(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ============ Timestamp tests ============

    #[test]
    fn test_parse_compact_date_only() {
        let ts = Timestamp::parse_compact("20161007").unwrap();
        assert_eq!(ts, Timestamp::CompactDigits(ymd(2016, 10, 7)));
    }

    #[test]
    fn test_parse_compact_with_time_suffix() {
        let ts = Timestamp::parse_compact("20161007172147").unwrap();
        assert_eq!(ts.date(), ymd(2016, 10, 7));
    }

    #[test]
    fn test_parse_compact_rejects_iso() {
        let result = Timestamp::parse_compact("2016-10-07");
        assert_eq!(
            result,
            Err(TimestampError::UnrecognizedEncoding("2016-10-07".to_string()))
        );
    }

    #[test]
    fn test_parse_compact_impossible_date() {
        let result = Timestamp::parse_compact("20230231");
        assert_eq!(result, Err(TimestampError::InvalidDate("20230231".to_string())));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Timestamp::parse(""), Err(TimestampError::Empty));
        assert_eq!(Timestamp::parse_compact(""), Err(TimestampError::Empty));
    }

    #[test]
    fn test_parse_iso_with_time() {
        let ts = Timestamp::parse("2024-12-01 10:00:00").unwrap();
        assert_eq!(
            ts,
            Timestamp::IsoDateTime(
                ymd(2024, 12, 1),
                Some(NaiveTime::from_hms_opt(10, 0, 0).unwrap())
            )
        );
    }

    #[test]
    fn test_parse_iso_date_only() {
        let ts = Timestamp::parse("2024-12-01").unwrap();
        assert_eq!(ts, Timestamp::IsoDateTime(ymd(2024, 12, 1), None));
    }

    #[test]
    fn test_parse_falls_back_to_compact() {
        let ts = Timestamp::parse("20240315093000").unwrap();
        assert_eq!(ts, Timestamp::CompactDigits(ymd(2024, 3, 15)));
    }

    #[test]
    fn test_parse_iso_invalid_month() {
        let result = Timestamp::parse("2024-13-01 10:00:00");
        assert_eq!(result, Err(TimestampError::InvalidDate("2024-13-01".to_string())));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            Timestamp::parse("never"),
            Err(TimestampError::UnrecognizedEncoding(_))
        ));
    }

    // ============ RetentionCutoff tests ============

    #[test]
    fn test_cutoff_one_year() {
        let cutoff = RetentionCutoff::months_before(ymd(2025, 1, 1), 12).unwrap();
        assert_eq!(cutoff.threshold(), ymd(2024, 1, 1));
    }

    #[test]
    fn test_cutoff_leap_day_clamps() {
        let cutoff = RetentionCutoff::months_before(ymd(2024, 2, 29), 12).unwrap();
        assert_eq!(cutoff.threshold(), ymd(2023, 2, 28));
    }

    #[test]
    fn test_cutoff_boundary_is_retained() {
        let cutoff = RetentionCutoff::months_before(ymd(2025, 1, 1), 12).unwrap();
        assert!(!cutoff.has_expired(ymd(2024, 1, 1)));
        assert!(cutoff.has_expired(ymd(2023, 12, 31)));
        assert!(!cutoff.has_expired(ymd(2024, 12, 1)));
    }

    // ============ parse_date tests ============

    #[test]
    fn test_parse_date_valid() {
        assert_eq!(parse_date("2025-01-15").unwrap(), ymd(2025, 1, 15));
    }

    #[test]
    fn test_parse_date_invalid_format() {
        let result = parse_date("01-15-2025");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid date format"));
    }

    #[test]
    fn test_parse_date_year_too_old() {
        let result = parse_date("1900-01-01");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Year must be between"));
    }
}
