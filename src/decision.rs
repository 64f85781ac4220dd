//! Retention policy: decide whether an account is kept or backed up and removed.

use crate::exclusions::ExclusionSet;
use crate::record::AccountRecord;
use crate::time::{RetentionCutoff, Timestamp, TimestampError};
use chrono::NaiveDate;
use std::fmt;

/// Status value that allows an account that has logged in to be removed
pub const CLOSED_STATUS: &str = "closed";

/// Marker in the notes column that protects an account
pub const NEVER_DISABLE_MARKER: &str = "never_disable";

/// Which roster column a date came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    CreatedAt,
    LastLogin,
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateField::CreatedAt => write!(f, "creation date"),
            DateField::LastLogin => write!(f, "last login"),
        }
    }
}

/// Outcome of the retention policy for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetentionDecision {
    Excluded,
    NeverDisable,
    /// Never logged in, but created too recently
    TooYoung { created: NaiveDate },
    /// Has logged in and the status is anything but `closed`
    StillActiveStatus { status: String },
    /// Closed, but logged in too recently
    StillActiveLogin { last_login: NaiveDate },
    DateParseError {
        field: DateField,
        raw: String,
        error: TimestampError,
    },
    /// Stale; `date` is the creation or last-login date that made it so
    Eligible { basis: DateField, date: NaiveDate },
}

impl RetentionDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, RetentionDecision::Eligible { .. })
    }

    /// The date the decision was based on, if one was computed
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            RetentionDecision::TooYoung { created } => Some(*created),
            RetentionDecision::StillActiveLogin { last_login } => Some(*last_login),
            RetentionDecision::Eligible { date, .. } => Some(*date),
            _ => None,
        }
    }

    /// Short machine-friendly name, used for counters
    pub fn kind(&self) -> &'static str {
        match self {
            RetentionDecision::Excluded => "excluded",
            RetentionDecision::NeverDisable => "never_disable",
            RetentionDecision::TooYoung { .. } => "too_young",
            RetentionDecision::StillActiveStatus { .. } => "active_status",
            RetentionDecision::StillActiveLogin { .. } => "active_login",
            RetentionDecision::DateParseError { .. } => "date_error",
            RetentionDecision::Eligible { .. } => "eligible",
        }
    }
}

impl fmt::Display for RetentionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionDecision::Excluded => write!(f, "skipped, listed in exclusion file"),
            RetentionDecision::NeverDisable => {
                write!(f, "skipped, notes contain {}", NEVER_DISABLE_MARKER)
            }
            RetentionDecision::TooYoung { created } => {
                write!(f, "skipped, never logged in but created {} (too recent)", created)
            }
            RetentionDecision::StillActiveStatus { status } => {
                let status = if status.is_empty() { "<empty>" } else { status };
                write!(f, "skipped, status is {} (not {})", status, CLOSED_STATUS)
            }
            RetentionDecision::StillActiveLogin { last_login } => {
                write!(f, "skipped, last login {} (too recent)", last_login)
            }
            RetentionDecision::DateParseError { field, raw, error } => {
                write!(f, "skipped, cannot parse {} {:?}: {}", field, raw, error)
            }
            RetentionDecision::Eligible { basis, date } => match basis {
                DateField::CreatedAt => {
                    write!(f, "eligible, never logged in, created {}", date)
                }
                DateField::LastLogin => write!(f, "eligible, closed, last login {}", date),
            },
        }
    }
}

/// Apply the retention policy. The first matching rule wins:
///
/// 1. excluded address
/// 2. `never_disable` in notes
/// 3. never logged in: eligible once the creation date is before the cutoff
/// 4. logged in: only `closed` accounts whose last login is before the cutoff
pub fn decide(
    record: &AccountRecord,
    exclusions: &ExclusionSet,
    cutoff: &RetentionCutoff,
) -> RetentionDecision {
    if exclusions.contains(&record.email) {
        return RetentionDecision::Excluded;
    }

    if record.notes.contains(NEVER_DISABLE_MARKER) {
        return RetentionDecision::NeverDisable;
    }

    if record.never_logged_in() {
        let created = match Timestamp::parse_compact(&record.created_at) {
            Ok(ts) => ts.date(),
            Err(error) => {
                return RetentionDecision::DateParseError {
                    field: DateField::CreatedAt,
                    raw: record.created_at.clone(),
                    error,
                }
            }
        };

        if !cutoff.has_expired(created) {
            return RetentionDecision::TooYoung { created };
        }
        return RetentionDecision::Eligible {
            basis: DateField::CreatedAt,
            date: created,
        };
    }

    if record.status != CLOSED_STATUS {
        return RetentionDecision::StillActiveStatus {
            status: record.status.clone(),
        };
    }

    let last_login = match Timestamp::parse(&record.last_login) {
        Ok(ts) => ts.date(),
        Err(error) => {
            return RetentionDecision::DateParseError {
                field: DateField::LastLogin,
                raw: record.last_login.clone(),
                error,
            }
        }
    };

    if !cutoff.has_expired(last_login) {
        return RetentionDecision::StillActiveLogin { last_login };
    }

    RetentionDecision::Eligible {
        basis: DateField::LastLogin,
        date: last_login,
    }
}
