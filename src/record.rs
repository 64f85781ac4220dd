//! Roster parsing: one `AccountRecord` per data line.

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Field separator used by the roster export
pub const DELIMITER: char = ';';

/// Number of positional columns in a roster row
const FIELD_COUNT: usize = 6;

/// Generalized time such as `20161007172147Z` or `20161007172147.846Z`
static GENERALIZED_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{8})\d*(?:\.\d+)?Z?$").expect("generalized time pattern is a valid regex")
});

/// Trailing fractional seconds plus `Z`, or a bare `Z`
static ZONE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\.\d+)?Z$").expect("zone suffix pattern is a valid regex")
});

/// One roster row, normalized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountRecord {
    /// Identity key, all whitespace removed
    pub email: String,
    /// `YYYYMMDD` when the raw value was a generalized time, otherwise the raw value
    pub created_at: String,
    /// Lower-cased; only `closed` matters
    pub status: String,
    /// Lower-cased free text. `decide` matches it as-is, so records built
    /// without `normalize` must already be lower-case.
    pub notes: String,
    /// Empty when the account never logged in
    pub last_login: String,
    pub display_name: String,
}

impl AccountRecord {
    /// Normalize one delimiter-separated row. Missing trailing fields are empty.
    pub fn normalize(raw_row: &str) -> Self {
        let mut fields = raw_row.splitn(FIELD_COUNT, DELIMITER);
        let mut next = || fields.next().unwrap_or_default();

        let email = strip_whitespace(next());
        let created_at = normalize_created_at(next());
        let status = strip_whitespace(next()).to_lowercase();
        let notes = strip_whitespace(next()).to_lowercase();
        let last_login = normalize_last_login(next());
        let display_name = next().trim().to_string();

        AccountRecord {
            email,
            created_at,
            status,
            notes,
            last_login,
            display_name,
        }
    }

    pub fn never_logged_in(&self) -> bool {
        self.last_login.is_empty()
    }
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Reduce a generalized time to its leading `YYYYMMDD`
pub fn normalize_created_at(raw: &str) -> String {
    let raw = raw.trim();
    GENERALIZED_TIME
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Trim the value and drop a trailing `.fffZ` or `Z`, keeping any inner
/// space before the time of day
pub fn normalize_last_login(raw: &str) -> String {
    let raw = raw.trim();
    ZONE_SUFFIX.replace(raw, "").into_owned()
}

/// Parse roster content. The header line and whitespace-only lines are skipped.
pub fn parse_roster(content: &str) -> impl Iterator<Item = AccountRecord> + '_ {
    content
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(AccountRecord::normalize)
}

/// Read and parse the roster file. Bytes that are not UTF-8 are replaced,
/// so a stray Latin-1 character only affects the row it sits in.
pub fn read_roster(path: &Path) -> Result<Vec<AccountRecord>> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read roster {}", path.display()))?;
    let content = String::from_utf8_lossy(&bytes);
    Ok(parse_roster(&content).collect())
}
