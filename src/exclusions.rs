//! Protected accounts that must never be backed up or removed.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Generic address pattern used to pull addresses out of free-form lines
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}")
        .expect("email extraction pattern is a valid regex")
});

/// Case-insensitive set of protected addresses, built once per run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    addresses: HashSet<String>,
}

impl ExclusionSet {
    /// Load the exclusion file.
    ///
    /// A missing file is not an error: a warning is emitted and `None` is
    /// returned so the caller can note it and continue unprotected. The first
    /// line is a header and is always skipped. Bytes that are not UTF-8 are
    /// replaced rather than rejected.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            warn!(
                path = %path.display(),
                "Exclusion file not found, continuing without exclusions"
            );
            return Ok(None);
        }

        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read exclusion file {}", path.display()))?;

        let set = Self::parse(&String::from_utf8_lossy(&bytes));
        debug!(count = set.len(), "Loaded exclusions");
        Ok(Some(set))
    }

    /// Build a set from file content (header line included)
    pub fn parse(content: &str) -> Self {
        let addresses = content
            .lines()
            .skip(1)
            .flat_map(extract_addresses)
            .collect();
        ExclusionSet { addresses }
    }

    pub fn contains(&self, email: &str) -> bool {
        self.addresses.contains(&email.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl FromIterator<String> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        ExclusionSet {
            addresses: iter.into_iter().map(|a| a.to_lowercase()).collect(),
        }
    }
}

/// Every address found in `line`, lower-cased, in order of appearance
pub fn extract_addresses(line: &str) -> Vec<String> {
    EMAIL_PATTERN
        .find_iter(line)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_extract_mixed_case_list() {
        let found = extract_addresses("Foo@Bar.COM, baz@qux.org");
        assert_eq!(found, vec!["foo@bar.com", "baz@qux.org"]);
    }

    #[test]
    fn test_extract_from_noise() {
        let found = extract_addresses("ticket #12 | owner=<Admin@Corp.example.net> (keep)");
        assert_eq!(found, vec!["admin@corp.example.net"]);
    }

    #[test]
    fn test_extract_requires_tld() {
        assert!(extract_addresses("root@localhost").is_empty());
        assert!(extract_addresses("user@example.c").is_empty());
    }

    #[test]
    fn test_extract_blank_line() {
        assert!(extract_addresses("").is_empty());
        assert!(extract_addresses("   ").is_empty());
    }

    #[test]
    fn test_parse_skips_header() {
        let set = ExclusionSet::parse("header@example.com\nkeep@example.com\n");
        assert!(!set.contains("header@example.com"));
        assert!(set.contains("keep@example.com"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_parse_collapses_duplicates() {
        let set = ExclusionSet::parse("email\nA@x.org;a@X.org\n\n a@x.org \n");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let set = ExclusionSet::parse("email\nboss@example.com\n");
        assert!(set.contains("BOSS@Example.Com"));
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let loaded = ExclusionSet::load(&dir.path().join("missing.txt")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exclusions.txt");
        fs::write(&path, "Protected accounts\nceo@example.com, cfo@example.com\n").unwrap();

        let set = ExclusionSet::load(&path).unwrap().unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("cfo@example.com"));
    }

    #[test]
    fn test_load_tolerates_latin1() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exclusions.txt");
        let mut content = b"Gesch".to_vec();
        content.extend_from_slice(b"\xE4ftsf\xFChrung\n");
        content.extend_from_slice(b"M\xFCller <mueller@example.com>\n");
        content.extend_from_slice(b"ceo@example.com\n");
        fs::write(&path, content).unwrap();

        let set = ExclusionSet::load(&path).unwrap().unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("mueller@example.com"));
        assert!(set.contains("ceo@example.com"));
    }
}
