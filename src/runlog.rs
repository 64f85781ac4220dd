//! Append-only run log and report files.
//!
//! Neither file is ever truncated; both accumulate across runs and are left
//! to external rotation.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {} for appending", path.display()))
}

/// Human-readable log: one line per decision or event
pub struct RunLog {
    path: PathBuf,
    file: File,
}

impl RunLog {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(RunLog {
            path: path.to_path_buf(),
            file: open_append(path)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.file, "[{}] {}", stamp, line)
            .with_context(|| format!("Failed to write to {}", self.path.display()))
    }

    /// Log an event about one account
    pub fn record(&mut self, email: &str, message: impl std::fmt::Display) -> Result<()> {
        self.write_line(&format!("{}: {}", email, message))
    }

    /// Log an event that is not about a single account
    pub fn note(&mut self, message: impl std::fmt::Display) -> Result<()> {
        self.write_line(&message.to_string())
    }

    pub fn run_started(&mut self, dry_run: bool, threshold: NaiveDate) -> Result<()> {
        let mode = if dry_run { "dry run" } else { "live run" };
        self.write_line(&format!(
            "===== {} started, accounts inactive since before {} are stale =====",
            mode, threshold
        ))
    }

    pub fn run_finished(&mut self, summary: impl std::fmt::Display) -> Result<()> {
        self.write_line(&format!("===== run finished: {} =====", summary))
    }
}

/// One report line: `email;DD.MM.YYYY`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub email: String,
    pub date: NaiveDate,
}

impl std::fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{};{}", self.email, self.date.format("%d.%m.%Y"))
    }
}

/// Ledger of accounts whose backup was created
pub struct Report {
    path: PathBuf,
    file: File,
}

impl Report {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Report {
            path: path.to_path_buf(),
            file: open_append(path)?,
        })
    }

    pub fn append(&mut self, entry: &ReportEntry) -> Result<()> {
        writeln!(self.file, "{}", entry)
            .with_context(|| format!("Failed to write to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_report_entry_format() {
        let entry = ReportEntry {
            email: "alice@example.com".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
        };
        assert_eq!(entry.to_string(), "alice@example.com;05.01.2025");
    }

    #[test]
    fn test_report_appends_across_opens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        for email in ["a@example.com", "b@example.com"] {
            let mut report = Report::open(&path).unwrap();
            report
                .append(&ReportEntry {
                    email: email.to_string(),
                    date,
                })
                .unwrap();
        }

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "a@example.com;01.01.2025\nb@example.com;01.01.2025\n"
        );
    }

    #[test]
    fn test_run_log_markers_and_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cleanup.log");
        fs::write(&path, "previous run\n").unwrap();

        let mut log = RunLog::open(&path).unwrap();
        log.run_started(true, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .unwrap();
        log.record("a@example.com", "skipped, listed in exclusion file")
            .unwrap();
        log.run_finished("1 read").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "previous run");
        assert!(lines[1].contains("dry run started"));
        assert!(lines[1].contains("2024-01-01"));
        assert!(lines[2].ends_with("a@example.com: skipped, listed in exclusion file"));
        assert!(lines[3].contains("run finished: 1 read"));
    }
}
