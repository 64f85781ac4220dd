//! Backup, validate, then delete (or simulate deleting) one eligible account.

use crate::decision::RetentionDecision;
use crate::mailbox::{Backuper, Deleter};
use crate::record::AccountRecord;
use crate::runlog::{Report, ReportEntry, RunLog};

use anyhow::Result;
use chrono::NaiveDate;
use humansize::{format_size, BINARY};
use regex::Regex;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use tracing::{info, warn};

/// Addresses accepted for deletion. No length or TLD constraint.
static STRICT_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+$").expect("strict email pattern is a valid regex")
});

pub fn is_valid_email(email: &str) -> bool {
    STRICT_EMAIL.is_match(email)
}

/// What the export left on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Created { path: PathBuf, size: u64 },
    EmptyOrMissing,
    /// The address cannot name a file inside the backup directory, so no
    /// export was run
    NotAttempted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    Failed,
    SkippedDryRun,
}

/// Result of processing one eligible account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub backup: BackupOutcome,
    /// The address failed validation. Any archive was removed and nothing
    /// else happened.
    pub email_rejected: bool,
    pub deletion: Option<DeletionOutcome>,
    pub report: Option<ReportEntry>,
}

impl ProcessOutcome {
    fn stopped(backup: BackupOutcome, email_rejected: bool) -> Self {
        ProcessOutcome {
            backup,
            email_rejected,
            deletion: None,
            report: None,
        }
    }
}

/// Drives the backup and delete collaborators for eligible accounts
pub struct Orchestrator<'a> {
    backup_dir: PathBuf,
    today: NaiveDate,
    dry_run: bool,
    backuper: &'a dyn Backuper,
    deleter: &'a dyn Deleter,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        backup_dir: &Path,
        today: NaiveDate,
        dry_run: bool,
        backuper: &'a dyn Backuper,
        deleter: &'a dyn Deleter,
    ) -> Self {
        Orchestrator {
            backup_dir: backup_dir.to_path_buf(),
            today,
            dry_run,
            backuper,
            deleter,
        }
    }

    /// `{backup_dir}/{email}-{YYYYMMDD}.tgz`, or `None` when the archive name
    /// would not be a plain file name directly inside `backup_dir`
    pub fn backup_path(&self, email: &str) -> Option<PathBuf> {
        let name = format!("{}-{}.tgz", email, self.today.format("%Y%m%d"));
        let mut components = Path::new(&name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(self.backup_dir.join(name)),
            _ => None,
        }
    }

    /// Process one record. Returns `None` unless the decision is `Eligible`.
    ///
    /// Per-account failures are reported in the outcome and the log; only
    /// failures to write the log or report are returned as errors.
    pub fn process(
        &self,
        record: &AccountRecord,
        decision: &RetentionDecision,
        log: &mut RunLog,
        report: &mut Report,
    ) -> Result<Option<ProcessOutcome>> {
        if !decision.is_eligible() {
            return Ok(None);
        }

        let email = record.email.as_str();
        let Some(path) = self.backup_path(email) else {
            warn!(%email, "Address is not a usable archive name, backup skipped");
            log.record(
                email,
                "invalid email address (unsafe archive name), account not backed up",
            )?;
            return Ok(Some(ProcessOutcome::stopped(BackupOutcome::NotAttempted, true)));
        };

        log.record(email, format!("backing up mailbox to {}", path.display()))?;
        if let Err(err) = self.backuper.export(email, &path) {
            warn!(%email, error = %err, "Backup command reported an error");
            log.record(email, format!("backup command reported an error: {}", err))?;
        }

        let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            discard_archive(&path);
            log.record(email, "backup empty or missing, account not deleted")?;
            return Ok(Some(ProcessOutcome::stopped(
                BackupOutcome::EmptyOrMissing,
                false,
            )));
        }

        let backup = BackupOutcome::Created {
            path: path.clone(),
            size,
        };
        log.record(
            email,
            format!("backup created ({})", format_size(size, BINARY)),
        )?;

        if !is_valid_email(email) {
            discard_archive(&path);
            warn!(%email, "Invalid email address, backup discarded");
            log.record(email, "invalid email address, backup discarded, account not deleted")?;
            return Ok(Some(ProcessOutcome::stopped(backup, true)));
        }

        // The report line is written as soon as a valid backup exists,
        // before the deletion result is known.
        let entry = ReportEntry {
            email: email.to_string(),
            date: self.today,
        };
        report.append(&entry)?;

        let deletion = if self.dry_run {
            info!(%email, "Dry run, deletion simulated");
            log.record(email, "dry run, deletion simulated")?;
            DeletionOutcome::SkippedDryRun
        } else {
            match self.deleter.delete(email) {
                Ok(()) => {
                    info!(%email, "Account deleted");
                    log.record(email, "account deleted")?;
                    DeletionOutcome::Deleted
                }
                Err(err) => {
                    warn!(%email, error = %err, "Deletion failed");
                    log.record(
                        email,
                        format!("deletion failed: {}, backup kept at {}", err, path.display()),
                    )?;
                    DeletionOutcome::Failed
                }
            }
        };

        Ok(Some(ProcessOutcome {
            backup,
            email_rejected: false,
            deletion: Some(deletion),
            report: Some(entry),
        }))
    }
}

/// Remove an unusable archive; a file that is already gone is fine
fn discard_archive(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "Could not remove archive");
    }
}
