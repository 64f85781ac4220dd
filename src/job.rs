//! One cleanup run: load exclusions, walk the roster, act on stale accounts.

use crate::config::Config;
use crate::decision::{decide, RetentionDecision};
use crate::exclusions::ExclusionSet;
use crate::mailbox::{Backuper, Deleter};
use crate::orchestrator::{BackupOutcome, DeletionOutcome, Orchestrator, ProcessOutcome};
use crate::record::read_roster;
use crate::runlog::{Report, RunLog};
use crate::time::RetentionCutoff;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Runtime flags for a run
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Back up but never delete
    pub dry_run: bool,
    /// Date the retention cutoff, archive names and report lines are based on
    pub today: NaiveDate,
}

/// Counters for one run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub records: usize,
    pub excluded: usize,
    pub never_disable: usize,
    pub too_young: usize,
    pub active_status: usize,
    pub active_login: usize,
    pub date_errors: usize,
    pub eligible: usize,
    pub backups_created: usize,
    pub empty_backups: usize,
    pub invalid_emails: usize,
    pub deleted: usize,
    pub delete_failed: usize,
    pub simulated: usize,
    pub reported: usize,
    pub backup_bytes: u64,
}

impl RunStats {
    fn count_decision(&mut self, decision: &RetentionDecision) {
        self.records += 1;
        let counter = match decision {
            RetentionDecision::Excluded => &mut self.excluded,
            RetentionDecision::NeverDisable => &mut self.never_disable,
            RetentionDecision::TooYoung { .. } => &mut self.too_young,
            RetentionDecision::StillActiveStatus { .. } => &mut self.active_status,
            RetentionDecision::StillActiveLogin { .. } => &mut self.active_login,
            RetentionDecision::DateParseError { .. } => &mut self.date_errors,
            RetentionDecision::Eligible { .. } => &mut self.eligible,
        };
        *counter += 1;
    }

    fn count_outcome(&mut self, outcome: &ProcessOutcome) {
        match &outcome.backup {
            BackupOutcome::Created { size, .. } => {
                self.backups_created += 1;
                self.backup_bytes += size;
            }
            BackupOutcome::EmptyOrMissing => self.empty_backups += 1,
            BackupOutcome::NotAttempted => {}
        }
        if outcome.email_rejected {
            self.invalid_emails += 1;
        }
        match outcome.deletion {
            Some(DeletionOutcome::Deleted) => self.deleted += 1,
            Some(DeletionOutcome::Failed) => self.delete_failed += 1,
            Some(DeletionOutcome::SkippedDryRun) => self.simulated += 1,
            None => {}
        }
        if outcome.report.is_some() {
            self.reported += 1;
        }
    }

    /// Records that were kept without touching the mail server
    pub fn skipped(&self) -> usize {
        self.records - self.eligible
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} read, {} excluded, {} never_disable, {} too young, {} active status, \
             {} recent login, {} date errors, {} eligible, {} backed up, {} empty backups, \
             {} invalid emails, {} deleted, {} deletion failures, {} simulated, {} reported",
            self.records,
            self.excluded,
            self.never_disable,
            self.too_young,
            self.active_status,
            self.active_login,
            self.date_errors,
            self.eligible,
            self.backups_created,
            self.empty_backups,
            self.invalid_emails,
            self.deleted,
            self.delete_failed,
            self.simulated,
            self.reported,
        )
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))
}

/// Execute one run.
///
/// Fails only on fatal conditions: a missing roster or output files that
/// cannot be created. Per-account problems are logged and counted.
pub fn run(
    config: &Config,
    options: RunOptions,
    backuper: &dyn Backuper,
    deleter: &dyn Deleter,
) -> Result<RunStats> {
    let paths = &config.paths;
    if !paths.roster.is_file() {
        anyhow::bail!("Roster file {} not found", paths.roster.display());
    }

    ensure_dir(&paths.backup_dir)?;
    ensure_dir(&paths.log_dir)?;
    if let Some(parent) = paths.report.parent() {
        ensure_dir(parent)?;
    }

    let mut log = RunLog::open(&config.log_path(options.dry_run))?;
    let mut report = Report::open(&paths.report)?;

    let cutoff = RetentionCutoff::months_before(options.today, config.retention.max_age_months)?;
    log.run_started(options.dry_run, cutoff.threshold())?;
    info!(
        dry_run = options.dry_run,
        threshold = %cutoff.threshold(),
        log = %log.path().display(),
        "Cleanup run started"
    );

    let exclusions = match ExclusionSet::load(&paths.exclusions)? {
        Some(set) => set,
        None => {
            log.note(format!(
                "WARNING: exclusion file {} not found, no accounts are protected",
                paths.exclusions.display()
            ))?;
            ExclusionSet::default()
        }
    };

    let records = read_roster(&paths.roster)?;
    debug!(count = records.len(), "Roster loaded");

    let orchestrator = Orchestrator::new(
        &paths.backup_dir,
        options.today,
        options.dry_run,
        backuper,
        deleter,
    );
    let mut stats = RunStats::default();

    for record in &records {
        let decision = decide(record, &exclusions, &cutoff);
        stats.count_decision(&decision);
        log.record(&record.email, &decision)?;

        match &decision {
            RetentionDecision::DateParseError { .. } => {
                warn!(email = %record.email, reason = %decision, "Skipping record")
            }
            _ => debug!(email = %record.email, reason = %decision, "Decision"),
        }

        if let Some(outcome) = orchestrator.process(record, &decision, &mut log, &mut report)? {
            stats.count_outcome(&outcome);
        }
    }

    log.run_finished(&stats)?;
    info!(%stats, "Cleanup run finished");

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DateField;
    use std::path::PathBuf;

    #[test]
    fn test_count_decisions() {
        let mut stats = RunStats::default();
        stats.count_decision(&RetentionDecision::Excluded);
        stats.count_decision(&RetentionDecision::Eligible {
            basis: DateField::CreatedAt,
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        });

        assert_eq!(stats.records, 2);
        assert_eq!(stats.excluded, 1);
        assert_eq!(stats.eligible, 1);
        assert_eq!(stats.skipped(), 1);
    }

    #[test]
    fn test_count_outcome() {
        let mut stats = RunStats::default();
        stats.count_outcome(&ProcessOutcome {
            backup: BackupOutcome::Created {
                path: PathBuf::from("/b/a.tgz"),
                size: 2048,
            },
            email_rejected: false,
            deletion: Some(DeletionOutcome::Failed),
            report: None,
        });
        stats.count_outcome(&ProcessOutcome {
            backup: BackupOutcome::EmptyOrMissing,
            email_rejected: false,
            deletion: None,
            report: None,
        });

        assert_eq!(stats.backups_created, 1);
        assert_eq!(stats.backup_bytes, 2048);
        assert_eq!(stats.delete_failed, 1);
        assert_eq!(stats.empty_backups, 1);
    }

    #[test]
    fn test_display_summary() {
        let stats = RunStats {
            records: 3,
            deleted: 1,
            ..Default::default()
        };
        let summary = stats.to_string();
        assert!(summary.starts_with("3 read"));
        assert!(summary.contains("1 deleted"));
    }
}
