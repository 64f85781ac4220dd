//! Mailbox Reaper - retention cleanup for mail-server accounts
//!
//! Reads a roster of mailbox accounts, decides which ones are stale, exports
//! each stale mailbox to an archive and deletes the account once the archive
//! exists. Meant to run periodically as a batch job.
//!
//! ## Flow
//!
//! - `exclusions`: protected addresses, loaded once per run
//! - `record`: roster rows normalized into `AccountRecord`s
//! - `decision`: retention policy, one `RetentionDecision` per record
//! - `orchestrator`: backup, validation and deletion for eligible records
//! - `runlog`: append-only run log and report
//!
//! `job::run` wires these together. The mail server is reached only through
//! the `Backuper` and `Deleter` traits in `mailbox`.

pub mod config;
pub mod decision;
pub mod exclusions;
pub mod job;
pub mod mailbox;
pub mod orchestrator;
pub mod record;
pub mod runlog;
pub mod time;

// Re-export commonly used items
pub use config::Config;
pub use decision::{decide, DateField, RetentionDecision};
pub use exclusions::{extract_addresses, ExclusionSet};
pub use job::{run, RunOptions, RunStats};
pub use mailbox::{Backuper, CollaboratorError, Deleter, ShellBackuper, ShellDeleter};
pub use orchestrator::{BackupOutcome, DeletionOutcome, Orchestrator, ProcessOutcome};
pub use record::{parse_roster, read_roster, AccountRecord};
pub use runlog::{Report, ReportEntry, RunLog};
pub use time::{RetentionCutoff, Timestamp, TimestampError};
