//! Mailbox management collaborators: archive export and account deletion.
//!
//! The orchestrator only sees the `Backuper` and `Deleter` traits. The shell
//! implementations run whatever commands the configuration names, substituting
//! `{email}` in each argument.

use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;
use tracing::debug;

/// Placeholder replaced by the account address in command arguments
pub const EMAIL_PLACEHOLDER: &str = "{email}";

/// Failure reported by an external collaborator
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("command is empty")]
    EmptyCommand,
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot create archive {path}: {source}")]
    Archive {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Exports a mailbox into an archive file
pub trait Backuper {
    /// Write the archive for `email` to `destination`. An `Ok` result does not
    /// guarantee a usable archive; callers check the file itself.
    fn export(&self, email: &str, destination: &Path) -> Result<(), CollaboratorError>;
}

/// Removes an account from the mail server
pub trait Deleter {
    fn delete(&self, email: &str) -> Result<(), CollaboratorError>;
}

/// Runs an external program, one argv per call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    argv: Vec<String>,
}

impl ShellCommand {
    pub fn new(argv: Vec<String>) -> Self {
        ShellCommand { argv }
    }

    /// Build the `Command` for `email`, or `None` when no program is configured
    fn command_for(&self, email: &str) -> Option<(String, Command)> {
        let (program, args) = self.argv.split_first()?;
        let mut command = Command::new(program);
        command.args(args.iter().map(|arg| arg.replace(EMAIL_PLACEHOLDER, email)));
        Some((program.clone(), command))
    }
}

fn check_status(program: String, status: ExitStatus, stderr: &[u8]) -> Result<(), CollaboratorError> {
    if status.success() {
        return Ok(());
    }
    Err(CollaboratorError::Failed {
        program,
        status,
        stderr: String::from_utf8_lossy(stderr).trim().to_string(),
    })
}

/// Backup via an export command whose stdout is the archive
#[derive(Debug, Clone)]
pub struct ShellBackuper {
    command: ShellCommand,
}

impl ShellBackuper {
    pub fn new(argv: Vec<String>) -> Self {
        ShellBackuper {
            command: ShellCommand::new(argv),
        }
    }
}

impl Backuper for ShellBackuper {
    fn export(&self, email: &str, destination: &Path) -> Result<(), CollaboratorError> {
        let (program, mut command) = self
            .command
            .command_for(email)
            .ok_or(CollaboratorError::EmptyCommand)?;

        let archive = File::create(destination).map_err(|source| CollaboratorError::Archive {
            path: destination.display().to_string(),
            source,
        })?;

        debug!(%email, %program, path = %destination.display(), "Exporting mailbox");
        let output = command
            .stdin(Stdio::null())
            .stdout(archive)
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| CollaboratorError::Spawn {
                program: program.clone(),
                source,
            })?;

        check_status(program, output.status, &output.stderr)
    }
}

/// Deletion via an account-removal command
#[derive(Debug, Clone)]
pub struct ShellDeleter {
    command: ShellCommand,
}

impl ShellDeleter {
    pub fn new(argv: Vec<String>) -> Self {
        ShellDeleter {
            command: ShellCommand::new(argv),
        }
    }
}

impl Deleter for ShellDeleter {
    fn delete(&self, email: &str) -> Result<(), CollaboratorError> {
        let (program, mut command) = self
            .command
            .command_for(email)
            .ok_or(CollaboratorError::EmptyCommand)?;

        debug!(%email, %program, "Deleting account");
        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| CollaboratorError::Spawn {
                program: program.clone(),
                source,
            })?;

        check_status(program, output.status, &output.stderr)
    }
}
