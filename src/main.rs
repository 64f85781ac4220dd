use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use humansize::{format_size, BINARY};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mailbox_reaper::config::Config;
use mailbox_reaper::job::{self, RunOptions, RunStats};
use mailbox_reaper::mailbox::{ShellBackuper, ShellDeleter};
use mailbox_reaper::time::parse_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RunMode {
    /// Back up and delete stale accounts
    Live,
    /// Back up stale accounts but only log the deletion
    DryRun,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Back up and delete mailbox accounts that are past their retention period",
    long_about = None
)]
struct Args {
    /// Run mode (`dry-run` performs no deletions)
    #[arg(value_enum, default_value_t = RunMode::Live)]
    mode: RunMode,

    /// Same as passing `dry-run` as the mode
    #[arg(long)]
    dry_run: bool,

    /// Configuration file (defaults to the built-in configuration)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Roster file, overriding the configured path
    #[arg(long)]
    roster: Option<PathBuf>,

    /// Exclusion file, overriding the configured path
    #[arg(long)]
    exclusions: Option<PathBuf>,

    /// Treat this date (YYYY-MM-DD) as today
    #[arg(long, value_name = "DATE")]
    as_of: Option<String>,

    /// Show debug output
    #[arg(long, short)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn print_summary(stats: &RunStats, dry_run: bool, config: &Config) {
    println!("{}", "Mailbox cleanup summary".bold());
    println!("  Accounts read:       {}", stats.records);
    println!("  Kept:                {}", stats.skipped());
    println!("    excluded:          {}", stats.excluded);
    println!("    never_disable:     {}", stats.never_disable);
    println!("    too young:         {}", stats.too_young);
    println!("    active status:     {}", stats.active_status);
    println!("    recent login:      {}", stats.active_login);
    if stats.date_errors > 0 {
        println!("    {}", format!("unparsable dates:  {}", stats.date_errors).yellow());
    }
    println!("  Eligible:            {}", stats.eligible);
    println!(
        "  Backups created:     {} ({})",
        stats.backups_created,
        format_size(stats.backup_bytes, BINARY)
    );
    if stats.empty_backups > 0 {
        println!("  {}", format!("Empty backups:       {}", stats.empty_backups).yellow());
    }
    if stats.invalid_emails > 0 {
        println!("  {}", format!("Invalid emails:      {}", stats.invalid_emails).yellow());
    }

    println!("========================================");
    if dry_run {
        println!(
            "Dry run mode: {} deletions simulated, no accounts were deleted.",
            stats.simulated
        );
    } else {
        println!("Accounts deleted: {}", stats.deleted.to_string().bold().green());
        if stats.delete_failed > 0 {
            println!(
                "Deletion failures: {}",
                stats.delete_failed.to_string().bold().red()
            );
        }
    }
    println!("Log: {}", config.log_path(dry_run).display());
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::embedded()?,
    };
    if let Some(roster) = args.roster {
        config.paths.roster = roster;
    }
    if let Some(exclusions) = args.exclusions {
        config.paths.exclusions = exclusions;
    }

    let today = match args.as_of.as_deref() {
        Some(date) => parse_date(date).context("Invalid --as-of date")?,
        None => Local::now().date_naive(),
    };
    let dry_run = args.dry_run || args.mode == RunMode::DryRun;

    let backuper = ShellBackuper::new(config.commands.backup.clone());
    let deleter = ShellDeleter::new(config.commands.delete.clone());

    let stats = job::run(&config, RunOptions { dry_run, today }, &backuper, &deleter)?;
    print_summary(&stats, dry_run, &config);

    Ok(())
}
