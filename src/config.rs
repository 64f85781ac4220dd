//! Job configuration loaded from TOML.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

// Embed the default configuration directly in the binary at compile time
const DEFAULT_CONFIG_TOML: &str = include_str!("../cleanup.toml");

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub paths: PathsConfig,
    pub retention: RetentionConfig,
    pub commands: CommandsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub roster: PathBuf,
    pub exclusions: PathBuf,
    pub backup_dir: PathBuf,
    pub log_dir: PathBuf,
    pub report: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    /// Calendar months without activity before an account is stale
    pub max_age_months: u32,
}

/// External commands; `{email}` is substituted in every argument
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandsConfig {
    pub backup: Vec<String>,
    pub delete: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let base = PathBuf::from("/opt/mailbox-reaper");
        PathsConfig {
            roster: base.join("accounts.csv"),
            exclusions: base.join("exclusions.txt"),
            backup_dir: base.join("backups"),
            log_dir: base.join("logs"),
            report: base.join("report.csv"),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig { max_age_months: 12 }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        let argv = |parts: &[&str]| -> Vec<String> { parts.iter().map(|s| s.to_string()).collect() };
        CommandsConfig {
            backup: argv(&["zmmailbox", "-z", "-m", "{email}", "getRestURL", "//?fmt=tgz"]),
            delete: argv(&["zmprov", "da", "{email}"]),
        }
    }
}

impl Config {
    /// The configuration shipped inside the binary
    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_CONFIG_TOML).context("Failed to parse embedded configuration")
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("In config file {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.commands.backup.is_empty() {
            anyhow::bail!("commands.backup must name a program");
        }
        if self.commands.delete.is_empty() {
            anyhow::bail!("commands.delete must name a program");
        }
        Ok(())
    }

    /// Log file for this run; dry runs log separately
    pub fn log_path(&self, dry_run: bool) -> PathBuf {
        let name = if dry_run {
            "cleanup-dry-run.log"
        } else {
            "cleanup.log"
        };
        self.paths.log_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_embedded_matches_defaults() {
        assert_eq!(Config::embedded().unwrap(), Config::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_toml("[retention]\nmax_age_months = 24\n").unwrap();
        assert_eq!(config.retention.max_age_months, 24);
        assert_eq!(config.paths, PathsConfig::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = Config::from_toml("[paths]\nroaster = \"/tmp/x\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_command_rejected() {
        let result = Config::from_toml("[commands]\ndelete = []\n");
        assert!(result.unwrap_err().to_string().contains("commands.delete"));
    }

    #[test]
    fn test_log_path_depends_on_mode() {
        let config = Config::default();
        assert!(config.log_path(true).ends_with("cleanup-dry-run.log"));
        assert!(config.log_path(false).ends_with("cleanup.log"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cleanup.toml");
        fs::write(&path, "[paths]\nroster = \"/srv/roster.csv\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.paths.roster, PathBuf::from("/srv/roster.csv"));
        assert_eq!(config.paths.backup_dir, PathsConfig::default().backup_dir);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/cleanup.toml"));
        assert!(result.unwrap_err().to_string().contains("Failed to read config file"));
    }
}
