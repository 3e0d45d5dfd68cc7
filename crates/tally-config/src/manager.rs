use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{Config, ConfigError};

const CONFIG_FILE: &str = "config.json";
const BACKUPS_DIR: &str = "backups";
const BACKUP_PREFIX: &str = "config_";
const BACKUP_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";
const DEFAULT_RETENTION: usize = 10;

/// Reads, writes and snapshots a [`Config`] file.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf, backups_dir: PathBuf) -> Self {
        Self {
            config_path,
            backups_dir,
            retention: DEFAULT_RETENTION,
        }
    }

    /// `config.json` plus a `backups/` directory inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CONFIG_FILE), dir.join(BACKUPS_DIR))
    }

    /// Manager rooted at the platform config directory.
    pub fn default_location() -> Self {
        let base = dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::in_dir(&base.join("tally"))
    }

    /// Backups for the same config file live next to it.
    pub fn for_file(config_path: PathBuf) -> Self {
        let backups_dir = config_path
            .parent()
            .map(|parent| parent.join(BACKUPS_DIR))
            .unwrap_or_else(|| PathBuf::from(BACKUPS_DIR));
        Self::new(config_path, backups_dir)
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Loads the file, or the defaults when it does not exist yet.
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }
        read_config(&self.config_path)
    }

    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        config.validate().map_err(ConfigError::Invalid)?;
        let tmp = self.config_path.with_extension("json.tmp");
        write_json(&tmp, config)?;
        fs::rename(&tmp, &self.config_path)?;
        Ok(())
    }

    /// Writes `config` into the backups directory and returns the file name.
    pub fn backup(&self, config: &Config, note: Option<&str>) -> Result<String, ConfigError> {
        let mut name = format!(
            "{BACKUP_PREFIX}{}",
            Utc::now().format(BACKUP_TIMESTAMP_FORMAT)
        );
        if let Some(label) = backup_label(note) {
            name.push('_');
            name.push_str(&label);
        }
        name.push('.');
        name.push_str(BACKUP_EXTENSION);
        write_json(&self.backups_dir.join(&name), config)?;
        self.prune()?;
        Ok(name)
    }

    /// Backup file names, newest first.
    pub fn list_backups(&self) -> Result<Vec<String>, ConfigError> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(BACKUP_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                if name.starts_with(BACKUP_PREFIX) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort_by(|a, b| {
            Reverse(backup_timestamp(a))
                .cmp(&Reverse(backup_timestamp(b)))
                .then_with(|| b.cmp(a))
        });
        Ok(names)
    }

    /// Reads a backup and makes it the active config file.
    pub fn restore(&self, backup_name: &str) -> Result<Config, ConfigError> {
        let path = self.backups_dir.join(backup_name);
        if !path.is_file() {
            return Err(ConfigError::BackupNotFound(backup_name.to_string()));
        }
        let config = read_config(&path)?;
        self.save(&config)?;
        Ok(config)
    }

    fn prune(&self) -> Result<(), ConfigError> {
        for stale in self.list_backups()?.into_iter().skip(self.retention) {
            fs::remove_file(self.backups_dir.join(stale))?;
        }
        Ok(())
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let data = fs::read_to_string(path)?;
    let config: Config =
        serde_json::from_str(&data).map_err(|err| ConfigError::Serde(err.to_string()))?;
    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}

fn write_json(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json =
        serde_json::to_string_pretty(config).map_err(|err| ConfigError::Serde(err.to_string()))?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn backup_label(note: Option<&str>) -> Option<String> {
    let words: Vec<String> = note?
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| word.to_ascii_lowercase())
        .collect();
    (!words.is_empty()).then(|| words.join("-"))
}

fn backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stem = name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(&format!(".{BACKUP_EXTENSION}"))?;
    let raw = stem.get(..13)?;
    NaiveDateTime::parse_from_str(raw, "%Y%m%d_%H%M")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_label_collapses_punctuation() {
        assert_eq!(
            backup_label(Some("  Before  v2.0 upgrade!")),
            Some("before-v2-0-upgrade".into())
        );
        assert_eq!(backup_label(Some("***")), None);
        assert_eq!(backup_label(None), None);
    }

    #[test]
    fn backup_timestamp_reads_name_without_note() {
        let parsed = backup_timestamp("config_20260301_0915.json").expect("timestamp");
        assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), "2026-03-01 09:15");
        assert!(backup_timestamp("config_20260301_0915_note.json").is_some());
        assert!(backup_timestamp("charges_20260301_0915.json").is_none());
    }
}
