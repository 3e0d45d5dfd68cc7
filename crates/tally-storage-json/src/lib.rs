//! tally-storage-json
//!
//! Single-file JSON snapshot store. Each committed transaction rewrites the
//! snapshot through a temporary file and a rename; the previous snapshot is
//! copied into a timestamped backup the first time a store instance writes.

use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use tally_engine::{ChargeState, ChargeStore, ChargeTx, CoreError};

const SNAPSHOT_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub path: PathBuf,
}

/// Filesystem-backed [`ChargeStore`] holding every record in one JSON document.
#[derive(Debug)]
pub struct JsonChargeStore {
    path: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
    state: ChargeState,
    backed_up: bool,
}

impl JsonChargeStore {
    pub fn open(path: PathBuf, backups_dir: PathBuf) -> Result<Self, CoreError> {
        Self::with_retention(path, backups_dir, DEFAULT_RETENTION)
    }

    pub fn with_retention(
        path: PathBuf,
        backups_dir: PathBuf,
        retention: usize,
    ) -> Result<Self, CoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&backups_dir)?;
        let state = if path.exists() {
            load_state_from_path(&path)?
        } else {
            ChargeState::default()
        };
        Ok(Self {
            path,
            backups_dir,
            retention: retention.max(1),
            state,
            backed_up: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &ChargeState {
        &self.state
    }

    /// Writes a copy of the current snapshot into the backups directory.
    pub fn backup(&self, note: Option<&str>) -> Result<BackupInfo, CoreError> {
        let mut stem = format!("charges_{}", Utc::now().format(BACKUP_TIMESTAMP_FORMAT));
        if let Some(label) = sanitize_backup_note(note) {
            stem.push('_');
            stem.push_str(&label);
        }
        let id = format!("{stem}.{SNAPSHOT_EXTENSION}");
        let path = self.backups_dir.join(&id);
        write_atomic(&path, &serialize_state(&self.state)?)?;
        self.prune_backups()?;
        Ok(BackupInfo {
            created_at: parse_backup_timestamp(&id),
            id,
            path,
        })
    }

    /// Backups, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                entries.push(BackupInfo {
                    id: name.to_string(),
                    created_at: parse_backup_timestamp(name),
                    path: path.clone(),
                });
            }
        }
        entries.sort_by(|a, b| {
            Reverse(a.created_at)
                .cmp(&Reverse(b.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(entries)
    }

    /// Replaces the live snapshot with a backup.
    pub fn restore(&mut self, backup: &BackupInfo) -> Result<(), CoreError> {
        if !backup.path.exists() {
            return Err(CoreError::Storage(format!(
                "backup `{}` not found",
                backup.id
            )));
        }
        let restored = load_state_from_path(&backup.path)?;
        save_state_to_path(&restored, &self.path)?;
        self.state = restored;
        tracing::info!(backup = %backup.id, "snapshot restored");
        Ok(())
    }

    fn backup_existing_file(&mut self) -> Result<(), CoreError> {
        if self.backed_up || !self.path.exists() {
            return Ok(());
        }
        let id = format!(
            "charges_{}.{}",
            Utc::now().format(BACKUP_TIMESTAMP_FORMAT),
            SNAPSHOT_EXTENSION
        );
        fs::copy(&self.path, self.backups_dir.join(&id))?;
        self.prune_backups()?;
        self.backed_up = true;
        Ok(())
    }

    fn prune_backups(&self) -> Result<(), CoreError> {
        for entry in self.list_backups()?.into_iter().skip(self.retention) {
            let _ = fs::remove_file(entry.path);
        }
        Ok(())
    }
}

impl ChargeStore for JsonChargeStore {
    fn transaction<T, F>(&mut self, work: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut dyn ChargeTx) -> Result<T, CoreError>,
    {
        let (staged, value) = self.state.stage(work)?;
        if staged.revision() != self.state.revision() {
            self.backup_existing_file()?;
            save_state_to_path(&staged, &self.path)?;
        }
        self.state = staged;
        Ok(value)
    }
}

pub fn save_state_to_path(state: &ChargeState, path: &Path) -> Result<(), CoreError> {
    let tmp = tmp_path(path);
    write_atomic(&tmp, &serialize_state(state)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_state_from_path(path: &Path) -> Result<ChargeState, CoreError> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|err| CoreError::Serde(err.to_string()))
}

fn serialize_state(state: &ChargeState) -> Result<String, CoreError> {
    serde_json::to_string_pretty(state).map_err(|err| CoreError::Serde(err.to_string()))
}

fn sanitize_backup_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !sanitized.is_empty() && !last_dash {
            sanitized.push('-');
            last_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(&format!(".{SNAPSHOT_EXTENSION}"))?;
    let mut segments = stem.split('_').skip(1);
    let date = segments.next()?;
    let time = segments.next()?;
    if !is_digits(date, 8) || !is_digits(time, 4) {
        return None;
    }
    NaiveDateTime::parse_from_str(&format!("{date}{time}"), "%Y%m%d%H%M")
        .ok()
        .map(|naive| naive.and_utc())
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{existing}.{TMP_SUFFIX}"),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;
    Ok(())
}
