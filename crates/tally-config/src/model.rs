use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use tally_domain::Role;
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_INVOICE_PREFIX: &str = "EXP";
pub const DEFAULT_MAX_CYCLES: u32 = 10_000;
const DATA_DIR_NAME: &str = "tally";

/// Which store the CLI opens.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Json,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::Json => "json",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Backend::Sqlite),
            "json" => Ok(Backend::Json),
            other => Err(format!("unknown storage backend `{other}`")),
        }
    }
}

/// Operator settings read by the CLI on startup.
///
/// Every field has a default so a partial or missing file still loads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub currency: String,
    pub invoice_prefix: String,
    /// Days past the as-of date that generation looks ahead.
    pub lookahead_days: u32,
    pub max_cycles_per_definition: u32,
    pub backend: Backend,
    /// Directory holding the charge store. Defaults to the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_root: Option<PathBuf>,
    /// `tracing` filter directive; `RUST_LOG` still wins when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<Uuid>,
    pub operator_role: Role,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.into(),
            invoice_prefix: DEFAULT_INVOICE_PREFIX.into(),
            lookahead_days: 0,
            max_cycles_per_definition: DEFAULT_MAX_CYCLES,
            backend: Backend::default(),
            data_root: None,
            log_filter: None,
            operator_id: None,
            operator_role: Role::Admin,
        }
    }
}

impl Config {
    pub fn resolve_data_root(&self) -> PathBuf {
        if let Some(path) = &self.data_root {
            return path.clone();
        }
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DATA_DIR_NAME)
    }

    /// Operator identity recorded as `created_by`; the nil id when unset.
    pub fn operator(&self) -> Uuid {
        self.operator_id.unwrap_or_else(Uuid::nil)
    }

    pub fn validate(&self) -> Result<(), String> {
        let currency = self.currency.trim();
        if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(format!(
                "currency `{}` must be a three-letter code",
                self.currency
            ));
        }
        let prefix = self.invoice_prefix.trim();
        if prefix.is_empty() || !prefix.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(format!(
                "invoice prefix `{}` must be non-empty and alphanumeric",
                self.invoice_prefix
            ));
        }
        if self.max_cycles_per_definition == 0 {
            return Err("max_cycles_per_definition must be at least 1".into());
        }
        Ok(())
    }
}
