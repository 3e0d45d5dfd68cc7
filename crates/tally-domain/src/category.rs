use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::Identifiable;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CategoryStatus {
    #[default]
    Active,
    Inactive,
}

impl CategoryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryStatus::Active => "active",
            CategoryStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for CategoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(CategoryStatus::Active),
            "inactive" => Ok(CategoryStatus::Inactive),
            other => Err(format!("unknown category status `{other}`")),
        }
    }
}

/// Expense category a recurring charge books into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeCategory {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub status: CategoryStatus,
    pub created_at: DateTime<Utc>,
}

impl ChargeCategory {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: CategoryStatus::Active,
            created_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CategoryStatus::Active
    }
}

impl Identifiable for ChargeCategory {
    fn id(&self) -> Uuid {
        self.id
    }
}
