use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    MasterAdmin,
    Admin,
    SubAdmin,
    Support,
    Employee,
    Sales,
    Client,
    /// The scheduler running unattended jobs.
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::MasterAdmin => "master_admin",
            Role::Admin => "admin",
            Role::SubAdmin => "sub_admin",
            Role::Support => "support",
            Role::Employee => "employee",
            Role::Sales => "sales",
            Role::Client => "client",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "master_admin" => Ok(Role::MasterAdmin),
            "admin" => Ok(Role::Admin),
            "sub_admin" => Ok(Role::SubAdmin),
            "support" => Ok(Role::Support),
            "employee" => Ok(Role::Employee),
            "sales" => Ok(Role::Sales),
            "client" => Ok(Role::Client),
            "system" => Ok(Role::System),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

/// Whoever is performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn system() -> Self {
        Self {
            id: Uuid::nil(),
            role: Role::System,
        }
    }
}
