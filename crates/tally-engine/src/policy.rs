//! Capability checks performed before every service operation.

use std::fmt;

use serde::Serialize;
use tally_domain::{Actor, Role};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewCharges,
    ManageCharges,
    RecordPayments,
    RunGeneration,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Capability::ViewCharges => "view recurring charges",
            Capability::ManageCharges => "manage recurring charges",
            Capability::RecordPayments => "record payments",
            Capability::RunGeneration => "run charge generation",
        };
        f.write_str(label)
    }
}

/// Maps roles to the capabilities they hold.
pub struct Policy;

impl Policy {
    pub fn permits(role: Role, capability: Capability) -> bool {
        match role {
            Role::MasterAdmin | Role::Admin | Role::SubAdmin => true,
            Role::Support => capability == Capability::ViewCharges,
            Role::System => matches!(
                capability,
                Capability::ViewCharges | Capability::RunGeneration
            ),
            Role::Employee | Role::Sales | Role::Client => false,
        }
    }

    pub fn authorize(actor: &Actor, capability: Capability) -> Result<(), CoreError> {
        if Self::permits(actor.role, capability) {
            Ok(())
        } else {
            tracing::debug!(actor = %actor.id, role = %actor.role, %capability, "capability denied");
            Err(CoreError::Forbidden {
                role: actor.role,
                capability,
            })
        }
    }
}
