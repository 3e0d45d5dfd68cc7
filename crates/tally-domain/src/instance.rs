use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::{Amounted, Identifiable},
    definition::RecurringChargeDefinition,
};

/// One materialized charge produced for a single due cycle.
///
/// Instances are immutable financial records; the back-reference to the
/// definition is informational and does not own the definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedChargeInstance {
    pub id: Uuid,
    #[serde(default)]
    pub definition_id: Option<Uuid>,
    pub title: String,
    pub amount: Decimal,
    pub charge_date: NaiveDate,
    pub category_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl GeneratedChargeInstance {
    /// Copies the charge fields of `definition` onto a new instance dated `charge_date`.
    pub fn from_definition(
        definition: &RecurringChargeDefinition,
        charge_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            definition_id: Some(definition.id),
            title: definition.title.clone(),
            amount: definition.amount,
            charge_date,
            category_id: definition.category_id,
            note: definition.notes.clone(),
            created_by: definition.created_by,
            created_at,
        }
    }

    pub fn belongs_to(&self, definition_id: Uuid) -> bool {
        self.definition_id == Some(definition_id)
    }
}

impl Identifiable for GeneratedChargeInstance {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Amounted for GeneratedChargeInstance {
    fn amount(&self) -> Decimal {
        self.amount
    }
}
