//! Recurring charge definitions: the templates the engine expands into instances.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::{Amounted, Identifiable},
    recurrence::RecurrenceRule,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionStatus {
    #[default]
    Active,
    Paused,
    /// Stopped by an administrator. Cannot be resumed.
    #[serde(alias = "stopped")]
    Cancelled,
    /// The schedule ran past its end date. Cannot be resumed.
    Completed,
}

impl DefinitionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DefinitionStatus::Active => "active",
            DefinitionStatus::Paused => "paused",
            DefinitionStatus::Cancelled => "cancelled",
            DefinitionStatus::Completed => "completed",
        }
    }

    pub fn is_active(self) -> bool {
        self == DefinitionStatus::Active
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DefinitionStatus::Cancelled | DefinitionStatus::Completed)
    }
}

impl fmt::Display for DefinitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefinitionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(DefinitionStatus::Active),
            "paused" => Ok(DefinitionStatus::Paused),
            "cancelled" | "canceled" | "stopped" => Ok(DefinitionStatus::Cancelled),
            "completed" => Ok(DefinitionStatus::Completed),
            other => Err(format!("unknown definition status `{other}`")),
        }
    }
}

/// A recurring charge template with its schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringChargeDefinition {
    pub id: Uuid,
    pub title: String,
    pub amount: Decimal,
    #[serde(flatten)]
    pub rule: RecurrenceRule,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub next_run_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: DefinitionStatus,
    pub category_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringChargeDefinition {
    /// Creates an active definition whose first cycle falls on `start_date`.
    pub fn new(
        title: impl Into<String>,
        amount: Decimal,
        rule: RecurrenceRule,
        start_date: NaiveDate,
        category_id: Uuid,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            amount,
            rule,
            start_date,
            end_date: None,
            next_run_date: Some(start_date),
            status: DefinitionStatus::Active,
            category_id,
            notes: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_next_run_date(mut self, next_run_date: NaiveDate) -> Self {
        self.next_run_date = Some(next_run_date);
        self
    }

    pub fn with_status(mut self, status: DefinitionStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether a cycle is due on or before `run_until`.
    pub fn is_due(&self, run_until: NaiveDate) -> bool {
        self.status.is_active() && self.next_run_date.is_some_and(|next| next <= run_until)
    }

    /// Whether `date` lies past the optional end date.
    pub fn ends_before(&self, date: NaiveDate) -> bool {
        self.end_date.is_some_and(|end| date > end)
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = DefinitionStatus::Completed;
        self.next_run_date = None;
        self.touch(now);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Identifiable for RecurringChargeDefinition {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Amounted for RecurringChargeDefinition {
    fn amount(&self) -> Decimal {
        self.amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample() -> RecurringChargeDefinition {
        RecurringChargeDefinition::new(
            "Hosting",
            dec!(150),
            RecurrenceRule::monthly(),
            NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn new_definition_is_due_on_its_start_date() {
        let definition = sample();
        assert_eq!(definition.next_run_date, Some(definition.start_date));
        assert!(definition.is_due(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()));
        assert!(!definition.is_due(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()));
    }

    #[test]
    fn paused_definition_is_never_due() {
        let definition = sample().with_status(DefinitionStatus::Paused);
        assert!(!definition.is_due(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()));
    }

    #[test]
    fn serialized_form_flattens_rule_and_accepts_stopped_alias() {
        let definition = sample();
        let mut value = serde_json::to_value(&definition).unwrap();
        assert_eq!(value["recurrence_type"], "monthly");
        assert_eq!(value["recurrence_interval"], 1);

        value["status"] = "stopped".into();
        let parsed: RecurringChargeDefinition = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.status, DefinitionStatus::Cancelled);
    }

    #[test]
    fn mark_completed_clears_schedule() {
        let mut definition = sample();
        definition.mark_completed(Utc::now());
        assert_eq!(definition.status, DefinitionStatus::Completed);
        assert!(definition.next_run_date.is_none());
        assert!(definition.status.is_terminal());
    }
}
