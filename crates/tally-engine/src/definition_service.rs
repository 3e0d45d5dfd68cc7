//! Administrative lifecycle of recurring charge definitions.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use tally_domain::{
    Actor, DefinitionStatus, InvoiceStatus, RecurrenceRule, RecurringChargeDefinition,
};

use crate::{
    advance_service::{AdvanceLedger, AdvanceService},
    policy::{Capability, Policy},
    storage::{ChargeStore, ChargeTx},
    time::Clock,
    CoreError,
};

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_NOTES_LEN: usize = 1000;

/// Editable fields of a definition, as submitted by an operator.
#[derive(Debug, Clone)]
pub struct DefinitionDraft {
    pub title: String,
    pub amount: Decimal,
    pub rule: RecurrenceRule,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub category_id: Uuid,
    pub notes: Option<String>,
}

/// One row of the definition listing.
#[derive(Debug, Clone, Serialize)]
pub struct DefinitionOverview {
    #[serde(flatten)]
    pub definition: RecurringChargeDefinition,
    pub category_name: Option<String>,
    pub advance_total: Decimal,
    pub next_due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvoiceCounts {
    pub total: usize,
    pub paid: usize,
    pub unpaid: usize,
    pub overdue: usize,
}

/// Detail view of one definition.
#[derive(Debug, Clone, Serialize)]
pub struct DefinitionSummary {
    pub definition: RecurringChargeDefinition,
    pub category_name: Option<String>,
    pub invoices: InvoiceCounts,
    /// Earliest unpaid invoice due on or after today.
    pub next_due_date: Option<NaiveDate>,
    pub advance: AdvanceLedger,
}

pub struct DefinitionService;

impl DefinitionService {
    pub fn create<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        clock: &dyn Clock,
        draft: DefinitionDraft,
    ) -> Result<RecurringChargeDefinition, CoreError> {
        Policy::authorize(actor, Capability::ManageCharges)?;
        validate_draft(&draft)?;
        let mut definition = RecurringChargeDefinition::new(
            draft.title.trim(),
            draft.amount,
            draft.rule,
            draft.start_date,
            draft.category_id,
            actor.id,
            clock.now(),
        );
        definition.end_date = draft.end_date;
        definition.notes = draft.notes;

        store.transaction(|tx| {
            ensure_category(&*tx, definition.category_id, None)?;
            tx.insert_definition(&definition)
        })?;
        tracing::info!(definition = %definition.id, title = %definition.title, "definition created");
        Ok(definition)
    }

    /// Applies `draft` and realigns the schedule with a moved start date.
    pub fn update<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        clock: &dyn Clock,
        id: Uuid,
        draft: DefinitionDraft,
    ) -> Result<RecurringChargeDefinition, CoreError> {
        Policy::authorize(actor, Capability::ManageCharges)?;
        validate_draft(&draft)?;
        let now = clock.now();
        store.transaction(|tx| {
            let mut definition = load(&*tx, id)?;
            ensure_category(&*tx, draft.category_id, Some(definition.category_id))?;

            definition.title = draft.title.trim().to_string();
            definition.amount = draft.amount;
            definition.rule = draft.rule;
            definition.start_date = draft.start_date;
            definition.end_date = draft.end_date;
            definition.category_id = draft.category_id;
            definition.notes = draft.notes.clone();

            let schedulable = matches!(
                definition.status,
                DefinitionStatus::Active | DefinitionStatus::Paused
            );
            let behind_start = definition
                .next_run_date
                .map_or(true, |next| next < definition.start_date);
            if schedulable && behind_start {
                definition.next_run_date = Some(definition.start_date);
            }
            definition.touch(now);
            tx.update_definition(&definition)?;
            Ok(definition)
        })
    }

    pub fn pause<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        clock: &dyn Clock,
        id: Uuid,
    ) -> Result<RecurringChargeDefinition, CoreError> {
        Self::transition(store, actor, clock, id, |definition| {
            if definition.status != DefinitionStatus::Active {
                return Err(CoreError::InvalidOperation(format!(
                    "only active definitions can be paused (status is {})",
                    definition.status
                )));
            }
            definition.status = DefinitionStatus::Paused;
            Ok(())
        })
    }

    /// Reactivates a paused definition. Cancelled and completed ones stay put.
    pub fn resume<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        clock: &dyn Clock,
        id: Uuid,
    ) -> Result<RecurringChargeDefinition, CoreError> {
        Self::transition(store, actor, clock, id, |definition| {
            if definition.status.is_terminal() {
                return Err(CoreError::InvalidOperation(format!(
                    "{} definitions cannot be resumed",
                    definition.status
                )));
            }
            definition.status = DefinitionStatus::Active;
            Ok(())
        })
    }

    pub fn cancel<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        clock: &dyn Clock,
        id: Uuid,
    ) -> Result<RecurringChargeDefinition, CoreError> {
        Self::transition(store, actor, clock, id, |definition| {
            definition.status = DefinitionStatus::Cancelled;
            Ok(())
        })
    }

    pub fn get<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        id: Uuid,
    ) -> Result<RecurringChargeDefinition, CoreError> {
        Policy::authorize(actor, Capability::ViewCharges)?;
        store.read(|tx| load(tx, id))
    }

    /// All definitions, latest schedule first.
    pub fn list<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        today: NaiveDate,
    ) -> Result<Vec<DefinitionOverview>, CoreError> {
        Policy::authorize(actor, Capability::ViewCharges)?;
        store.read(|tx| {
            let mut definitions = tx.definitions()?;
            definitions.sort_by(|a, b| {
                b.next_run_date
                    .cmp(&a.next_run_date)
                    .then_with(|| b.id.cmp(&a.id))
            });
            definitions
                .into_iter()
                .map(|definition| {
                    Ok(DefinitionOverview {
                        category_name: category_name(tx, definition.category_id)?,
                        advance_total: tx.advance_total(definition.id)?,
                        next_due_date: next_due_date(tx, definition.id, today)?,
                        definition,
                    })
                })
                .collect()
        })
    }

    pub fn summary<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        id: Uuid,
        today: NaiveDate,
    ) -> Result<DefinitionSummary, CoreError> {
        Policy::authorize(actor, Capability::ViewCharges)?;
        let advance = AdvanceService::ledger(store, actor, id)?;
        store.read(|tx| {
            let definition = load(tx, id)?;
            let mut invoices = InvoiceCounts::default();
            for invoice in tx.invoices(Some(id))? {
                invoices.total += 1;
                if invoice.status == InvoiceStatus::Paid {
                    invoices.paid += 1;
                } else if invoice.due_date < today {
                    invoices.overdue += 1;
                } else {
                    invoices.unpaid += 1;
                }
            }
            Ok(DefinitionSummary {
                category_name: category_name(tx, definition.category_id)?,
                next_due_date: next_due_date(tx, id, today)?,
                definition,
                invoices,
                advance,
            })
        })
    }

    fn transition<S, F>(
        store: &mut S,
        actor: &Actor,
        clock: &dyn Clock,
        id: Uuid,
        change: F,
    ) -> Result<RecurringChargeDefinition, CoreError>
    where
        S: ChargeStore,
        F: FnOnce(&mut RecurringChargeDefinition) -> Result<(), CoreError>,
    {
        Policy::authorize(actor, Capability::ManageCharges)?;
        let now = clock.now();
        let definition = store.transaction(|tx| {
            let mut definition = load(&*tx, id)?;
            change(&mut definition)?;
            definition.touch(now);
            tx.update_definition(&definition)?;
            Ok(definition)
        })?;
        tracing::info!(definition = %id, status = %definition.status, "definition status changed");
        Ok(definition)
    }
}

fn load(tx: &dyn ChargeTx, id: Uuid) -> Result<RecurringChargeDefinition, CoreError> {
    tx.definition(id)?.ok_or(CoreError::DefinitionNotFound(id))
}

fn category_name(tx: &dyn ChargeTx, id: Uuid) -> Result<Option<String>, CoreError> {
    Ok(tx.category(id)?.map(|category| category.name))
}

fn next_due_date(
    tx: &dyn ChargeTx,
    definition_id: Uuid,
    today: NaiveDate,
) -> Result<Option<NaiveDate>, CoreError> {
    Ok(tx
        .invoices(Some(definition_id))?
        .into_iter()
        .filter(|invoice| invoice.status.is_open() && invoice.due_date >= today)
        .map(|invoice| invoice.due_date)
        .min())
}

/// Requires an existing category that is active, unless it is `current`.
fn ensure_category(
    tx: &dyn ChargeTx,
    category_id: Uuid,
    current: Option<Uuid>,
) -> Result<(), CoreError> {
    let category = tx
        .category(category_id)?
        .ok_or(CoreError::CategoryNotFound(category_id))?;
    if !category.is_active() && current != Some(category_id) {
        return Err(CoreError::Validation(format!(
            "category `{}` is inactive",
            category.name
        )));
    }
    Ok(())
}

fn validate_draft(draft: &DefinitionDraft) -> Result<(), CoreError> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(CoreError::Validation("title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(CoreError::Validation(format!(
            "title exceeds {MAX_TITLE_LEN} characters"
        )));
    }
    if draft.amount < Decimal::ZERO {
        return Err(CoreError::Validation("amount cannot be negative".into()));
    }
    draft
        .rule
        .validate()
        .map_err(|err| CoreError::Validation(err.to_string()))?;
    if draft.end_date.is_some_and(|end| end < draft.start_date) {
        return Err(CoreError::Validation(
            "end date must be on or after the start date".into(),
        ));
    }
    if draft
        .notes
        .as_ref()
        .is_some_and(|notes| notes.chars().count() > MAX_NOTES_LEN)
    {
        return Err(CoreError::Validation(format!(
            "notes exceed {MAX_NOTES_LEN} characters"
        )));
    }
    Ok(())
}
