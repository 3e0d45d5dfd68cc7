//! Prepaid advance balances attached to recurring definitions.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use tally_domain::{
    non_negative_money, round_money, Actor, AdvancePayment, ChargeInvoice, PaymentMethod,
};

use crate::{
    invoice_service::{InvoiceService, PaymentEntry, MAX_PAYMENT_NOTE_LEN, MAX_REFERENCE_LEN},
    policy::{Capability, Policy},
    storage::{ChargeStore, ChargeTx},
    time::Clock,
    CoreError,
};

pub const AUTO_APPLY_NOTE: &str = "Auto-applied from recurring advance balance.";

#[derive(Debug, Clone)]
pub struct AdvanceRequest {
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub paid_at: NaiveDate,
    pub reference: Option<String>,
    pub note: Option<String>,
}

/// Advance totals and entries for one definition.
#[derive(Debug, Clone, Serialize)]
pub struct AdvanceLedger {
    pub total: Decimal,
    pub used: Decimal,
    pub balance: Decimal,
    pub advances: Vec<AdvancePayment>,
}

pub struct AdvanceService;

impl AdvanceService {
    /// Unused advance money for `definition_id`, never negative.
    pub fn balance_in(tx: &dyn ChargeTx, definition_id: Uuid) -> Result<Decimal, CoreError> {
        let total = tx.advance_total(definition_id)?;
        let used = tx.advance_used(definition_id)?;
        Ok(non_negative_money(total - used))
    }

    /// Pays as much of `invoice` as the definition's advance balance allows.
    ///
    /// Returns the amount drawn, zero when nothing was applied.
    pub fn apply_to_invoice(
        tx: &mut dyn ChargeTx,
        invoice: &mut ChargeInvoice,
        paid_at: NaiveDate,
        created_by: Uuid,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<Decimal, CoreError> {
        let Some(definition_id) = invoice.definition_id else {
            return Ok(Decimal::ZERO);
        };
        let remaining = invoice.settlement(tx.paid_total(invoice.id)?).remaining;
        if remaining <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        let balance = Self::balance_in(&*tx, definition_id)?;
        if balance <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        let amount = round_money(remaining.min(balance));
        if amount <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }

        let payment = InvoiceService::apply_payment(
            tx,
            invoice,
            PaymentEntry {
                method: PaymentMethod::Advance,
                amount,
                paid_at,
                reference: None,
                note: Some(AUTO_APPLY_NOTE.into()),
                created_by,
                now,
                today,
            },
        )?;
        tracing::debug!(
            invoice = %invoice.invoice_no,
            amount = %payment.amount,
            kind = payment.kind.as_str(),
            "advance balance applied"
        );
        Ok(payment.amount)
    }

    /// Records money paid ahead for future cycles of a definition.
    pub fn record<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        clock: &dyn Clock,
        definition_id: Uuid,
        request: AdvanceRequest,
    ) -> Result<AdvancePayment, CoreError> {
        Policy::authorize(actor, Capability::RecordPayments)?;
        validate_advance(&request)?;
        let advance = AdvancePayment {
            id: Uuid::new_v4(),
            definition_id,
            method: request.method,
            amount: round_money(request.amount),
            paid_at: request.paid_at,
            reference: request.reference,
            note: request.note,
            created_by: actor.id,
            created_at: clock.now(),
        };
        store.transaction(|tx| {
            if tx.definition(definition_id)?.is_none() {
                return Err(CoreError::DefinitionNotFound(definition_id));
            }
            tx.insert_advance(&advance)
        })?;
        tracing::info!(definition = %definition_id, amount = %advance.amount, "advance recorded");
        Ok(advance)
    }

    pub fn ledger<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        definition_id: Uuid,
    ) -> Result<AdvanceLedger, CoreError> {
        Policy::authorize(actor, Capability::ViewCharges)?;
        store.read(|tx| {
            if tx.definition(definition_id)?.is_none() {
                return Err(CoreError::DefinitionNotFound(definition_id));
            }
            let total = round_money(tx.advance_total(definition_id)?);
            let used = round_money(tx.advance_used(definition_id)?);
            Ok(AdvanceLedger {
                total,
                used,
                balance: non_negative_money(total - used),
                advances: tx.advances_for_definition(definition_id)?,
            })
        })
    }
}

fn validate_advance(request: &AdvanceRequest) -> Result<(), CoreError> {
    if request.method == PaymentMethod::Advance {
        return Err(CoreError::Validation(
            "an advance cannot be paid from the advance balance".into(),
        ));
    }
    if request.amount < Decimal::new(1, 2) {
        return Err(CoreError::Validation("advance amount must be at least 0.01".into()));
    }
    if request
        .reference
        .as_ref()
        .is_some_and(|r| r.chars().count() > MAX_REFERENCE_LEN)
    {
        return Err(CoreError::Validation(format!(
            "advance reference exceeds {MAX_REFERENCE_LEN} characters"
        )));
    }
    if request
        .note
        .as_ref()
        .is_some_and(|n| n.chars().count() > MAX_PAYMENT_NOTE_LEN)
    {
        return Err(CoreError::Validation(format!(
            "advance note exceeds {MAX_PAYMENT_NOTE_LEN} characters"
        )));
    }
    Ok(())
}
