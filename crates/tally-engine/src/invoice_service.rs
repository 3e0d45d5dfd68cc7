//! Invoice issuance, payment recording and overdue synchronization.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use tally_domain::{
    format_invoice_number, round_money, Actor, ChargeInvoice, GeneratedChargeInstance,
    InvoicePayment, InvoiceStatus, PaymentKind, PaymentMethod,
};

use crate::{
    advance_service::AdvanceService,
    policy::{Capability, Policy},
    settings::EngineSettings,
    storage::{ChargeStore, ChargeTx},
    time::Clock,
    CoreError,
};

pub const MAX_REFERENCE_LEN: usize = 120;
pub const MAX_PAYMENT_NOTE_LEN: usize = 500;

/// A payment an operator wants to record against an invoice.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub amount: Decimal,
    /// Defaults to today.
    pub paid_at: Option<NaiveDate>,
    pub reference: Option<String>,
    pub note: Option<String>,
}

/// An invoice together with its payment totals.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: ChargeInvoice,
    pub paid: Decimal,
    pub remaining: Decimal,
}

/// Everything needed to write one payment row and settle the invoice.
pub(crate) struct PaymentEntry {
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub paid_at: NaiveDate,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub created_by: Uuid,
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
}

pub struct InvoiceService;

impl InvoiceService {
    /// Allocates the next `PREFIX-YYYY-NNNN` number for `year`.
    pub fn next_invoice_number(
        tx: &dyn ChargeTx,
        prefix: &str,
        year: i32,
    ) -> Result<String, CoreError> {
        let last = tx.last_invoice_sequence(prefix, year)?;
        Ok(format_invoice_number(prefix, year, last + 1))
    }

    /// Returns the invoice raised for `instance`, creating an unpaid one when none exists.
    ///
    /// The boolean is `true` when a new invoice was written.
    pub fn ensure_for_instance(
        tx: &mut dyn ChargeTx,
        instance: &GeneratedChargeInstance,
        settings: &EngineSettings,
        now: DateTime<Utc>,
    ) -> Result<(ChargeInvoice, bool), CoreError> {
        if let Some(existing) = tx.invoice_for_instance(instance.id)? {
            return Ok((existing, false));
        }
        let number = Self::next_invoice_number(
            &*tx,
            &settings.invoice_prefix,
            instance.charge_date.year(),
        )?;
        let invoice = ChargeInvoice::for_instance(instance, number, settings.currency.clone(), now);
        tx.insert_invoice(&invoice)?;
        tracing::debug!(invoice = %invoice.invoice_no, instance = %instance.id, "invoice raised");
        Ok((invoice, true))
    }

    /// Writes a payment row and moves the invoice to paid, overdue or unpaid.
    pub(crate) fn apply_payment(
        tx: &mut dyn ChargeTx,
        invoice: &mut ChargeInvoice,
        entry: PaymentEntry,
    ) -> Result<InvoicePayment, CoreError> {
        let before = invoice.settlement(tx.paid_total(invoice.id)?);
        let amount = round_money(entry.amount);
        if amount <= Decimal::ZERO {
            return Err(CoreError::Validation("payment amount must be at least 0.01".into()));
        }
        let payment = InvoicePayment {
            id: Uuid::new_v4(),
            invoice_id: invoice.id,
            method: entry.method,
            kind: PaymentKind::for_amount(amount, before.remaining),
            amount,
            paid_at: entry.paid_at,
            reference: entry.reference,
            note: entry.note,
            created_by: entry.created_by,
            created_at: entry.now,
        };
        tx.insert_payment(&payment)?;

        let after = invoice.settlement(before.paid + amount);
        let settled = after.is_settled();
        invoice.status = InvoiceStatus::after_payment(settled, invoice.due_date, entry.today);
        invoice.paid_at = settled.then_some(entry.paid_at);
        tx.update_invoice(invoice)?;
        Ok(payment)
    }

    /// Lists invoices, newest first, optionally restricted to one definition.
    pub fn list<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        definition_id: Option<Uuid>,
    ) -> Result<Vec<InvoiceView>, CoreError> {
        Policy::authorize(actor, Capability::ViewCharges)?;
        store.read(|tx| {
            tx.invoices(definition_id)?
                .into_iter()
                .map(|invoice| {
                    let settlement = invoice.settlement(tx.paid_total(invoice.id)?);
                    Ok(InvoiceView {
                        invoice,
                        paid: settlement.paid,
                        remaining: settlement.remaining,
                    })
                })
                .collect()
        })
    }

    /// Reconciles open invoice statuses with `today`, returning how many changed.
    pub fn sync_overdue<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        today: NaiveDate,
        definition_id: Option<Uuid>,
    ) -> Result<usize, CoreError> {
        Policy::authorize(actor, Capability::ManageCharges)?;
        let changed = store.transaction(|tx| {
            let mut changed = 0;
            for mut invoice in tx.invoices(definition_id)? {
                let target = match invoice.status {
                    InvoiceStatus::Issued | InvoiceStatus::Unpaid if invoice.due_date < today => {
                        InvoiceStatus::Overdue
                    }
                    InvoiceStatus::Issued | InvoiceStatus::Overdue if invoice.due_date >= today => {
                        InvoiceStatus::Unpaid
                    }
                    _ => continue,
                };
                invoice.status = target;
                tx.update_invoice(&invoice)?;
                changed += 1;
            }
            Ok(changed)
        })?;
        tracing::info!(changed, %today, "invoice statuses synchronized");
        Ok(changed)
    }

    /// Records an operator payment against an invoice.
    ///
    /// Amounts are capped at the remaining balance, or at the definition's
    /// advance balance when paying from advance.
    pub fn record_payment<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        clock: &dyn Clock,
        invoice_id: Uuid,
        request: PaymentRequest,
    ) -> Result<InvoicePayment, CoreError> {
        Policy::authorize(actor, Capability::RecordPayments)?;
        validate_payment(&request)?;
        let now = clock.now();
        let today = clock.today();

        let payment = store.transaction(|tx| {
            let mut invoice = tx
                .invoice(invoice_id)?
                .ok_or(CoreError::InvoiceNotFound(invoice_id))?;
            if invoice.status == InvoiceStatus::Paid {
                return Err(CoreError::InvalidOperation(format!(
                    "invoice {} is already paid",
                    invoice.invoice_no
                )));
            }
            let remaining = invoice.settlement(tx.paid_total(invoice.id)?).remaining;
            if remaining <= Decimal::ZERO {
                return Err(CoreError::InvalidOperation(format!(
                    "invoice {} has nothing left to pay",
                    invoice.invoice_no
                )));
            }

            let mut amount = request.amount.min(remaining);
            if request.method == PaymentMethod::Advance {
                let definition_id = invoice.definition_id.ok_or_else(|| {
                    CoreError::InvalidOperation(
                        "invoice is not linked to a recurring charge".into(),
                    )
                })?;
                let balance = AdvanceService::balance_in(&*tx, definition_id)?;
                if balance <= Decimal::ZERO {
                    return Err(CoreError::InvalidOperation(
                        "no advance balance available".into(),
                    ));
                }
                amount = amount.min(balance);
            }

            Self::apply_payment(
                tx,
                &mut invoice,
                PaymentEntry {
                    method: request.method,
                    amount,
                    paid_at: request.paid_at.unwrap_or(today),
                    reference: request.reference.clone(),
                    note: request.note.clone(),
                    created_by: actor.id,
                    now,
                    today,
                },
            )
        })?;
        tracing::info!(invoice = %invoice_id, amount = %payment.amount, method = %payment.method, "payment recorded");
        Ok(payment)
    }
}

fn validate_payment(request: &PaymentRequest) -> Result<(), CoreError> {
    if round_money(request.amount) <= Decimal::ZERO {
        return Err(CoreError::Validation("payment amount must be at least 0.01".into()));
    }
    if request
        .reference
        .as_ref()
        .is_some_and(|r| r.chars().count() > MAX_REFERENCE_LEN)
    {
        return Err(CoreError::Validation(format!(
            "payment reference exceeds {MAX_REFERENCE_LEN} characters"
        )));
    }
    if request
        .note
        .as_ref()
        .is_some_and(|n| n.chars().count() > MAX_PAYMENT_NOTE_LEN)
    {
        return Err(CoreError::Validation(format!(
            "payment note exceeds {MAX_PAYMENT_NOTE_LEN} characters"
        )));
    }
    Ok(())
}
