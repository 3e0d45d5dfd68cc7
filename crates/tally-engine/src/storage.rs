//! Transactional persistence seam used by the engine and services.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use tally_domain::{
    AdvancePayment, ChargeCategory, ChargeInvoice, GeneratedChargeInstance, InvoicePayment,
    PaymentMethod, RecurringChargeDefinition,
};

use crate::CoreError;

/// A definition selected for generation.
#[derive(Debug, Clone)]
pub enum DueCandidate {
    Ready(RecurringChargeDefinition),
    /// A stored row that could not be decoded into a definition.
    Malformed { id: Uuid, reason: String },
}

impl DueCandidate {
    pub fn id(&self) -> Uuid {
        match self {
            DueCandidate::Ready(definition) => definition.id,
            DueCandidate::Malformed { id, .. } => *id,
        }
    }
}

/// Operations available inside one store transaction.
///
/// Every mutation made through a `ChargeTx` commits together or not at all.
pub trait ChargeTx {
    fn category(&self, id: Uuid) -> Result<Option<ChargeCategory>, CoreError>;
    fn categories(&self) -> Result<Vec<ChargeCategory>, CoreError>;
    fn insert_category(&mut self, category: &ChargeCategory) -> Result<(), CoreError>;
    fn update_category(&mut self, category: &ChargeCategory) -> Result<(), CoreError>;

    fn definition(&self, id: Uuid) -> Result<Option<RecurringChargeDefinition>, CoreError>;
    fn definitions(&self) -> Result<Vec<RecurringChargeDefinition>, CoreError>;
    /// Active definitions whose next run date is on or before `run_until`,
    /// ordered by next run date then id.
    fn due_definitions(
        &self,
        run_until: NaiveDate,
        only: Option<Uuid>,
    ) -> Result<Vec<DueCandidate>, CoreError>;
    fn insert_definition(&mut self, definition: &RecurringChargeDefinition)
        -> Result<(), CoreError>;
    fn update_definition(&mut self, definition: &RecurringChargeDefinition)
        -> Result<(), CoreError>;

    fn instance_for_cycle(
        &self,
        definition_id: Uuid,
        charge_date: NaiveDate,
    ) -> Result<Option<GeneratedChargeInstance>, CoreError>;
    fn instances_for_definition(
        &self,
        definition_id: Uuid,
    ) -> Result<Vec<GeneratedChargeInstance>, CoreError>;
    /// Fails with [`CoreError::Conflict`] when the definition already has an
    /// instance on the same charge date.
    fn insert_instance(&mut self, instance: &GeneratedChargeInstance) -> Result<(), CoreError>;

    fn invoice(&self, id: Uuid) -> Result<Option<ChargeInvoice>, CoreError>;
    fn invoice_for_instance(&self, instance_id: Uuid) -> Result<Option<ChargeInvoice>, CoreError>;
    fn invoices(&self, definition_id: Option<Uuid>) -> Result<Vec<ChargeInvoice>, CoreError>;
    /// Highest sequence already used for `prefix` in `year`, or 0.
    fn last_invoice_sequence(&self, prefix: &str, year: i32) -> Result<u32, CoreError>;
    fn insert_invoice(&mut self, invoice: &ChargeInvoice) -> Result<(), CoreError>;
    fn update_invoice(&mut self, invoice: &ChargeInvoice) -> Result<(), CoreError>;

    fn payments_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<InvoicePayment>, CoreError>;
    fn insert_payment(&mut self, payment: &InvoicePayment) -> Result<(), CoreError>;

    fn advances_for_definition(&self, definition_id: Uuid)
        -> Result<Vec<AdvancePayment>, CoreError>;
    fn insert_advance(&mut self, advance: &AdvancePayment) -> Result<(), CoreError>;

    /// Sum of payments recorded against an invoice.
    fn paid_total(&self, invoice_id: Uuid) -> Result<Decimal, CoreError> {
        Ok(self
            .payments_for_invoice(invoice_id)?
            .iter()
            .map(|payment| payment.amount)
            .sum())
    }

    /// Sum of `advance` payments drawn by the definition's invoices.
    fn advance_used(&self, definition_id: Uuid) -> Result<Decimal, CoreError> {
        let mut used = Decimal::ZERO;
        for invoice in self.invoices(Some(definition_id))? {
            used += self
                .payments_for_invoice(invoice.id)?
                .iter()
                .filter(|payment| payment.method == PaymentMethod::Advance)
                .map(|payment| payment.amount)
                .sum::<Decimal>();
        }
        Ok(used)
    }

    /// Sum of advances recorded for the definition.
    fn advance_total(&self, definition_id: Uuid) -> Result<Decimal, CoreError> {
        Ok(self
            .advances_for_definition(definition_id)?
            .iter()
            .map(|advance| advance.amount)
            .sum())
    }
}

/// A backend that can run closures against a [`ChargeTx`] atomically.
pub trait ChargeStore {
    /// Runs `work` in a transaction, committing only when it returns `Ok`.
    fn transaction<T, F>(&mut self, work: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut dyn ChargeTx) -> Result<T, CoreError>;

    /// Runs read-only `work`.
    fn read<T, F>(&mut self, work: F) -> Result<T, CoreError>
    where
        F: FnOnce(&dyn ChargeTx) -> Result<T, CoreError>,
    {
        self.transaction(|tx| work(&*tx))
    }
}
