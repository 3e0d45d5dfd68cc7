//! Snapshot state shared by the in-memory and file-backed stores.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use tally_domain::{
    invoice_sequence, AdvancePayment, ChargeCategory, ChargeInvoice, DefinitionStatus,
    GeneratedChargeInstance, InvoicePayment, RecurringChargeDefinition,
};

use crate::{
    storage::{ChargeStore, ChargeTx, DueCandidate},
    CoreError,
};

pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Every record a charge store holds, kept as plain vectors.
///
/// Definition rows that fail to decode are kept verbatim in
/// `unreadable_definitions` and written back unchanged, so one bad row never
/// keeps the rest of a snapshot from loading.
#[derive(Debug, Clone)]
pub struct ChargeState {
    pub schema_version: u32,
    pub categories: Vec<ChargeCategory>,
    pub definitions: Vec<RecurringChargeDefinition>,
    pub unreadable_definitions: Vec<UnreadableDefinition>,
    pub instances: Vec<GeneratedChargeInstance>,
    pub invoices: Vec<ChargeInvoice>,
    pub payments: Vec<InvoicePayment>,
    pub advances: Vec<AdvancePayment>,
    revision: u64,
}

/// A stored definition row that does not decode.
#[derive(Debug, Clone, PartialEq)]
pub struct UnreadableDefinition {
    /// Nil when the row has no parseable id.
    pub id: Uuid,
    pub reason: String,
    pub row: Value,
}

impl UnreadableDefinition {
    fn from_row(row: Value, reason: String) -> Self {
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .unwrap_or_else(Uuid::nil);
        Self { id, reason, row }
    }

    fn next_run_date(&self) -> Option<NaiveDate> {
        self.row
            .get("next_run_date")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse().ok())
    }

    /// Same selection the decoded rows get: active and scheduled by `run_until`.
    fn looks_due(&self, run_until: NaiveDate) -> bool {
        let active = match self.row.get("status").and_then(Value::as_str) {
            Some(status) => status
                .parse::<DefinitionStatus>()
                .map_or(true, DefinitionStatus::is_active),
            None => true,
        };
        active && self.next_run_date().map_or(false, |next| next <= run_until)
    }
}

#[derive(Deserialize)]
struct StoredState {
    #[serde(default = "ChargeState::schema_version")]
    schema_version: u32,
    #[serde(default)]
    categories: Vec<ChargeCategory>,
    #[serde(default)]
    definitions: Vec<Value>,
    #[serde(default)]
    instances: Vec<GeneratedChargeInstance>,
    #[serde(default)]
    invoices: Vec<ChargeInvoice>,
    #[serde(default)]
    payments: Vec<InvoicePayment>,
    #[serde(default)]
    advances: Vec<AdvancePayment>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum DefinitionRow<'a> {
    Decoded(&'a RecurringChargeDefinition),
    Verbatim(&'a Value),
}

#[derive(Serialize)]
struct StateView<'a> {
    schema_version: u32,
    categories: &'a [ChargeCategory],
    definitions: Vec<DefinitionRow<'a>>,
    instances: &'a [GeneratedChargeInstance],
    invoices: &'a [ChargeInvoice],
    payments: &'a [InvoicePayment],
    advances: &'a [AdvancePayment],
}

impl From<StoredState> for ChargeState {
    fn from(stored: StoredState) -> Self {
        let mut definitions = Vec::with_capacity(stored.definitions.len());
        let mut unreadable_definitions = Vec::new();
        for row in stored.definitions {
            match RecurringChargeDefinition::deserialize(&row) {
                Ok(definition) => definitions.push(definition),
                Err(err) => {
                    let unreadable = UnreadableDefinition::from_row(row, err.to_string());
                    tracing::warn!(
                        id = %unreadable.id,
                        reason = %unreadable.reason,
                        "definition row kept undecoded"
                    );
                    unreadable_definitions.push(unreadable);
                }
            }
        }
        Self {
            schema_version: stored.schema_version,
            categories: stored.categories,
            definitions,
            unreadable_definitions,
            instances: stored.instances,
            invoices: stored.invoices,
            payments: stored.payments,
            advances: stored.advances,
            revision: 0,
        }
    }
}

impl Serialize for ChargeState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let definitions = self
            .definitions
            .iter()
            .map(DefinitionRow::Decoded)
            .chain(
                self.unreadable_definitions
                    .iter()
                    .map(|unreadable| DefinitionRow::Verbatim(&unreadable.row)),
            )
            .collect();
        StateView {
            schema_version: self.schema_version,
            categories: &self.categories,
            definitions,
            instances: &self.instances,
            invoices: &self.invoices,
            payments: &self.payments,
            advances: &self.advances,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChargeState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        StoredState::deserialize(deserializer).map(ChargeState::from)
    }
}

impl Default for ChargeState {
    fn default() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            categories: Vec::new(),
            definitions: Vec::new(),
            unreadable_definitions: Vec::new(),
            instances: Vec::new(),
            invoices: Vec::new(),
            payments: Vec::new(),
            advances: Vec::new(),
            revision: 0,
        }
    }
}

impl ChargeState {
    fn schema_version() -> u32 {
        STATE_SCHEMA_VERSION
    }

    /// Counter bumped by every mutation; lets callers skip persisting unchanged state.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    /// Runs `work` against a staged copy and keeps it only on success.
    pub fn stage<T, F>(&self, work: F) -> Result<(ChargeState, T), CoreError>
    where
        F: FnOnce(&mut dyn ChargeTx) -> Result<T, CoreError>,
    {
        let mut staged = self.clone();
        let value = work(&mut staged)?;
        Ok((staged, value))
    }
}

fn replace<T, K>(items: &mut [T], record: &T, key: K) -> bool
where
    T: Clone,
    K: Fn(&T) -> Uuid,
{
    let id = key(record);
    match items.iter_mut().find(|item| key(item) == id) {
        Some(slot) => {
            *slot = record.clone();
            true
        }
        None => false,
    }
}

impl ChargeTx for ChargeState {
    fn category(&self, id: Uuid) -> Result<Option<ChargeCategory>, CoreError> {
        Ok(self.categories.iter().find(|c| c.id == id).cloned())
    }

    fn categories(&self) -> Result<Vec<ChargeCategory>, CoreError> {
        let mut categories = self.categories.clone();
        categories.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(categories)
    }

    fn insert_category(&mut self, category: &ChargeCategory) -> Result<(), CoreError> {
        if self.categories.iter().any(|c| c.id == category.id) {
            return Err(CoreError::Conflict(format!("category {} exists", category.id)));
        }
        self.categories.push(category.clone());
        self.bump();
        Ok(())
    }

    fn update_category(&mut self, category: &ChargeCategory) -> Result<(), CoreError> {
        if !replace(&mut self.categories, category, |c| c.id) {
            return Err(CoreError::CategoryNotFound(category.id));
        }
        self.bump();
        Ok(())
    }

    fn definition(&self, id: Uuid) -> Result<Option<RecurringChargeDefinition>, CoreError> {
        Ok(self.definitions.iter().find(|d| d.id == id).cloned())
    }

    fn definitions(&self) -> Result<Vec<RecurringChargeDefinition>, CoreError> {
        Ok(self.definitions.clone())
    }

    fn due_definitions(
        &self,
        run_until: NaiveDate,
        only: Option<Uuid>,
    ) -> Result<Vec<DueCandidate>, CoreError> {
        let selected = |id: Uuid| only.map_or(true, |only| only == id);
        let mut due: Vec<_> = self
            .definitions
            .iter()
            .filter(|d| selected(d.id) && d.is_due(run_until))
            .map(|d| (d.next_run_date, d.id, DueCandidate::Ready(d.clone())))
            .chain(
                self.unreadable_definitions
                    .iter()
                    .filter(|u| selected(u.id) && u.looks_due(run_until))
                    .map(|u| {
                        let candidate = DueCandidate::Malformed {
                            id: u.id,
                            reason: u.reason.clone(),
                        };
                        (u.next_run_date(), u.id, candidate)
                    }),
            )
            .collect();
        due.sort_by_key(|(next_run_date, id, _)| (*next_run_date, *id));
        Ok(due.into_iter().map(|(_, _, candidate)| candidate).collect())
    }

    fn insert_definition(
        &mut self,
        definition: &RecurringChargeDefinition,
    ) -> Result<(), CoreError> {
        if self.definitions.iter().any(|d| d.id == definition.id)
            || self
                .unreadable_definitions
                .iter()
                .any(|u| u.id == definition.id)
        {
            return Err(CoreError::Conflict(format!(
                "definition {} exists",
                definition.id
            )));
        }
        self.definitions.push(definition.clone());
        self.bump();
        Ok(())
    }

    fn update_definition(
        &mut self,
        definition: &RecurringChargeDefinition,
    ) -> Result<(), CoreError> {
        if !replace(&mut self.definitions, definition, |d| d.id) {
            return Err(CoreError::DefinitionNotFound(definition.id));
        }
        self.bump();
        Ok(())
    }

    fn instance_for_cycle(
        &self,
        definition_id: Uuid,
        charge_date: NaiveDate,
    ) -> Result<Option<GeneratedChargeInstance>, CoreError> {
        Ok(self
            .instances
            .iter()
            .find(|i| i.belongs_to(definition_id) && i.charge_date == charge_date)
            .cloned())
    }

    fn instances_for_definition(
        &self,
        definition_id: Uuid,
    ) -> Result<Vec<GeneratedChargeInstance>, CoreError> {
        let mut instances: Vec<_> = self
            .instances
            .iter()
            .filter(|i| i.belongs_to(definition_id))
            .cloned()
            .collect();
        instances.sort_by_key(|i| i.charge_date);
        Ok(instances)
    }

    fn insert_instance(&mut self, instance: &GeneratedChargeInstance) -> Result<(), CoreError> {
        if let Some(definition_id) = instance.definition_id {
            if self
                .instance_for_cycle(definition_id, instance.charge_date)?
                .is_some()
            {
                return Err(CoreError::Conflict(format!(
                    "definition {} already has an instance on {}",
                    definition_id, instance.charge_date
                )));
            }
        }
        self.instances.push(instance.clone());
        self.bump();
        Ok(())
    }

    fn invoice(&self, id: Uuid) -> Result<Option<ChargeInvoice>, CoreError> {
        Ok(self.invoices.iter().find(|i| i.id == id).cloned())
    }

    fn invoice_for_instance(&self, instance_id: Uuid) -> Result<Option<ChargeInvoice>, CoreError> {
        Ok(self
            .invoices
            .iter()
            .find(|i| i.instance_id == instance_id)
            .cloned())
    }

    fn invoices(&self, definition_id: Option<Uuid>) -> Result<Vec<ChargeInvoice>, CoreError> {
        let mut invoices: Vec<_> = self
            .invoices
            .iter()
            .filter(|i| definition_id.map_or(true, |id| i.definition_id == Some(id)))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| {
            b.invoice_date
                .cmp(&a.invoice_date)
                .then_with(|| b.invoice_no.cmp(&a.invoice_no))
        });
        Ok(invoices)
    }

    fn last_invoice_sequence(&self, prefix: &str, year: i32) -> Result<u32, CoreError> {
        Ok(self
            .invoices
            .iter()
            .filter_map(|i| invoice_sequence(prefix, year, &i.invoice_no))
            .max()
            .unwrap_or(0))
    }

    fn insert_invoice(&mut self, invoice: &ChargeInvoice) -> Result<(), CoreError> {
        if self
            .invoices
            .iter()
            .any(|i| i.invoice_no == invoice.invoice_no || i.instance_id == invoice.instance_id)
        {
            return Err(CoreError::Conflict(format!(
                "invoice {} or an invoice for instance {} exists",
                invoice.invoice_no, invoice.instance_id
            )));
        }
        self.invoices.push(invoice.clone());
        self.bump();
        Ok(())
    }

    fn update_invoice(&mut self, invoice: &ChargeInvoice) -> Result<(), CoreError> {
        if !replace(&mut self.invoices, invoice, |i| i.id) {
            return Err(CoreError::InvoiceNotFound(invoice.id));
        }
        self.bump();
        Ok(())
    }

    fn payments_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<InvoicePayment>, CoreError> {
        Ok(self
            .payments
            .iter()
            .filter(|p| p.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    fn insert_payment(&mut self, payment: &InvoicePayment) -> Result<(), CoreError> {
        if !self.invoices.iter().any(|i| i.id == payment.invoice_id) {
            return Err(CoreError::InvoiceNotFound(payment.invoice_id));
        }
        self.payments.push(payment.clone());
        self.bump();
        Ok(())
    }

    fn advances_for_definition(
        &self,
        definition_id: Uuid,
    ) -> Result<Vec<AdvancePayment>, CoreError> {
        let mut advances: Vec<_> = self
            .advances
            .iter()
            .filter(|a| a.definition_id == definition_id)
            .cloned()
            .collect();
        advances.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        Ok(advances)
    }

    fn insert_advance(&mut self, advance: &AdvancePayment) -> Result<(), CoreError> {
        if !self.definitions.iter().any(|d| d.id == advance.definition_id) {
            return Err(CoreError::DefinitionNotFound(advance.definition_id));
        }
        self.advances.push(advance.clone());
        self.bump();
        Ok(())
    }
}

/// Volatile store for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryChargeStore {
    state: ChargeState,
}

impl InMemoryChargeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: ChargeState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &ChargeState {
        &self.state
    }
}

impl ChargeStore for InMemoryChargeStore {
    fn transaction<T, F>(&mut self, work: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut dyn ChargeTx) -> Result<T, CoreError>,
    {
        let (staged, value) = self.state.stage(work)?;
        self.state = staged;
        Ok(value)
    }
}
