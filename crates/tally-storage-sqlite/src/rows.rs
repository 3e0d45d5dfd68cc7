//! Text columns to domain records.
//!
//! Every column is stored as text so a damaged row can be reported instead of
//! aborting the query it appears in.

use std::{fmt::Display, str::FromStr};

use rusqlite::Row;

use tally_domain::{
    AdvancePayment, ChargeCategory, ChargeInvoice, GeneratedChargeInstance, InvoicePayment,
    RecurrenceRule, RecurrenceType, RecurringChargeDefinition,
};

pub(crate) const CATEGORY_COLUMNS: &str = "id, name, status, created_at";
pub(crate) const DEFINITION_COLUMNS: &str = "id, title, amount, recurrence_type, \
    recurrence_interval, start_date, end_date, next_run_date, status, category_id, notes, \
    created_by, created_at, updated_at";
pub(crate) const INSTANCE_COLUMNS: &str =
    "id, definition_id, title, amount, charge_date, category_id, note, created_by, created_at";
pub(crate) const INVOICE_COLUMNS: &str = "id, instance_id, definition_id, invoice_no, status, \
    invoice_date, due_date, amount, currency, notes, paid_at, created_by, created_at";
pub(crate) const PAYMENT_COLUMNS: &str =
    "id, invoice_id, method, kind, amount, paid_at, reference, note, created_by, created_at";
pub(crate) const ADVANCE_COLUMNS: &str =
    "id, definition_id, method, amount, paid_at, reference, note, created_by, created_at";

fn parse<T>(field: &str, value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|err| format!("{field} `{value}`: {err}"))
}

fn parse_opt<T>(field: &str, value: Option<&str>) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    value.map(|value| parse(field, value)).transpose()
}

pub(crate) struct RawCategory {
    id: String,
    name: String,
    status: String,
    created_at: String,
}

impl RawCategory {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            status: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    pub fn decode(self) -> Result<ChargeCategory, String> {
        Ok(ChargeCategory {
            id: parse("id", &self.id)?,
            name: self.name,
            status: parse("status", &self.status)?,
            created_at: parse("created_at", &self.created_at)?,
        })
    }
}

pub(crate) struct RawDefinition {
    pub id: String,
    title: String,
    amount: String,
    recurrence_type: String,
    recurrence_interval: i64,
    start_date: String,
    end_date: Option<String>,
    next_run_date: Option<String>,
    status: String,
    category_id: String,
    notes: Option<String>,
    created_by: String,
    created_at: String,
    updated_at: String,
}

impl RawDefinition {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            amount: row.get(2)?,
            recurrence_type: row.get(3)?,
            recurrence_interval: row.get(4)?,
            start_date: row.get(5)?,
            end_date: row.get(6)?,
            next_run_date: row.get(7)?,
            status: row.get(8)?,
            category_id: row.get(9)?,
            notes: row.get(10)?,
            created_by: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    pub fn decode(self) -> Result<RecurringChargeDefinition, String> {
        let recurrence_type: RecurrenceType = parse("recurrence_type", &self.recurrence_type)?;
        let recurrence_interval = u32::try_from(self.recurrence_interval).map_err(|_| {
            format!("recurrence_interval `{}` is out of range", self.recurrence_interval)
        })?;
        Ok(RecurringChargeDefinition {
            id: parse("id", &self.id)?,
            title: self.title,
            amount: parse("amount", &self.amount)?,
            rule: RecurrenceRule {
                recurrence_type,
                recurrence_interval,
            },
            start_date: parse("start_date", &self.start_date)?,
            end_date: parse_opt("end_date", self.end_date.as_deref())?,
            next_run_date: parse_opt("next_run_date", self.next_run_date.as_deref())?,
            status: parse("status", &self.status)?,
            category_id: parse("category_id", &self.category_id)?,
            notes: self.notes,
            created_by: parse("created_by", &self.created_by)?,
            created_at: parse("created_at", &self.created_at)?,
            updated_at: parse("updated_at", &self.updated_at)?,
        })
    }
}

pub(crate) struct RawInstance {
    id: String,
    definition_id: Option<String>,
    title: String,
    amount: String,
    charge_date: String,
    category_id: String,
    note: Option<String>,
    created_by: String,
    created_at: String,
}

impl RawInstance {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            definition_id: row.get(1)?,
            title: row.get(2)?,
            amount: row.get(3)?,
            charge_date: row.get(4)?,
            category_id: row.get(5)?,
            note: row.get(6)?,
            created_by: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    pub fn decode(self) -> Result<GeneratedChargeInstance, String> {
        Ok(GeneratedChargeInstance {
            id: parse("id", &self.id)?,
            definition_id: parse_opt("definition_id", self.definition_id.as_deref())?,
            title: self.title,
            amount: parse("amount", &self.amount)?,
            charge_date: parse("charge_date", &self.charge_date)?,
            category_id: parse("category_id", &self.category_id)?,
            note: self.note,
            created_by: parse("created_by", &self.created_by)?,
            created_at: parse("created_at", &self.created_at)?,
        })
    }
}

pub(crate) struct RawInvoice {
    id: String,
    instance_id: String,
    definition_id: Option<String>,
    invoice_no: String,
    status: String,
    invoice_date: String,
    due_date: String,
    amount: String,
    currency: String,
    notes: Option<String>,
    paid_at: Option<String>,
    created_by: String,
    created_at: String,
}

impl RawInvoice {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            instance_id: row.get(1)?,
            definition_id: row.get(2)?,
            invoice_no: row.get(3)?,
            status: row.get(4)?,
            invoice_date: row.get(5)?,
            due_date: row.get(6)?,
            amount: row.get(7)?,
            currency: row.get(8)?,
            notes: row.get(9)?,
            paid_at: row.get(10)?,
            created_by: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    pub fn decode(self) -> Result<ChargeInvoice, String> {
        Ok(ChargeInvoice {
            id: parse("id", &self.id)?,
            instance_id: parse("instance_id", &self.instance_id)?,
            definition_id: parse_opt("definition_id", self.definition_id.as_deref())?,
            invoice_no: self.invoice_no,
            status: parse("status", &self.status)?,
            invoice_date: parse("invoice_date", &self.invoice_date)?,
            due_date: parse("due_date", &self.due_date)?,
            amount: parse("amount", &self.amount)?,
            currency: self.currency,
            notes: self.notes,
            paid_at: parse_opt("paid_at", self.paid_at.as_deref())?,
            created_by: parse("created_by", &self.created_by)?,
            created_at: parse("created_at", &self.created_at)?,
        })
    }
}

pub(crate) struct RawPayment {
    id: String,
    invoice_id: String,
    method: String,
    kind: String,
    amount: String,
    paid_at: String,
    reference: Option<String>,
    note: Option<String>,
    created_by: String,
    created_at: String,
}

impl RawPayment {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            invoice_id: row.get(1)?,
            method: row.get(2)?,
            kind: row.get(3)?,
            amount: row.get(4)?,
            paid_at: row.get(5)?,
            reference: row.get(6)?,
            note: row.get(7)?,
            created_by: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    pub fn decode(self) -> Result<InvoicePayment, String> {
        Ok(InvoicePayment {
            id: parse("id", &self.id)?,
            invoice_id: parse("invoice_id", &self.invoice_id)?,
            method: parse("method", &self.method)?,
            kind: parse("kind", &self.kind)?,
            amount: parse("amount", &self.amount)?,
            paid_at: parse("paid_at", &self.paid_at)?,
            reference: self.reference,
            note: self.note,
            created_by: parse("created_by", &self.created_by)?,
            created_at: parse("created_at", &self.created_at)?,
        })
    }
}

pub(crate) struct RawAdvance {
    id: String,
    definition_id: String,
    method: String,
    amount: String,
    paid_at: String,
    reference: Option<String>,
    note: Option<String>,
    created_by: String,
    created_at: String,
}

impl RawAdvance {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            definition_id: row.get(1)?,
            method: row.get(2)?,
            amount: row.get(3)?,
            paid_at: row.get(4)?,
            reference: row.get(5)?,
            note: row.get(6)?,
            created_by: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    pub fn decode(self) -> Result<AdvancePayment, String> {
        Ok(AdvancePayment {
            id: parse("id", &self.id)?,
            definition_id: parse("definition_id", &self.definition_id)?,
            method: parse("method", &self.method)?,
            amount: parse("amount", &self.amount)?,
            paid_at: parse("paid_at", &self.paid_at)?,
            reference: self.reference,
            note: self.note,
            created_by: parse("created_by", &self.created_by)?,
            created_at: parse("created_at", &self.created_at)?,
        })
    }
}
