//! Invoices, invoice payments and advance payments attached to recurring charges.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::{money_tolerance, non_negative_money, round_money, Amounted, Identifiable},
    instance::GeneratedChargeInstance,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Issued,
    Unpaid,
    Overdue,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn is_open(self) -> bool {
        self != InvoiceStatus::Paid
    }

    /// Status of an invoice after a payment has been recorded against it.
    pub fn after_payment(settled: bool, due_date: NaiveDate, today: NaiveDate) -> InvoiceStatus {
        if settled {
            InvoiceStatus::Paid
        } else if due_date < today {
            InvoiceStatus::Overdue
        } else {
            InvoiceStatus::Unpaid
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "issued" => Ok(InvoiceStatus::Issued),
            "unpaid" => Ok(InvoiceStatus::Unpaid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "paid" => Ok(InvoiceStatus::Paid),
            other => Err(format!("unknown invoice status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Bank,
    Card,
    Mobile,
    /// Drawn from a definition's prepaid advance balance.
    Advance,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Bank => "bank",
            PaymentMethod::Card => "card",
            PaymentMethod::Mobile => "mobile",
            PaymentMethod::Advance => "advance",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "bank" => Ok(PaymentMethod::Bank),
            "card" => Ok(PaymentMethod::Card),
            "mobile" => Ok(PaymentMethod::Mobile),
            "advance" => Ok(PaymentMethod::Advance),
            other => Err(format!("unknown payment method `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    Full,
    Partial,
}

impl PaymentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentKind::Full => "full",
            PaymentKind::Partial => "partial",
        }
    }

    /// `Full` when `amount` covers `remaining` within the settlement tolerance.
    pub fn for_amount(amount: Decimal, remaining: Decimal) -> PaymentKind {
        if amount >= remaining - money_tolerance() {
            PaymentKind::Full
        } else {
            PaymentKind::Partial
        }
    }
}

impl FromStr for PaymentKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(PaymentKind::Full),
            "partial" => Ok(PaymentKind::Partial),
            other => Err(format!("unknown payment kind `{other}`")),
        }
    }
}

/// Paid and outstanding amounts of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub paid: Decimal,
    pub remaining: Decimal,
}

impl Settlement {
    pub fn is_settled(&self) -> bool {
        self.remaining <= money_tolerance()
    }
}

/// Invoice raised for a generated charge instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeInvoice {
    pub id: Uuid,
    pub instance_id: Uuid,
    #[serde(default)]
    pub definition_id: Option<Uuid>,
    pub invoice_no: String,
    pub status: InvoiceStatus,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub paid_at: Option<NaiveDate>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl ChargeInvoice {
    /// Raises an unpaid invoice due on the instance's charge date.
    pub fn for_instance(
        instance: &GeneratedChargeInstance,
        invoice_no: String,
        currency: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instance_id: instance.id,
            definition_id: instance.definition_id,
            invoice_no,
            status: InvoiceStatus::Unpaid,
            invoice_date: instance.charge_date,
            due_date: instance.charge_date,
            amount: instance.amount,
            currency: currency.into(),
            notes: instance.note.clone(),
            paid_at: None,
            created_by: instance.created_by,
            created_at,
        }
    }

    /// Computes paid/remaining amounts given the sum of recorded payments.
    ///
    /// An invoice marked paid without payment rows counts as fully paid.
    pub fn settlement(&self, paid_total: Decimal) -> Settlement {
        let amount = round_money(self.amount);
        let mut paid = round_money(paid_total);
        if self.status == InvoiceStatus::Paid && paid <= Decimal::ZERO {
            paid = amount;
        }
        Settlement {
            paid,
            remaining: non_negative_money(amount - paid),
        }
    }

    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        self.status.is_open() && self.due_date < today
    }
}

impl Identifiable for ChargeInvoice {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Amounted for ChargeInvoice {
    fn amount(&self) -> Decimal {
        self.amount
    }
}

/// A payment recorded against an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoicePayment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub method: PaymentMethod,
    pub kind: PaymentKind,
    pub amount: Decimal,
    pub paid_at: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Amounted for InvoicePayment {
    fn amount(&self) -> Decimal {
        self.amount
    }
}

/// Money prepaid against future cycles of a definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdvancePayment {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub paid_at: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Amounted for AdvancePayment {
    fn amount(&self) -> Decimal {
        self.amount
    }
}

/// Formats `PREFIX-YYYY-NNNN`.
pub fn format_invoice_number(prefix: &str, year: i32, sequence: u32) -> String {
    format!("{prefix}-{year}-{sequence:04}")
}

/// Extracts the sequence from a number produced by [`format_invoice_number`]
/// for the same prefix and year.
pub fn invoice_sequence(prefix: &str, year: i32, invoice_no: &str) -> Option<u32> {
    invoice_no
        .strip_prefix(&format!("{prefix}-{year}-"))?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn invoice(amount: Decimal, status: InvoiceStatus) -> ChargeInvoice {
        let date = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        ChargeInvoice {
            id: Uuid::new_v4(),
            instance_id: Uuid::new_v4(),
            definition_id: None,
            invoice_no: "EXP-2026-0001".into(),
            status,
            invoice_date: date,
            due_date: date,
            amount,
            currency: "USD".into(),
            notes: None,
            paid_at: None,
            created_by: Uuid::nil(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn invoice_numbers_round_trip_sequence() {
        let number = format_invoice_number("EXP", 2026, 7);
        assert_eq!(number, "EXP-2026-0007");
        assert_eq!(invoice_sequence("EXP", 2026, &number), Some(7));
        assert_eq!(invoice_sequence("EXP", 2025, &number), None);
        assert_eq!(invoice_sequence("EXP", 2026, "EXP-2026-12345"), Some(12345));
    }

    #[test]
    fn settlement_treats_paid_without_rows_as_fully_paid() {
        let paid = invoice(dec!(80), InvoiceStatus::Paid).settlement(Decimal::ZERO);
        assert_eq!(paid.remaining, Decimal::ZERO);
        assert!(paid.is_settled());

        let partial = invoice(dec!(150), InvoiceStatus::Unpaid).settlement(dec!(100));
        assert_eq!(partial.remaining, dec!(50));
        assert!(!partial.is_settled());
    }

    #[test]
    fn payment_kind_tolerates_sub_cent_difference() {
        assert_eq!(PaymentKind::for_amount(dec!(49.995), dec!(50)), PaymentKind::Full);
        assert_eq!(PaymentKind::for_amount(dec!(49.99), dec!(50)), PaymentKind::Partial);
    }

    #[test]
    fn status_after_payment_depends_on_due_date() {
        let due = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let later = NaiveDate::from_ymd_opt(2026, 4, 2).unwrap();
        assert_eq!(InvoiceStatus::after_payment(true, due, later), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::after_payment(false, due, later), InvoiceStatus::Overdue);
        assert_eq!(InvoiceStatus::after_payment(false, due, due), InvoiceStatus::Unpaid);
    }
}
