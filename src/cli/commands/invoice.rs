use chrono::NaiveDate;
use clap::Subcommand;
use rust_decimal::Decimal;
use tally_domain::PaymentMethod;
use tally_engine::{InvoiceService, PaymentRequest};
use uuid::Uuid;

use crate::{
    cli::{output, Session},
    errors::TallyError,
};

#[derive(Subcommand, Debug)]
pub enum InvoiceCommand {
    /// List invoices, newest first
    List {
        #[arg(long, value_name = "ID")]
        definition: Option<Uuid>,
        #[arg(long)]
        json: bool,
    },
    /// Record a payment against an invoice
    Pay {
        invoice: Uuid,
        #[arg(long)]
        amount: Decimal,
        /// cash, bank, card, mobile or advance
        #[arg(long, default_value = "cash")]
        method: PaymentMethod,
        /// Defaults to today.
        #[arg(long = "paid-at", value_name = "YYYY-MM-DD")]
        paid_at: Option<NaiveDate>,
        #[arg(long)]
        reference: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Mark past-due invoices overdue and restore the rest to unpaid
    SyncOverdue {
        #[arg(long, value_name = "ID")]
        definition: Option<Uuid>,
    },
}

pub fn run(session: &mut Session, command: InvoiceCommand) -> Result<(), TallyError> {
    match command {
        InvoiceCommand::List { definition, json } => {
            let invoices = InvoiceService::list(&mut session.store, &session.actor, definition)?;
            if json {
                return output::print_json(&invoices);
            }
            if invoices.is_empty() {
                println!("No invoices.");
            }
            for view in invoices {
                let invoice = &view.invoice;
                println!(
                    "{}  {}  {:<7}  {:>10}  paid {:>10}  due {:>10}  {}",
                    invoice.invoice_no,
                    invoice.due_date,
                    invoice.status.as_str(),
                    output::money(invoice.amount),
                    output::money(view.paid),
                    output::money(view.remaining),
                    invoice.id
                );
            }
        }
        InvoiceCommand::Pay {
            invoice,
            amount,
            method,
            paid_at,
            reference,
            note,
        } => {
            let request = PaymentRequest {
                method,
                amount,
                paid_at,
                reference,
                note,
            };
            let clock = session.clock.clone();
            let payment = InvoiceService::record_payment(
                &mut session.store,
                &session.actor,
                clock.as_ref(),
                invoice,
                request,
            )?;
            println!(
                "Recorded {} {} payment of {} on {}.",
                payment.kind.as_str(),
                payment.method,
                output::money(payment.amount),
                payment.paid_at
            );
        }
        InvoiceCommand::SyncOverdue { definition } => {
            let today = session.today();
            let changed =
                InvoiceService::sync_overdue(&mut session.store, &session.actor, today, definition)?;
            println!("{changed} invoice(s) updated.");
        }
    }
    Ok(())
}
