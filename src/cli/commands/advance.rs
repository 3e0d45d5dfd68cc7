use chrono::NaiveDate;
use clap::Subcommand;
use rust_decimal::Decimal;
use tally_domain::PaymentMethod;
use tally_engine::{AdvanceRequest, AdvanceService};
use uuid::Uuid;

use crate::{
    cli::{output, Session},
    errors::TallyError,
};

#[derive(Subcommand, Debug)]
pub enum AdvanceCommand {
    /// Record money paid ahead for a recurring charge
    Add {
        /// Recurring charge the advance belongs to.
        definition: Uuid,
        #[arg(long)]
        amount: Decimal,
        /// cash, bank, card or mobile
        #[arg(long, default_value = "bank")]
        method: PaymentMethod,
        /// Defaults to today.
        #[arg(long = "paid-at", value_name = "YYYY-MM-DD")]
        paid_at: Option<NaiveDate>,
        #[arg(long)]
        reference: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Show advance totals and entries for a recurring charge
    List {
        definition: Uuid,
        #[arg(long)]
        json: bool,
    },
}

pub fn run(session: &mut Session, command: AdvanceCommand) -> Result<(), TallyError> {
    match command {
        AdvanceCommand::Add {
            definition,
            amount,
            method,
            paid_at,
            reference,
            note,
        } => {
            let request = AdvanceRequest {
                method,
                amount,
                paid_at: paid_at.unwrap_or_else(|| session.today()),
                reference,
                note,
            };
            let clock = session.clock.clone();
            let advance = AdvanceService::record(
                &mut session.store,
                &session.actor,
                clock.as_ref(),
                definition,
                request,
            )?;
            println!(
                "Advance of {} recorded on {} ({}).",
                output::money(advance.amount),
                advance.paid_at,
                advance.id
            );
        }
        AdvanceCommand::List { definition, json } => {
            let ledger = AdvanceService::ledger(&mut session.store, &session.actor, definition)?;
            if json {
                return output::print_json(&ledger);
            }
            println!(
                "Advance: {} paid, {} used, {} available",
                output::money(ledger.total),
                output::money(ledger.used),
                output::money(ledger.balance)
            );
            for entry in &ledger.advances {
                println!(
                    "  {}  {:>10}  {:<6}  {}",
                    entry.paid_at,
                    output::money(entry.amount),
                    entry.method.as_str(),
                    output::or_dash(entry.reference.as_deref())
                );
            }
        }
    }
    Ok(())
}
