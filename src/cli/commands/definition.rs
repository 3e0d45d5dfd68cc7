use chrono::NaiveDate;
use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use tally_domain::{RecurrenceRule, RecurrenceType, RecurringChargeDefinition};
use tally_engine::{DefinitionDraft, DefinitionService};
use uuid::Uuid;

use crate::{
    cli::{output, Session},
    errors::TallyError,
};

#[derive(Subcommand, Debug)]
pub enum DefinitionCommand {
    /// Create an active recurring charge
    Add(AddArgs),
    /// Change the fields of a recurring charge
    Edit(EditArgs),
    /// List every recurring charge
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show invoices and advance balance for one recurring charge
    Show {
        id: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// Stop generating until resumed
    Pause { id: Uuid },
    /// Continue generating a paused charge
    Resume { id: Uuid },
    /// Stop a recurring charge for good
    Cancel { id: Uuid },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub amount: Decimal,
    /// daily, weekly, monthly or yearly
    #[arg(long, default_value = "monthly")]
    pub unit: RecurrenceType,
    #[arg(long, default_value_t = 1)]
    pub every: u32,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: NaiveDate,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end: Option<NaiveDate>,
    #[arg(long, value_name = "ID")]
    pub category: Uuid,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub id: Uuid,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub amount: Option<Decimal>,
    #[arg(long)]
    pub unit: Option<RecurrenceType>,
    #[arg(long)]
    pub every: Option<u32>,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: Option<NaiveDate>,
    #[arg(long, value_name = "YYYY-MM-DD", conflicts_with = "clear_end")]
    pub end: Option<NaiveDate>,
    /// Remove the end date.
    #[arg(long)]
    pub clear_end: bool,
    #[arg(long, value_name = "ID")]
    pub category: Option<Uuid>,
    #[arg(long, conflicts_with = "clear_notes")]
    pub notes: Option<String>,
    #[arg(long)]
    pub clear_notes: bool,
}

impl EditArgs {
    /// Applies the given flags over the stored values.
    fn merge(self, current: &RecurringChargeDefinition) -> DefinitionDraft {
        let end_date = if self.clear_end {
            None
        } else {
            self.end.or(current.end_date)
        };
        let notes = if self.clear_notes {
            None
        } else {
            self.notes.or_else(|| current.notes.clone())
        };
        DefinitionDraft {
            title: self.title.unwrap_or_else(|| current.title.clone()),
            amount: self.amount.unwrap_or(current.amount),
            rule: RecurrenceRule {
                recurrence_type: self.unit.unwrap_or(current.rule.recurrence_type),
                recurrence_interval: self.every.unwrap_or(current.rule.recurrence_interval),
            },
            start_date: self.start.unwrap_or(current.start_date),
            end_date,
            category_id: self.category.unwrap_or(current.category_id),
            notes,
        }
    }
}

pub fn run(session: &mut Session, command: DefinitionCommand) -> Result<(), TallyError> {
    let clock = session.clock.clone();
    match command {
        DefinitionCommand::Add(args) => {
            let draft = DefinitionDraft {
                title: args.title,
                amount: args.amount,
                rule: RecurrenceRule {
                    recurrence_type: args.unit,
                    recurrence_interval: args.every,
                },
                start_date: args.start,
                end_date: args.end,
                category_id: args.category,
                notes: args.notes,
            };
            let definition =
                DefinitionService::create(&mut session.store, &session.actor, clock.as_ref(), draft)?;
            println!(
                "Recurring charge `{}` created: {} (first run {})",
                definition.title,
                definition.id,
                output::or_dash(definition.next_run_date)
            );
        }
        DefinitionCommand::Edit(args) => {
            let id = args.id;
            let current = DefinitionService::get(&mut session.store, &session.actor, id)?;
            let draft = args.merge(&current);
            let definition = DefinitionService::update(
                &mut session.store,
                &session.actor,
                clock.as_ref(),
                id,
                draft,
            )?;
            println!(
                "Recurring charge `{}` updated (next run {}).",
                definition.title,
                output::or_dash(definition.next_run_date)
            );
        }
        DefinitionCommand::List { json } => {
            let today = session.today();
            let rows = DefinitionService::list(&mut session.store, &session.actor, today)?;
            if json {
                return output::print_json(&rows);
            }
            if rows.is_empty() {
                println!("No recurring charges.");
            }
            for row in rows {
                let definition = &row.definition;
                println!(
                    "{}  {:<9}  {:>10}  {:<14}  next {:<10}  {}",
                    definition.id,
                    definition.status.as_str(),
                    output::money(definition.amount),
                    definition.rule.label(),
                    output::or_dash(definition.next_run_date),
                    definition.title
                );
            }
        }
        DefinitionCommand::Show { id, json } => {
            let today = session.today();
            let summary = DefinitionService::summary(&mut session.store, &session.actor, id, today)?;
            if json {
                return output::print_json(&summary);
            }
            let definition = &summary.definition;
            println!("{} ({})", definition.title, definition.id);
            println!("  status:     {}", definition.status);
            println!("  amount:     {}", output::money(definition.amount));
            println!("  schedule:   {}", definition.rule);
            println!(
                "  period:     {} .. {}",
                definition.start_date,
                output::or_dash(definition.end_date)
            );
            println!("  next run:   {}", output::or_dash(definition.next_run_date));
            println!("  category:   {}", output::or_dash(summary.category_name.as_deref()));
            println!(
                "  invoices:   {} total, {} paid, {} unpaid, {} overdue",
                summary.invoices.total,
                summary.invoices.paid,
                summary.invoices.unpaid,
                summary.invoices.overdue
            );
            println!("  next due:   {}", output::or_dash(summary.next_due_date));
            println!(
                "  advance:    {} paid, {} used, {} available",
                output::money(summary.advance.total),
                output::money(summary.advance.used),
                output::money(summary.advance.balance)
            );
        }
        DefinitionCommand::Pause { id } => {
            let definition =
                DefinitionService::pause(&mut session.store, &session.actor, clock.as_ref(), id)?;
            println!("Recurring charge `{}` paused.", definition.title);
        }
        DefinitionCommand::Resume { id } => {
            let definition =
                DefinitionService::resume(&mut session.store, &session.actor, clock.as_ref(), id)?;
            println!("Recurring charge `{}` resumed.", definition.title);
        }
        DefinitionCommand::Cancel { id } => {
            let definition =
                DefinitionService::cancel(&mut session.store, &session.actor, clock.as_ref(), id)?;
            println!("Recurring charge `{}` cancelled.", definition.title);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tally_domain::DefinitionStatus;

    fn stored() -> RecurringChargeDefinition {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).expect("date");
        let mut definition = RecurringChargeDefinition::new(
            "Rent",
            Decimal::from(1200),
            RecurrenceRule::monthly(),
            start,
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc::now(),
        );
        definition.end_date = NaiveDate::from_ymd_opt(2026, 12, 31);
        definition.notes = Some("Lease A".into());
        definition
    }

    fn edit(id: Uuid) -> EditArgs {
        EditArgs {
            id,
            title: None,
            amount: None,
            unit: None,
            every: None,
            start: None,
            end: None,
            clear_end: false,
            category: None,
            notes: None,
            clear_notes: false,
        }
    }

    #[test]
    fn edit_keeps_unspecified_fields() {
        let current = stored();
        let draft = EditArgs {
            amount: Some(Decimal::from(1250)),
            ..edit(current.id)
        }
        .merge(&current);

        assert_eq!(draft.amount, Decimal::from(1250));
        assert_eq!(draft.title, "Rent");
        assert_eq!(draft.end_date, current.end_date);
        assert_eq!(draft.notes.as_deref(), Some("Lease A"));
        assert_eq!(draft.category_id, current.category_id);
        assert_eq!(current.status, DefinitionStatus::Active);
    }

    #[test]
    fn edit_can_clear_optional_fields() {
        let current = stored();
        let draft = EditArgs {
            clear_end: true,
            clear_notes: true,
            every: Some(3),
            ..edit(current.id)
        }
        .merge(&current);

        assert_eq!(draft.end_date, None);
        assert_eq!(draft.notes, None);
        assert_eq!(draft.rule.recurrence_interval, 3);
    }
}
