use clap::Subcommand;
use tally_domain::CategoryStatus;
use tally_engine::CategoryService;
use uuid::Uuid;

use crate::{
    cli::{output, Session},
    errors::TallyError,
};

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    /// Add an active category
    Add { name: String },
    /// List categories
    List {
        #[arg(long)]
        json: bool,
    },
    /// Stop offering a category for new definitions
    Deactivate { id: Uuid },
    /// Make a category selectable again
    Activate { id: Uuid },
}

pub fn run(session: &mut Session, command: CategoryCommand) -> Result<(), TallyError> {
    match command {
        CategoryCommand::Add { name } => {
            let category = CategoryService::create(
                &mut session.store,
                &session.actor,
                session.clock.as_ref(),
                &name,
            )?;
            println!("Category `{}` created: {}", category.name, category.id);
        }
        CategoryCommand::List { json } => {
            let categories = CategoryService::list(&mut session.store, &session.actor)?;
            if json {
                return output::print_json(&categories);
            }
            if categories.is_empty() {
                println!("No categories.");
            }
            for category in categories {
                println!("{}  {:<8}  {}", category.id, category.status.as_str(), category.name);
            }
        }
        CategoryCommand::Deactivate { id } => {
            set_status(session, id, CategoryStatus::Inactive)?;
        }
        CategoryCommand::Activate { id } => {
            set_status(session, id, CategoryStatus::Active)?;
        }
    }
    Ok(())
}

fn set_status(session: &mut Session, id: Uuid, status: CategoryStatus) -> Result<(), TallyError> {
    let category = CategoryService::set_status(&mut session.store, &session.actor, id, status)?;
    println!("Category `{}` is now {}.", category.name, category.status);
    Ok(())
}
