//! `tally_core_cli` argument model and dispatch.

mod commands;
mod context;
mod output;
mod store;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tally_config::Backend;

pub use context::{engine_settings, Session};
pub use store::AnyStore;

use crate::errors::TallyError;
use commands::{
    advance::AdvanceCommand, category::CategoryCommand, config::ConfigCommand,
    definition::DefinitionCommand, generate::GenerateArgs, invoice::InvoiceCommand,
};

#[derive(Parser, Debug)]
#[command(
    name = "tally_core_cli",
    version,
    about = "Generate and administer recurring charges"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file to read instead of the platform default.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the charge store.
    #[arg(long = "data-dir", global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Storage backend, overriding the config file.
    #[arg(long, global = true)]
    pub backend: Option<Backend>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Materialize every due cycle; meant to run from a scheduler.
    Generate(GenerateArgs),

    /// Manage charge categories
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },

    /// Manage recurring charge definitions
    Definition {
        #[command(subcommand)]
        command: DefinitionCommand,
    },

    /// Record prepaid advances
    Advance {
        #[command(subcommand)]
        command: AdvanceCommand,
    },

    /// List, pay and reconcile invoices
    Invoice {
        #[command(subcommand)]
        command: InvoiceCommand,
    },

    /// Inspect and back up the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Print build metadata
    Version,
}

/// Parses process arguments and runs the selected command.
pub fn run_cli() -> Result<(), TallyError> {
    run(Cli::parse())
}

pub fn run(cli: Cli) -> Result<(), TallyError> {
    let Cli { global, command } = cli;
    match command {
        Command::Version => {
            crate::init();
            commands::system::version();
            Ok(())
        }
        Command::Config { command } => {
            let (manager, config) = context::load_config(&global)?;
            crate::init_with_filter(config.log_filter.as_deref());
            commands::config::run(&manager, &config, command)
        }
        Command::Generate(args) => commands::generate::run(&mut Session::open(&global)?, args),
        Command::Category { command } => {
            commands::category::run(&mut Session::open(&global)?, command)
        }
        Command::Definition { command } => {
            commands::definition::run(&mut Session::open(&global)?, command)
        }
        Command::Advance { command } => {
            commands::advance::run(&mut Session::open(&global)?, command)
        }
        Command::Invoice { command } => {
            commands::invoice::run(&mut Session::open(&global)?, command)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn argument_model_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "tally_core_cli",
            "generate",
            "--as-of",
            "2026-04-01",
            "--backend",
            "json",
            "--data-dir",
            "/tmp/tally",
        ])
        .expect("parse");

        assert_eq!(cli.global.backend, Some(Backend::Json));
        assert_eq!(cli.global.data_dir, Some(PathBuf::from("/tmp/tally")));
        assert!(matches!(cli.command, Command::Generate(_)));
    }

    #[test]
    fn malformed_dates_are_rejected_by_the_parser() {
        let err = Cli::try_parse_from(["tally_core_cli", "generate", "--as-of", "04/01/2026"])
            .expect_err("bad date");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
