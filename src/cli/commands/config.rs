use clap::Subcommand;
use tally_config::{Config, ConfigManager};

use crate::{cli::output, errors::TallyError};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as JSON
    Show,
    /// Snapshot the current configuration
    Backup {
        #[arg(long)]
        note: Option<String>,
    },
    /// List configuration snapshots, newest first
    Backups,
}

pub fn run(
    manager: &ConfigManager,
    config: &Config,
    command: ConfigCommand,
) -> Result<(), TallyError> {
    match command {
        ConfigCommand::Show => {
            tracing::info!(
                path = %manager.config_path().display(),
                data_root = %config.resolve_data_root().display(),
                "effective configuration"
            );
            output::print_json(config)?;
        }
        ConfigCommand::Backup { note } => {
            let name = manager.backup(config, note.as_deref())?;
            println!("Configuration saved to {}", manager.backups_dir().join(name).display());
        }
        ConfigCommand::Backups => {
            let names = manager.list_backups()?;
            if names.is_empty() {
                println!("No configuration backups.");
            }
            for name in names {
                println!("{name}");
            }
        }
    }
    Ok(())
}
