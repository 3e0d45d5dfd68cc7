use std::sync::Arc;

use chrono::NaiveDate;
use tally_config::{Config, ConfigManager};
use tally_domain::Actor;
use tally_engine::{Clock, EngineSettings, RecurrenceEngine, SystemClock};
use tracing::debug;

use super::{store::AnyStore, GlobalArgs};
use crate::errors::TallyError;

/// Everything a store-backed command needs.
pub struct Session {
    pub config: Config,
    pub store: AnyStore,
    pub actor: Actor,
    pub clock: Arc<dyn Clock>,
}

impl Session {
    /// Loads the config, installs tracing and opens the configured store.
    pub fn open(global: &GlobalArgs) -> Result<Self, TallyError> {
        let (_, mut config) = load_config(global)?;
        crate::init_with_filter(config.log_filter.as_deref());
        if let Some(backend) = global.backend {
            config.backend = backend;
        }
        if let Some(dir) = &global.data_dir {
            config.data_root = Some(dir.clone());
        }
        let root = config.resolve_data_root();
        debug!(backend = %config.backend, root = %root.display(), "opening charge store");
        let store = AnyStore::open(config.backend, &root)?;
        let actor = Actor::new(config.operator(), config.operator_role);
        Ok(Self {
            config,
            store,
            actor,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn engine(&self) -> RecurrenceEngine {
        RecurrenceEngine::new(engine_settings(&self.config), Arc::clone(&self.clock))
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}

/// Engine values taken from the operator config.
pub fn engine_settings(config: &Config) -> EngineSettings {
    EngineSettings {
        currency: config.currency.trim().to_ascii_uppercase(),
        invoice_prefix: config.invoice_prefix.trim().to_string(),
        lookahead_days: config.lookahead_days,
        max_cycles_per_definition: config.max_cycles_per_definition,
    }
}

pub(super) fn load_config(global: &GlobalArgs) -> Result<(ConfigManager, Config), TallyError> {
    let manager = match &global.config {
        Some(path) => ConfigManager::for_file(path.clone()),
        None => ConfigManager::default_location(),
    };
    let config = manager.load()?;
    Ok((manager, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_normalize_currency_and_prefix() {
        let config = Config {
            currency: " eur ".into(),
            invoice_prefix: " RC ".into(),
            lookahead_days: 3,
            ..Config::default()
        };

        let settings = engine_settings(&config);

        assert_eq!(settings.currency, "EUR");
        assert_eq!(settings.invoice_prefix, "RC");
        assert_eq!(settings.lookahead_days, 3);
        assert_eq!(settings.max_cycles_per_definition, 10_000);
    }
}
