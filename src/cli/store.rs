use std::path::Path;

use tally_config::Backend;
use tally_engine::{ChargeStore, ChargeTx, CoreError};
use tally_storage_json::JsonChargeStore;
use tally_storage_sqlite::SqliteChargeStore;

const SQLITE_FILE: &str = "charges.db";
const JSON_FILE: &str = "charges.json";
const JSON_BACKUPS_DIR: &str = "backups";

/// The store selected by configuration.
pub enum AnyStore {
    Sqlite(SqliteChargeStore),
    Json(JsonChargeStore),
}

impl AnyStore {
    pub fn open(backend: Backend, root: &Path) -> Result<Self, CoreError> {
        match backend {
            Backend::Sqlite => SqliteChargeStore::open(root.join(SQLITE_FILE)).map(AnyStore::Sqlite),
            Backend::Json => JsonChargeStore::open(root.join(JSON_FILE), root.join(JSON_BACKUPS_DIR))
                .map(AnyStore::Json),
        }
    }
}

impl ChargeStore for AnyStore {
    fn transaction<T, F>(&mut self, work: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut dyn ChargeTx) -> Result<T, CoreError>,
    {
        match self {
            AnyStore::Sqlite(store) => store.transaction(work),
            AnyStore::Json(store) => store.transaction(work),
        }
    }

    fn read<T, F>(&mut self, work: F) -> Result<T, CoreError>
    where
        F: FnOnce(&dyn ChargeTx) -> Result<T, CoreError>,
    {
        match self {
            AnyStore::Sqlite(store) => store.read(work),
            AnyStore::Json(store) => store.read(work),
        }
    }
}
