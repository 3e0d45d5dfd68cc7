//! tally-storage-sqlite
//!
//! Relational [`ChargeStore`] on SQLite. Every transaction takes the write lock
//! up front so concurrent generators serialize on the database instead of
//! racing on the per-cycle uniqueness index.

use std::{path::Path, time::Duration};

use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use tally_engine::{ChargeStore, ChargeTx, CoreError};
use tracing::debug;

mod rows;
mod tx;

use tx::SqliteTx;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) trait SqlResultExt<T> {
    fn sql(self) -> Result<T, CoreError>;
}

impl<T> SqlResultExt<T> for rusqlite::Result<T> {
    fn sql(self) -> Result<T, CoreError> {
        self.map_err(|err| match err.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => CoreError::Conflict(err.to_string()),
            _ => CoreError::Storage(err.to_string()),
        })
    }
}

pub struct SqliteChargeStore {
    conn: Connection,
}

impl SqliteChargeStore {
    /// Opens (or creates) the database file and applies the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).sql()?;
        // In-memory and some network filesystems refuse WAL.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.busy_timeout(BUSY_TIMEOUT).sql()?;
        debug!(path = %path.display(), "opened sqlite charge store");
        Self::prepare(conn)
    }

    pub fn in_memory() -> Result<Self, CoreError> {
        Self::prepare(Connection::open_in_memory().sql()?)
    }

    fn prepare(conn: Connection) -> Result<Self, CoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;").sql()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<(), CoreError> {
        self.conn
            .execute_batch(include_str!("../migrations/001_init.sql"))
            .sql()
    }

    /// Raw connection, for maintenance and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl ChargeStore for SqliteChargeStore {
    fn transaction<T, F>(&mut self, work: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut dyn ChargeTx) -> Result<T, CoreError>,
    {
        let txn = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .sql()?;
        let value = {
            let mut tx = SqliteTx { conn: &txn };
            work(&mut tx)?
        };
        txn.commit().sql()?;
        Ok(value)
    }

    fn read<T, F>(&mut self, work: F) -> Result<T, CoreError>
    where
        F: FnOnce(&dyn ChargeTx) -> Result<T, CoreError>,
    {
        let txn = self.conn.transaction().sql()?;
        let value = work(&SqliteTx { conn: &txn })?;
        txn.finish().sql()?;
        Ok(value)
    }
}
