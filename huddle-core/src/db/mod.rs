//! SQLite-backed storage.
//!
//! `Database` is a cheap cloneable handle over a single connection. Domain
//! services run their mutations through [`Database::with_transaction`] so a
//! state change, its activity entry, and its notifications commit or roll
//! back as one unit.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context as _;
use rusqlite::Connection;

use crate::error::{DomainError, DomainResult};

mod schema;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at the default platform location.
    /// `HUDDLE_DB` overrides the path.
    pub fn open_default() -> anyhow::Result<Self> {
        if let Ok(path) = std::env::var("HUDDLE_DB") {
            return Self::open(path);
        }
        let dirs = directories::ProjectDirs::from("com", "huddle", "huddle")
            .context("could not determine data directory")?;
        let data_dir = dirs.data_local_dir();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("creating {}", data_dir.display()))?;
        Self::open(data_dir.join("huddle.db"))
    }

    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("opening database at {}", path.as_ref().display()))?;
        Self::init(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Apply the schema. Idempotent.
    pub fn migrate(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> DomainResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DomainError::Unavailable("database lock poisoned".into()))
    }

    /// Run a read-only closure against the connection.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> DomainResult<T>,
    ) -> DomainResult<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run a closure inside a transaction. Commits on `Ok`, rolls back on
    /// `Err` so callers never observe a partial mutation.
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce(&Connection) -> DomainResult<T>,
    ) -> DomainResult<T> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(DomainError::from)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(DomainError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!(error = %rollback_err, "transaction rollback failed");
                }
                Err(e)
            }
        }
    }
}
