pub mod cleanup;
pub mod config;
pub mod edits;
pub mod error;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod queries;
pub mod unread;

pub use config::DbConfig;
pub use error::{Error, Result};

use parley_types::ReceiverDeletion;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::Mutex;
use tracing::info;

pub struct Database {
    conn: Mutex<Connection>,
    receiver_deletion: ReceiverDeletion,
}

impl Database {
    pub fn open(config: &DbConfig) -> Result<Self> {
        let conn = Connection::open(&config.path)?;

        // WAL mode for concurrent readers from other processes
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn, config.receiver_deletion)?;
        info!("Database opened at {}", config.path.display());
        Ok(db)
    }

    /// Private, throwaway database. Used by tests and dry runs.
    pub fn open_in_memory(receiver_deletion: ReceiverDeletion) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, receiver_deletion)
    }

    fn init(mut conn: Connection, receiver_deletion: ReceiverDeletion) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            receiver_deletion,
        })
    }

    /// Schema version recorded in the store.
    pub fn schema_version(&self) -> Result<usize> {
        self.with_conn(migrations::current_version)
    }

    pub fn receiver_deletion(&self) -> ReceiverDeletion {
        self.receiver_deletion
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        f(&conn)
    }

    /// Run `f` inside an immediate transaction. Commits when `f` returns
    /// `Ok`; any error rolls the whole unit back.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}
