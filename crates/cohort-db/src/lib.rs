//! # cohort-db
//!
//! libSQL result store and run core for Cohort.
//!
//! Holds all relational state (studies, components, batches, workers, group
//! results, study results, component results) and implements the operations
//! that mutate it under locked transactions: the group allocator and the
//! per-worker run state machine.
//!
//! Uses the `libsql` crate (C `SQLite` fork) in local mode. A file-backed store
//! opens one connection per locked transaction so concurrent requests
//! coordinate through the database's own write lock.

pub mod allocator;
pub mod error;
pub mod helpers;
pub mod lock;
mod migrations;
pub mod repos;
pub mod retry;
pub mod run;
pub mod service;
pub mod updates;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cohort_config::DatabaseConfig;
use error::DatabaseError;
use libsql::Builder;
use lock::{LockScope, LockedTransaction, SharedConnection};

/// Lock wait used when no configuration is supplied.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

enum StoreMode {
    /// Each locked transaction gets its own connection.
    File,
    /// One connection; locked transactions take turns on it.
    Memory {
        serial: Arc<tokio::sync::Mutex<()>>,
        dirty: Arc<AtomicBool>,
    },
}

/// Central database handle for all Cohort state operations.
pub struct CohortDb {
    db: libsql::Database,
    conn: libsql::Connection,
    busy_timeout: Duration,
    mode: StoreMode,
}

impl CohortDb {
    /// Open a local database at the given path with the default lock wait.
    ///
    /// Runs migrations automatically on first open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        Self::open_local_with(path, DEFAULT_BUSY_TIMEOUT).await
    }

    /// Open the database described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        Self::open_local_with(&config.path, config.busy_timeout()).await
    }

    /// Open a local database with an explicit lock wait.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local_with(path: &str, busy_timeout: Duration) -> Result<Self, DatabaseError> {
        let in_memory = path == ":memory:";
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        prepare_connection(&conn, busy_timeout).await?;

        if !in_memory {
            // WAL lets readers proceed while a locked transaction is open.
            let mut rows = conn
                .query("PRAGMA journal_mode = WAL", ())
                .await
                .map_err(|e| DatabaseError::Migration(format!("PRAGMA journal_mode: {e}")))?;
            while rows.next().await?.is_some() {}
        }

        let mode = if in_memory {
            StoreMode::Memory {
                serial: Arc::new(tokio::sync::Mutex::new(())),
                dirty: Arc::new(AtomicBool::new(false)),
            }
        } else {
            StoreMode::File
        };

        let cohort_db = Self {
            db,
            conn,
            busy_timeout,
            mode,
        };
        cohort_db.run_migrations().await?;
        tracing::debug!(path, in_memory, "result store opened");
        Ok(cohort_db)
    }

    /// The raw shared connection, with no coordination against locked
    /// transactions. Service code goes through [`Self::shared`].
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Borrow the shared connection for reads and single-statement writes.
    ///
    /// On an in-memory store this waits until no locked transaction is open
    /// and first rolls back one that was dropped unfinished.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if rolling back an abandoned transaction fails.
    pub async fn shared(&self) -> Result<SharedConnection<'_>, DatabaseError> {
        match &self.mode {
            StoreMode::File => Ok(SharedConnection::new(&self.conn, None)),
            StoreMode::Memory { serial, dirty } => {
                let guard = serial.lock().await;
                self.settle(dirty).await?;
                Ok(SharedConnection::new(&self.conn, Some(guard)))
            }
        }
    }

    /// Roll back a transaction whose guard was dropped. Caller holds `serial`.
    async fn settle(&self, dirty: &AtomicBool) -> Result<(), DatabaseError> {
        if dirty.swap(false, Ordering::AcqRel) {
            self.conn.execute("ROLLBACK", ()).await?;
            tracing::debug!("rolled back abandoned in-memory transaction");
        }
        Ok(())
    }

    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    /// Open a transaction that already holds the store's write lock.
    ///
    /// Waits up to the busy timeout for the lock; a timeout surfaces as a
    /// lock-contention error (see [`retry::is_lock_contention`]).
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a connection cannot be opened or the lock
    /// cannot be taken.
    pub async fn begin_locked(
        &self,
        scope: LockScope<'_>,
    ) -> Result<LockedTransaction, DatabaseError> {
        match &self.mode {
            StoreMode::File => {
                let conn = self.db.connect()?;
                prepare_connection(&conn, self.busy_timeout).await?;
                LockedTransaction::begin(conn, scope, None, None).await
            }
            StoreMode::Memory { serial, dirty } => {
                let guard = Arc::clone(serial).lock_owned().await;
                self.settle(dirty).await?;
                LockedTransaction::begin(
                    self.conn.clone(),
                    scope,
                    Some(Arc::clone(dirty)),
                    Some(guard),
                )
                .await
            }
        }
    }

    /// Generate a prefixed ID via libSQL. Returns e.g., `"srs-a3f8b2c1"`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or returns no rows.
    pub async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        let conn = self.shared().await?;
        generate_id(&conn, prefix).await
    }
}

/// Generate a prefixed ID on a specific connection (e.g. inside a transaction).
///
/// Uses `randomblob(4)` in SQL to produce 8-char hex, then prepends the prefix.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails or returns no rows.
pub async fn generate_id(conn: &libsql::Connection, prefix: &str) -> Result<String, DatabaseError> {
    let mut rows = conn
        .query("SELECT ?1 || '-' || lower(hex(randomblob(4)))", [prefix])
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    Ok(row.get::<String>(0)?)
}

async fn prepare_connection(
    conn: &libsql::Connection,
    busy_timeout: Duration,
) -> Result<(), DatabaseError> {
    conn.busy_timeout(busy_timeout)?;
    // Enable foreign keys (must be per-connection in SQLite)
    conn.execute("PRAGMA foreign_keys = ON", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;
    Ok(())
}
