//! Locked transactions.
//!
//! A [`LockedTransaction`] is the store's `withLockedTransaction` primitive in
//! guard form: it is opened with the write-intent lock already held
//! (`BEGIN IMMEDIATE`), so every row read through it is read under the lock,
//! and it ends with [`LockedTransaction::finish`], which commits an `Ok` body and
//! rolls back an `Err` one.
//!
//! Dropping the guard without finishing it (the caller's future was
//! cancelled) never commits. On a file-backed store the guard owns its
//! connection, and closing a connection with an open transaction rolls it back.
//! On an in-memory store the shared connection is marked dirty and rolled back
//! before anything else uses it.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{MutexGuard, OwnedMutexGuard};

use crate::error::DatabaseError;

/// The rows a locked transaction intends to read and mutate.
///
/// `SQLite` takes one write lock for the whole database; the scope documents
/// intent and shows up in logs.
#[derive(Debug, Clone, Copy)]
pub enum LockScope<'a> {
    /// A study's component list (position assignment).
    Study(&'a str),
    /// Every group result of a batch (allocation candidates).
    BatchGroups(&'a str),
    /// A single group result.
    Group(&'a str),
    /// A single study result and its open component result.
    StudyResult(&'a str),
}

impl fmt::Display for LockScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Study(id) => write!(f, "study:{id}"),
            Self::BatchGroups(id) => write!(f, "batch_groups:{id}"),
            Self::Group(id) => write!(f, "group:{id}"),
            Self::StudyResult(id) => write!(f, "study_result:{id}"),
        }
    }
}

/// The store's shared connection, held for one unlocked operation.
///
/// On an in-memory store this waits for any open locked transaction to end,
/// so a plain write never lands inside someone else's transaction.
pub struct SharedConnection<'a> {
    conn: &'a libsql::Connection,
    _serial: Option<MutexGuard<'a, ()>>,
}

impl<'a> SharedConnection<'a> {
    pub(crate) const fn new(conn: &'a libsql::Connection, serial: Option<MutexGuard<'a, ()>>) -> Self {
        Self {
            conn,
            _serial: serial,
        }
    }
}

impl Deref for SharedConnection<'_> {
    type Target = libsql::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
    }
}

/// An open transaction holding the store's write lock.
pub struct LockedTransaction {
    conn: libsql::Connection,
    scope: String,
    open: bool,
    dirty: Option<Arc<AtomicBool>>,
    _serial: Option<OwnedMutexGuard<()>>,
}

impl LockedTransaction {
    /// Issue `BEGIN IMMEDIATE` on `conn`.
    ///
    /// Blocks up to the connection's busy timeout waiting for the lock.
    pub(crate) async fn begin(
        conn: libsql::Connection,
        scope: LockScope<'_>,
        dirty: Option<Arc<AtomicBool>>,
        serial: Option<OwnedMutexGuard<()>>,
    ) -> Result<Self, DatabaseError> {
        conn.execute("BEGIN IMMEDIATE", ()).await?;
        tracing::trace!(%scope, "write lock acquired");
        Ok(Self {
            conn,
            scope: scope.to_string(),
            open: true,
            dirty,
            _serial: serial,
        })
    }

    /// Commit on `Ok`, roll back on `Err`, and pass the result through.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or the commit error if committing fails.
    pub async fn finish<T>(
        self,
        result: Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback after failed body also failed");
                }
                Err(err)
            }
        }
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if `COMMIT` fails; the transaction is then
    /// rolled back when the guard drops.
    pub async fn commit(mut self) -> Result<(), DatabaseError> {
        self.conn.execute("COMMIT", ()).await?;
        self.open = false;
        tracing::trace!(scope = %self.scope, "committed");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if `ROLLBACK` fails.
    pub async fn rollback(mut self) -> Result<(), DatabaseError> {
        self.conn.execute("ROLLBACK", ()).await?;
        self.open = false;
        tracing::trace!(scope = %self.scope, "rolled back");
        Ok(())
    }
}

impl Deref for LockedTransaction {
    type Target = libsql::Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl Drop for LockedTransaction {
    fn drop(&mut self) {
        if self.open {
            if let Some(dirty) = &self.dirty {
                dirty.store(true, Ordering::Release);
            }
            tracing::debug!(scope = %self.scope, "locked transaction dropped without commit");
        }
    }
}
