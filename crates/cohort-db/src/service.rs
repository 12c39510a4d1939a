//! Service layer over the result store.
//!
//! `CohortService` wraps `CohortDb`. Every repository, the group allocator, and
//! the run state machine are implemented as `impl CohortService` blocks in
//! their own modules. The service holds no mutable state of its own: all
//! coordination between concurrent requests goes through the store's locks,
//! so one service can be shared (e.g. behind an `Arc`) by any number of tasks.

use cohort_config::CohortConfig;

use crate::CohortDb;
use crate::error::DatabaseError;

pub struct CohortService {
    db: CohortDb,
}

impl CohortService {
    /// Create a new service over a local database with default settings.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the libSQL database file, or `":memory:"` for tests.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new_local(db_path: &str) -> Result<Self, DatabaseError> {
        Ok(Self {
            db: CohortDb::open_local(db_path).await?,
        })
    }

    /// Create a service from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn from_config(config: &CohortConfig) -> Result<Self, DatabaseError> {
        Ok(Self {
            db: CohortDb::open(&config.database).await?,
        })
    }

    /// Create from an existing `CohortDb` (for testing).
    #[must_use]
    pub const fn from_db(db: CohortDb) -> Self {
        Self { db }
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &CohortDb {
        &self.db
    }
}
