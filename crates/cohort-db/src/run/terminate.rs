//! Ending a run early.

use cohort_core::entities::StudyResult;

use crate::error::DatabaseError;
use crate::lock::LockScope;
use crate::run::{Ending, end_run, load_open_run};
use crate::service::CohortService;

impl CohortService {
    /// Abort a run, e.g. because the worker gave up. Irreversible.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AlreadyFinished` if the run already ended.
    pub async fn abandon(&self, run_id: &str, message: Option<&str>) -> Result<StudyResult, DatabaseError> {
        self.end_early(run_id, Ending::Abandoned(message)).await
    }

    /// Mark a run as failed after an unrecoverable client error. Irreversible.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AlreadyFinished` if the run already ended.
    pub async fn fail(&self, run_id: &str, reason: &str) -> Result<StudyResult, DatabaseError> {
        self.end_early(run_id, Ending::Failed(reason)).await
    }

    async fn end_early(&self, run_id: &str, ending: Ending<'_>) -> Result<StudyResult, DatabaseError> {
        let tx = self.db().begin_locked(LockScope::StudyResult(run_id)).await?;
        let result = end_open_run(&tx, run_id, ending).await;
        tx.finish(result).await
    }
}

async fn end_open_run(
    conn: &libsql::Connection,
    run_id: &str,
    ending: Ending<'_>,
) -> Result<StudyResult, DatabaseError> {
    let run = load_open_run(conn, run_id).await?;
    end_run(conn, &run, ending).await
}
