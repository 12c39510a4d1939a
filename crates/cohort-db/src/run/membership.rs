//! Changing the group a running worker belongs to.

use cohort_core::entities::{GroupResult, StudyResult};
use cohort_core::errors::CoreError;

use crate::allocator::{OnFull, allocate_in};
use crate::error::DatabaseError;
use crate::lock::LockScope;
use crate::repos::batch::find_batch;
use crate::repos::group::release_member;
use crate::repos::study_result::{find_study_result, set_group};
use crate::run::load_open_run;
use crate::service::CohortService;

impl CohortService {
    /// Take a run out of its group. The run continues without one.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if the run has no group and
    /// `CoreError::AlreadyFinished` if it ended.
    pub async fn leave_group(&self, run_id: &str) -> Result<StudyResult, DatabaseError> {
        let tx = self.db().begin_locked(LockScope::StudyResult(run_id)).await?;
        let result = leave_in(&tx, run_id).await;
        tx.finish(result).await
    }

    /// Move a run from its group into a different group of the same batch.
    ///
    /// Uses the allocator's ranking with the current group excluded and never
    /// opens a new group.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AllocationFailed` if no other group has room; the
    /// run then stays in its current group.
    pub async fn reassign_group(&self, run_id: &str) -> Result<GroupResult, DatabaseError> {
        let run = find_study_result(&*self.db().shared().await?, run_id).await?;
        let tx = self.db().begin_locked(LockScope::BatchGroups(&run.batch_id)).await?;
        let result = reassign_in(&tx, run_id).await;
        tx.finish(result).await
    }
}

fn bound_group(run: &StudyResult) -> Result<&str, DatabaseError> {
    run.group_id
        .as_deref()
        .ok_or_else(|| CoreError::Validation(format!("run {} is not in a group", run.id)).into())
}

async fn leave_in(conn: &libsql::Connection, run_id: &str) -> Result<StudyResult, DatabaseError> {
    let run = load_open_run(conn, run_id).await?;
    let group_id = bound_group(&run)?;

    release_member(conn, group_id).await?;
    set_group(conn, run_id, None).await?;
    tracing::info!(study_result_id = run_id, group_id, "left group");
    find_study_result(conn, run_id).await
}

async fn reassign_in(conn: &libsql::Connection, run_id: &str) -> Result<GroupResult, DatabaseError> {
    let run = load_open_run(conn, run_id).await?;
    let current = bound_group(&run)?;
    let batch = find_batch(conn, &run.batch_id).await?;

    let allocation = allocate_in(conn, &batch, Some(current), OnFull::Fail).await?;
    release_member(conn, current).await?;
    set_group(conn, run_id, Some(&allocation.group.id)).await?;

    tracing::info!(
        study_result_id = run_id,
        from = current,
        to = %allocation.group.id,
        "reassigned group"
    );
    Ok(allocation.group)
}
