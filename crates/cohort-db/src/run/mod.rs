//! Run state machine.
//!
//! Owns the lifecycle of a study result and its component visits. Every
//! mutating operation runs in a locked transaction and re-reads the run under
//! the lock before deciding anything, so two requests for the same run never
//! act on the same stale state.
//!
//! ```text
//! start_run ─▶ get_component_data ─▶ submit_result ─▶ next_step ─┬─▶ (next component)
//!                                                                └─▶ finished + confirmation code
//! abandon / fail ─▶ aborted / fail   (from any non-terminal state)
//! ```

pub mod membership;
pub mod progress;
pub mod session;
pub mod start;
pub mod terminate;

use chrono::Utc;

use cohort_core::entities::StudyResult;
use cohort_core::enums::{ComponentResultState, EntityType, StudyResultState};
use cohort_core::errors::CoreError;
use cohort_core::responses::RunView;

use crate::error::DatabaseError;
use crate::helpers::random_hex;
use crate::repos::component_result::{close, open_visit, visits};
use crate::repos::group::release_member;
use crate::repos::study_result::{find_study_result, list_for_batch, terminate};
use crate::service::CohortService;

/// Bytes of randomness in a confirmation code (32 hex chars).
const CONFIRMATION_CODE_BYTES: usize = 16;

/// How a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ending<'a> {
    Finished,
    Failed(&'a str),
    Abandoned(Option<&'a str>),
}

impl<'a> Ending<'a> {
    const fn run_state(self) -> StudyResultState {
        match self {
            Self::Finished => StudyResultState::Finished,
            Self::Failed(_) => StudyResultState::Fail,
            Self::Abandoned(_) => StudyResultState::Aborted,
        }
    }

    const fn visit_state(self) -> ComponentResultState {
        match self {
            Self::Finished => ComponentResultState::Finished,
            Self::Failed(_) => ComponentResultState::Fail,
            Self::Abandoned(_) => ComponentResultState::Aborted,
        }
    }

    const fn text(self) -> Option<&'a str> {
        match self {
            Self::Finished => None,
            Self::Failed(reason) => Some(reason),
            Self::Abandoned(message) => message,
        }
    }
}

/// Load a run and reject it if it already ended.
pub(crate) async fn load_open_run(
    conn: &libsql::Connection,
    run_id: &str,
) -> Result<StudyResult, DatabaseError> {
    let run = find_study_result(conn, run_id).await?;
    if run.state.is_terminal() {
        return Err(CoreError::already_finished(EntityType::StudyResult, run_id).into());
    }
    Ok(run)
}

/// Move a run to a terminal state.
///
/// Closes the open visit with the matching state, stamps `ended_at`, issues
/// a confirmation code on success, and releases the run's group, all on the
/// caller's locked connection.
pub(crate) async fn end_run(
    conn: &libsql::Connection,
    run: &StudyResult,
    ending: Ending<'_>,
) -> Result<StudyResult, DatabaseError> {
    let confirmation_code = match ending {
        Ending::Finished => Some(random_hex(CONFIRMATION_CODE_BYTES)?),
        Ending::Failed(_) | Ending::Abandoned(_) => None,
    };

    if let Some(visit) = open_visit(conn, &run.id).await? {
        close(conn, &visit.id, ending.visit_state()).await?;
    }

    let state = ending.run_state();
    if !terminate(conn, &run.id, state, confirmation_code.as_deref(), ending.text(), Utc::now()).await? {
        return Err(CoreError::already_finished(EntityType::StudyResult, &run.id).into());
    }

    if let Some(group_id) = &run.group_id {
        let group = release_member(conn, group_id).await?;
        tracing::debug!(
            group_id = %group.id,
            active = group.active_member_count,
            history = group.history_member_count,
            "group member released"
        );
    }

    tracing::info!(study_result_id = %run.id, %state, "run ended");
    find_study_result(conn, &run.id).await
}

impl CohortService {
    /// A run with all of its component visits.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown run.
    pub async fn get_run(&self, run_id: &str) -> Result<RunView, DatabaseError> {
        let conn = self.db().shared().await?;
        let study_result = find_study_result(&conn, run_id).await?;
        let component_results = visits(&conn, run_id).await?;
        Ok(RunView {
            study_result,
            component_results,
        })
    }

    /// Runs of a batch in start order.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown batch.
    pub async fn list_study_results(
        &self,
        batch_id: &str,
        limit: u32,
    ) -> Result<Vec<StudyResult>, DatabaseError> {
        self.get_batch(batch_id).await?;
        list_for_batch(&*self.db().shared().await?, batch_id, limit).await
    }
}
