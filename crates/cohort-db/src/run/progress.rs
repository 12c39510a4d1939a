//! Moving a run through its components.
//!
//! The reload policy is decided on persisted state only: a visit whose state
//! is past `started` has handed out its data, and a closed visit of the same
//! component means the worker has been there before.

use cohort_core::entities::{Component, ComponentResult, StudyResult};
use cohort_core::enums::{ComponentResultState, EntityType, StudyResultState, WorkerKind};
use cohort_core::errors::CoreError;
use cohort_core::responses::{ComponentData, ComponentRef, Navigation, NextStep, SubmitOutcome, Upcoming};
use cohort_core::sequencer::{ComponentSequencer, Step};

use crate::error::DatabaseError;
use crate::lock::LockScope;
use crate::repos::component::{find_component, list_for_study};
use crate::repos::component_result::{
    close, find_component_result, insert_visit, mark_retrieved, open_visit, post_data, visits,
};
use crate::repos::study_result::advance_state;
use crate::repos::worker::find_worker;
use crate::run::{Ending, end_run, load_open_run};
use crate::service::CohortService;

impl CohortService {
    /// Hand out the data of the component the run is at.
    ///
    /// # Errors
    ///
    /// - `CoreError::ReloadRejected` if the component is not reloadable and
    ///   its data was already handed out during this run.
    /// - `CoreError::NotBelongingToRun` if the run is at another component.
    /// - `CoreError::AlreadyFinished` if the run ended.
    pub async fn get_component_data(
        &self,
        run_id: &str,
        component_id: &str,
    ) -> Result<ComponentData, DatabaseError> {
        let tx = self.db().begin_locked(LockScope::StudyResult(run_id)).await?;
        let result = component_data_in(&tx, run_id, component_id).await;
        tx.finish(result).await
    }

    /// Store the worker's result for the component the run is at.
    ///
    /// Posting again before moving on replaces the earlier payload.
    ///
    /// # Errors
    ///
    /// - `CoreError::AlreadyFinished` if the run ended or the component's
    ///   visit was already closed.
    /// - `CoreError::NotBelongingToRun` if the run is at another component.
    pub async fn submit_result(
        &self,
        run_id: &str,
        component_id: &str,
        payload: &str,
    ) -> Result<SubmitOutcome, DatabaseError> {
        let tx = self.db().begin_locked(LockScope::StudyResult(run_id)).await?;
        let result = submit_in(&tx, run_id, component_id, payload).await;
        tx.finish(result).await
    }

    /// Close the current component and move on, finishing the run after the
    /// last active component.
    ///
    /// # Errors
    ///
    /// - `CoreError::AlreadyFinished` if the run ended or the component's
    ///   visit was already closed.
    /// - `CoreError::NotBelongingToRun` if the run is at another component.
    pub async fn next_step(&self, run_id: &str, component_id: &str) -> Result<NextStep, DatabaseError> {
        let tx = self.db().begin_locked(LockScope::StudyResult(run_id)).await?;
        let result = next_step_in(&tx, run_id, component_id).await;
        tx.finish(result).await
    }

    /// Jump to another component. Preview workers only.
    ///
    /// # Errors
    ///
    /// - `CoreError::Forbidden` for any other kind of worker.
    /// - `CoreError::Validation` if there is no active component at the target.
    pub async fn navigate(&self, run_id: &str, target: Navigation) -> Result<ComponentRef, DatabaseError> {
        let tx = self.db().begin_locked(LockScope::StudyResult(run_id)).await?;
        let result = navigate_in(&tx, run_id, target).await;
        tx.finish(result).await
    }
}

async fn component_data_in(
    conn: &libsql::Connection,
    run_id: &str,
    component_id: &str,
) -> Result<ComponentData, DatabaseError> {
    let run = load_open_run(conn, run_id).await?;
    let component = component_of_run(conn, &run, component_id).await?;

    match open_visit(conn, run_id).await? {
        Some(visit) if visit.component_id == component_id => {
            if visit.state.data_was_retrieved() {
                if !component.reloadable {
                    return Err(reload_rejected(run_id, component_id));
                }
            } else {
                // A fresh visit after navigating back still counts earlier ones.
                if !component.reloadable && seen_before(conn, run_id, component_id).await? {
                    return Err(reload_rejected(run_id, component_id));
                }
                mark_retrieved(conn, &visit.id).await?;
                if run.state == StudyResultState::Started {
                    advance_state(conn, run_id, StudyResultState::Started, StudyResultState::DataRetrieved)
                        .await?;
                }
            }
            Ok(ComponentData {
                component_id: component.id,
                component_result_id: visit.id,
                title: component.title,
                payload: component.payload,
            })
        }
        _ => {
            if !component.reloadable && seen_before(conn, run_id, component_id).await? {
                return Err(reload_rejected(run_id, component_id));
            }
            Err(not_belonging(run_id, component_id))
        }
    }
}

/// Whether any visit of this run, open or closed, handed out the component's data.
async fn seen_before(
    conn: &libsql::Connection,
    run_id: &str,
    component_id: &str,
) -> Result<bool, DatabaseError> {
    Ok(visits(conn, run_id)
        .await?
        .iter()
        .any(|v| v.component_id == component_id && v.state.data_was_retrieved()))
}

async fn submit_in(
    conn: &libsql::Connection,
    run_id: &str,
    component_id: &str,
    payload: &str,
) -> Result<SubmitOutcome, DatabaseError> {
    let run = load_open_run(conn, run_id).await?;
    let visit = current_visit(conn, &run, component_id).await?;

    if !post_data(conn, &visit.id, payload).await? {
        return Err(CoreError::already_finished(EntityType::ComponentResult, &visit.id).into());
    }

    let components = list_for_study(conn, &run.study_id).await?;
    let upcoming = match ComponentSequencer::new(&components).next(component_id) {
        Step::Component(next) => Upcoming::Component {
            component_id: next.id.clone(),
            title: next.title.clone(),
        },
        Step::EndOfStudy | Step::StartOfStudy | Step::NotFound => Upcoming::EndOfStudy,
    };

    Ok(SubmitOutcome {
        component_result: find_component_result(conn, &visit.id).await?,
        upcoming,
    })
}

async fn next_step_in(
    conn: &libsql::Connection,
    run_id: &str,
    component_id: &str,
) -> Result<NextStep, DatabaseError> {
    let run = load_open_run(conn, run_id).await?;
    let visit = current_visit(conn, &run, component_id).await?;

    let components = list_for_study(conn, &run.study_id).await?;
    match ComponentSequencer::new(&components).next(component_id) {
        Step::Component(next) => {
            let opened = move_to(conn, &run, &visit, next).await?;
            Ok(NextStep::Component(opened))
        }
        Step::EndOfStudy => {
            let ended = end_run(conn, &run, Ending::Finished).await?;
            let confirmation_code = ended.confirmation_code.ok_or_else(|| {
                DatabaseError::InvalidState(format!("finished run {run_id} has no confirmation code"))
            })?;
            Ok(NextStep::Finished { confirmation_code })
        }
        Step::StartOfStudy | Step::NotFound => Err(not_belonging(run_id, component_id)),
    }
}

async fn navigate_in(
    conn: &libsql::Connection,
    run_id: &str,
    target: Navigation,
) -> Result<ComponentRef, DatabaseError> {
    let run = load_open_run(conn, run_id).await?;
    let worker = find_worker(conn, &run.worker_id).await?;
    if worker.kind != WorkerKind::Preview {
        return Err(CoreError::Forbidden(format!(
            "manual navigation is limited to preview workers, not {}",
            worker.kind
        ))
        .into());
    }

    let visit = open_visit(conn, run_id)
        .await?
        .ok_or_else(|| DatabaseError::InvalidState(format!("run {run_id} has no open component")))?;
    let components = list_for_study(conn, &run.study_id).await?;
    let sequencer = ComponentSequencer::new(&components);

    let destination = match target {
        Navigation::Previous => match sequencer.previous(&visit.component_id) {
            Step::Component(c) => c,
            Step::StartOfStudy => {
                return Err(CoreError::Validation("already at the first component".into()).into());
            }
            Step::EndOfStudy | Step::NotFound => {
                return Err(not_belonging(run_id, &visit.component_id));
            }
        },
        Navigation::Index(index) => sequencer.by_index(index).ok_or_else(|| {
            CoreError::Validation(format!(
                "no active component at index {index} (study has {})",
                sequencer.active_count()
            ))
        })?,
    };

    move_to(conn, &run, &visit, destination).await
}

/// Close `visit` as finished and open a visit to `next`.
async fn move_to(
    conn: &libsql::Connection,
    run: &StudyResult,
    visit: &ComponentResult,
    next: &Component,
) -> Result<ComponentRef, DatabaseError> {
    if !close(conn, &visit.id, ComponentResultState::Finished).await? {
        return Err(CoreError::already_finished(EntityType::ComponentResult, &visit.id).into());
    }
    let opened = insert_visit(conn, &run.id, &next.id).await?;
    tracing::debug!(
        study_result_id = %run.id,
        from = %visit.component_id,
        to = %next.id,
        "moved to component"
    );
    Ok(ComponentRef::new(next, opened.id))
}

/// The component, provided it belongs to the run's study.
async fn component_of_run(
    conn: &libsql::Connection,
    run: &StudyResult,
    component_id: &str,
) -> Result<Component, DatabaseError> {
    let component = find_component(conn, component_id).await?;
    if component.study_id != run.study_id {
        return Err(not_belonging(&run.id, component_id));
    }
    Ok(component)
}

/// The open visit, provided it is a visit to `component_id`.
async fn current_visit(
    conn: &libsql::Connection,
    run: &StudyResult,
    component_id: &str,
) -> Result<ComponentResult, DatabaseError> {
    component_of_run(conn, run, component_id).await?;
    match open_visit(conn, &run.id).await? {
        Some(visit) if visit.component_id == component_id => Ok(visit),
        _ => {
            let closed = visits(conn, &run.id)
                .await?
                .into_iter()
                .rev()
                .find(|v| v.component_id == component_id);
            match closed {
                Some(visit) => {
                    Err(CoreError::already_finished(EntityType::ComponentResult, visit.id).into())
                }
                None => Err(not_belonging(&run.id, component_id)),
            }
        }
    }
}

fn reload_rejected(run_id: &str, component_id: &str) -> DatabaseError {
    tracing::info!(study_result_id = run_id, component_id, "reload rejected");
    CoreError::ReloadRejected {
        component_id: component_id.to_string(),
    }
    .into()
}

fn not_belonging(run_id: &str, component_id: &str) -> DatabaseError {
    CoreError::NotBelongingToRun {
        component_id: component_id.to_string(),
        study_result_id: run_id.to_string(),
    }
    .into()
}
