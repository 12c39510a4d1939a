//! Starting a run.

use cohort_core::entities::{Batch, Component, Study, Worker};
use cohort_core::enums::{EntityType, RunPolicy};
use cohort_core::errors::CoreError;
use cohort_core::responses::{ComponentRef, RunHandle};
use cohort_core::sequencer::ComponentSequencer;

use crate::allocator::{OnFull, allocate_in, contention_to_allocation_failure};
use crate::error::DatabaseError;
use crate::lock::LockScope;
use crate::repos::component::list_for_study;
use crate::repos::component_result::insert_visit;
use crate::repos::study_result::{insert_study_result, runs_of_worker};
use crate::retry::{ALLOCATION_ATTEMPTS, retry_on_contention};
use crate::run::{Ending, end_run};
use crate::service::CohortService;

/// Message recorded on a preview run replaced by a newer one.
pub const SUPERSEDED_MESSAGE: &str = "superseded by a new preview run";

impl CohortService {
    /// Start a run of `study_id` under `batch_id` for the worker holding `worker_token`.
    ///
    /// For a group study the run is bound to a group in the same transaction
    /// that creates it; a rolled-back start leaves neither a run nor a
    /// counter increment behind.
    ///
    /// # Errors
    ///
    /// - `CoreError::NotFound` for an unknown token, study or batch, or a
    ///   batch of another study.
    /// - `CoreError::Forbidden` if the batch does not admit the worker, or a
    ///   single-run worker already ran this batch.
    /// - `CoreError::AlreadyRunning` if a personal worker's earlier run has not ended.
    /// - `CoreError::NoComponents` if the study has no active component.
    /// - `CoreError::AllocationFailed` if no group could be bound.
    pub async fn start_run(
        &self,
        study_id: &str,
        batch_id: &str,
        worker_token: &str,
    ) -> Result<RunHandle, DatabaseError> {
        let worker = self.resolve_worker(worker_token).await?;
        let study = self.get_study(study_id).await?;
        let batch = self.get_batch(batch_id).await?;
        if batch.study_id != study.id {
            return Err(CoreError::not_found(EntityType::Batch, batch_id).into());
        }
        if !batch.admits(worker.kind) {
            return Err(CoreError::Forbidden(format!(
                "batch {batch_id} does not admit {} workers{}",
                worker.kind,
                if batch.active { "" } else { " (batch is inactive)" }
            ))
            .into());
        }

        let components = list_for_study(&*self.db().shared().await?, study_id).await?;
        let first = ComponentSequencer::new(&components)
            .first()
            .ok_or_else(|| CoreError::NoComponents {
                study_id: study_id.to_string(),
            })?;

        let attempts = if study.group_study { ALLOCATION_ATTEMPTS } else { 1 };
        let handle = retry_on_contention(attempts, "start_run", || {
            self.start_run_once(&study, &batch, &worker, first)
        })
        .await
        .map_err(|e| {
            if study.group_study {
                contention_to_allocation_failure(batch_id, e)
            } else {
                e
            }
        })?;

        tracing::info!(
            study_result_id = %handle.study_result_id,
            worker_id = %worker.id,
            kind = %worker.kind,
            group_id = ?handle.group_id,
            "run started"
        );
        Ok(handle)
    }

    async fn start_run_once(
        &self,
        study: &Study,
        batch: &Batch,
        worker: &Worker,
        first: &Component,
    ) -> Result<RunHandle, DatabaseError> {
        let tx = self.db().begin_locked(LockScope::BatchGroups(&batch.id)).await?;
        let result = open_run(&tx, study, batch, worker, first).await;
        tx.finish(result).await
    }
}

async fn open_run(
    conn: &libsql::Connection,
    study: &Study,
    batch: &Batch,
    worker: &Worker,
    first: &Component,
) -> Result<RunHandle, DatabaseError> {
    apply_run_policy(conn, worker, batch).await?;

    let group = if study.group_study {
        Some(allocate_in(conn, batch, None, OnFull::CreateGroup).await?.group)
    } else {
        None
    };
    let group_id = group.as_ref().map(|g| g.id.as_str());

    let run = insert_study_result(conn, &study.id, &batch.id, &worker.id, group_id).await?;
    let visit = insert_visit(conn, &run.id, &first.id).await?;

    Ok(RunHandle {
        study_result_id: run.id,
        study_id: run.study_id,
        batch_id: run.batch_id,
        worker_id: run.worker_id,
        group_id: run.group_id,
        first_component: ComponentRef::new(first, visit.id),
    })
}

/// Check the worker's earlier runs in this batch against its kind's policy.
async fn apply_run_policy(
    conn: &libsql::Connection,
    worker: &Worker,
    batch: &Batch,
) -> Result<(), DatabaseError> {
    let previous = runs_of_worker(conn, &worker.id, &batch.id).await?;

    match worker.kind.run_policy() {
        RunPolicy::SingleRun => {
            if !previous.is_empty() {
                return Err(CoreError::Forbidden(format!(
                    "{} worker {} may run batch {} only once",
                    worker.kind, worker.id, batch.id
                ))
                .into());
            }
        }
        RunPolicy::Sequential => {
            if previous.iter().any(|run| !run.state.is_terminal()) {
                return Err(CoreError::AlreadyRunning {
                    worker_id: worker.id.clone(),
                    batch_id: batch.id.clone(),
                }
                .into());
            }
        }
        RunPolicy::Restartable => {
            for run in previous.iter().filter(|run| !run.state.is_terminal()) {
                end_run(conn, run, Ending::Abandoned(Some(SUPERSEDED_MESSAGE))).await?;
                tracing::debug!(study_result_id = %run.id, "preview run superseded");
            }
        }
    }
    Ok(())
}
