//! Liveness and per-run session data.
//!
//! Both are single-row conditional writes that skip terminal runs, so they
//! need no locked transaction.

use cohort_core::enums::EntityType;
use cohort_core::errors::CoreError;

use crate::error::DatabaseError;
use crate::repos::study_result::{find_study_result, set_session_data, touch};
use crate::service::CohortService;

impl CohortService {
    /// Record that the worker's client is still alive.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AlreadyFinished` if the run ended.
    pub async fn heartbeat(&self, run_id: &str) -> Result<(), DatabaseError> {
        if touch(&*self.db().shared().await?, run_id).await? {
            return Ok(());
        }
        Err(self.closed_run_error(run_id).await)
    }

    /// Replace the opaque session data of a run.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AlreadyFinished` if the run ended.
    pub async fn set_study_session_data(
        &self,
        run_id: &str,
        data: Option<&str>,
    ) -> Result<(), DatabaseError> {
        if set_session_data(&*self.db().shared().await?, run_id, data).await? {
            return Ok(());
        }
        Err(self.closed_run_error(run_id).await)
    }

    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown run.
    pub async fn study_session_data(&self, run_id: &str) -> Result<Option<String>, DatabaseError> {
        Ok(find_study_result(&*self.db().shared().await?, run_id).await?.session_data)
    }

    /// Explain why a conditional write on a run matched no row.
    async fn closed_run_error(&self, run_id: &str) -> DatabaseError {
        let conn = match self.db().shared().await {
            Ok(conn) => conn,
            Err(err) => return err,
        };
        match find_study_result(&conn, run_id).await {
            Ok(_) => CoreError::already_finished(EntityType::StudyResult, run_id).into(),
            Err(err) => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use cohort_core::enums::WorkerKind;
    use cohort_core::errors::CoreError;

    use crate::test_support::helpers::{seed_study, seed_worker, test_service};

    #[tokio::test]
    async fn session_data_is_writable_until_the_run_ends() {
        let svc = test_service().await;
        let (study, _, batch) = seed_study(&svc, false, &[("A", true, false)]).await;
        let worker = seed_worker(&svc, WorkerKind::Personal).await;
        let run = svc.start_run(&study.id, &batch.id, &worker.token).await.unwrap();
        let run_id = &run.study_result_id;

        svc.heartbeat(run_id).await.unwrap();
        svc.set_study_session_data(run_id, Some(r#"{"score":3}"#)).await.unwrap();
        assert_eq!(
            svc.study_session_data(run_id).await.unwrap().as_deref(),
            Some(r#"{"score":3}"#)
        );

        svc.abandon(run_id, None).await.unwrap();
        let err = svc.set_study_session_data(run_id, None).await.unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::AlreadyFinished { .. })));
        assert!(svc.heartbeat(run_id).await.is_err());
    }

    #[tokio::test]
    async fn heartbeat_for_unknown_run_is_not_found() {
        let svc = test_service().await;
        let err = svc.heartbeat("srs-00000000").await.unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::NotFound { .. })));
    }
}
