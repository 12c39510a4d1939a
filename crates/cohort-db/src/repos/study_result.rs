//! Study result repository.
//!
//! State changes are conditional UPDATEs keyed on the state the caller read,
//! so a write based on a stale read affects no row instead of clobbering a
//! concurrent transition.

use chrono::{DateTime, Utc};

use cohort_core::entities::StudyResult;
use cohort_core::enums::{EntityType, StudyResultState};
use cohort_core::errors::CoreError;
use cohort_core::ids::PREFIX_STUDY_RESULT;

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_datetime, parse_enum, parse_optional_datetime, timestamp};

const SELECT_COLS: &str = "id, study_id, batch_id, worker_id, group_id, state, confirmation_code, \
     message, session_data, started_at, ended_at, last_seen_at";

fn row_to_study_result(row: &libsql::Row) -> Result<StudyResult, DatabaseError> {
    Ok(StudyResult {
        id: row.get(0)?,
        study_id: row.get(1)?,
        batch_id: row.get(2)?,
        worker_id: row.get(3)?,
        group_id: get_opt_string(row, 4)?,
        state: parse_enum(&row.get::<String>(5)?)?,
        confirmation_code: get_opt_string(row, 6)?,
        message: get_opt_string(row, 7)?,
        session_data: get_opt_string(row, 8)?,
        started_at: parse_datetime(&row.get::<String>(9)?)?,
        ended_at: parse_optional_datetime(get_opt_string(row, 10)?.as_deref())?,
        last_seen_at: parse_datetime(&row.get::<String>(11)?)?,
    })
}

async fn collect(mut rows: libsql::Rows) -> Result<Vec<StudyResult>, DatabaseError> {
    let mut results = Vec::new();
    while let Some(row) = rows.next().await? {
        results.push(row_to_study_result(&row)?);
    }
    Ok(results)
}

pub(crate) async fn find_study_result(
    conn: &libsql::Connection,
    id: &str,
) -> Result<StudyResult, DatabaseError> {
    let mut rows = conn
        .query(&format!("SELECT {SELECT_COLS} FROM study_results WHERE id = ?1"), [id])
        .await?;
    match rows.next().await? {
        Some(row) => row_to_study_result(&row),
        None => Err(CoreError::not_found(EntityType::StudyResult, id).into()),
    }
}

pub(crate) async fn insert_study_result(
    conn: &libsql::Connection,
    study_id: &str,
    batch_id: &str,
    worker_id: &str,
    group_id: Option<&str>,
) -> Result<StudyResult, DatabaseError> {
    let now = Utc::now();
    let id = crate::generate_id(conn, PREFIX_STUDY_RESULT).await?;
    conn.execute(
        &format!(
            "INSERT INTO study_results ({SELECT_COLS})
             VALUES (?1, ?2, ?3, ?4, ?5, 'started', NULL, NULL, NULL, ?6, NULL, ?6)"
        ),
        libsql::params![id.as_str(), study_id, batch_id, worker_id, group_id, timestamp(now)],
    )
    .await?;

    Ok(StudyResult {
        id,
        study_id: study_id.to_string(),
        batch_id: batch_id.to_string(),
        worker_id: worker_id.to_string(),
        group_id: group_id.map(ToString::to_string),
        state: StudyResultState::Started,
        confirmation_code: None,
        message: None,
        session_data: None,
        started_at: now,
        ended_at: None,
        last_seen_at: now,
    })
}

/// Every run a worker has made in a batch, oldest first.
pub(crate) async fn runs_of_worker(
    conn: &libsql::Connection,
    worker_id: &str,
    batch_id: &str,
) -> Result<Vec<StudyResult>, DatabaseError> {
    let rows = conn
        .query(
            &format!(
                "SELECT {SELECT_COLS} FROM study_results
                 WHERE worker_id = ?1 AND batch_id = ?2 ORDER BY started_at, rowid"
            ),
            [worker_id, batch_id],
        )
        .await?;
    collect(rows).await
}

pub(crate) async fn list_for_batch(
    conn: &libsql::Connection,
    batch_id: &str,
    limit: u32,
) -> Result<Vec<StudyResult>, DatabaseError> {
    let rows = conn
        .query(
            &format!(
                "SELECT {SELECT_COLS} FROM study_results
                 WHERE batch_id = ?1 ORDER BY started_at, rowid LIMIT ?2"
            ),
            libsql::params![batch_id, i64::from(limit)],
        )
        .await?;
    collect(rows).await
}

/// Move a non-terminal run from `from` to `to`. Returns `false` if the run
/// was no longer in `from`.
pub(crate) async fn advance_state(
    conn: &libsql::Connection,
    id: &str,
    from: StudyResultState,
    to: StudyResultState,
) -> Result<bool, DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE study_results SET state = ?1, last_seen_at = ?2 WHERE id = ?3 AND state = ?4",
            libsql::params![to.as_str(), timestamp(Utc::now()), id, from.as_str()],
        )
        .await?;
    Ok(updated == 1)
}

/// Write a terminal state. Returns `false` if the run was already terminal.
pub(crate) async fn terminate(
    conn: &libsql::Connection,
    id: &str,
    state: StudyResultState,
    confirmation_code: Option<&str>,
    message: Option<&str>,
    ended_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE study_results
             SET state = ?1, confirmation_code = ?2, message = ?3, ended_at = ?4, last_seen_at = ?4
             WHERE id = ?5 AND state IN ('started', 'data_retrieved')",
            libsql::params![state.as_str(), confirmation_code, message, timestamp(ended_at), id],
        )
        .await?;
    Ok(updated == 1)
}

pub(crate) async fn set_group(
    conn: &libsql::Connection,
    id: &str,
    group_id: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE study_results SET group_id = ?1 WHERE id = ?2",
        libsql::params![group_id, id],
    )
    .await?;
    Ok(())
}

/// Record liveness. Returns `false` if the run is terminal.
pub(crate) async fn touch(conn: &libsql::Connection, id: &str) -> Result<bool, DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE study_results SET last_seen_at = ?1
             WHERE id = ?2 AND state IN ('started', 'data_retrieved')",
            libsql::params![timestamp(Utc::now()), id],
        )
        .await?;
    Ok(updated == 1)
}

/// Replace the run's session data. Returns `false` if the run is terminal.
pub(crate) async fn set_session_data(
    conn: &libsql::Connection,
    id: &str,
    data: Option<&str>,
) -> Result<bool, DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE study_results SET session_data = ?1, last_seen_at = ?2
             WHERE id = ?3 AND state IN ('started', 'data_retrieved')",
            libsql::params![data, timestamp(Utc::now()), id],
        )
        .await?;
    Ok(updated == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{seed_batch, test_service};

    #[tokio::test]
    async fn terminate_only_once() {
        let svc = test_service().await;
        let batch = seed_batch(&svc, false, None, None).await;
        let worker = svc
            .create_worker(cohort_core::enums::WorkerKind::Personal, None, None)
            .await
            .unwrap();
        let conn = svc.db().conn();
        let run = insert_study_result(conn, &batch.study_id, &batch.id, &worker.id, None)
            .await
            .unwrap();

        assert!(advance_state(conn, &run.id, StudyResultState::Started, StudyResultState::DataRetrieved).await.unwrap());
        assert!(!advance_state(conn, &run.id, StudyResultState::Started, StudyResultState::DataRetrieved).await.unwrap());

        assert!(terminate(conn, &run.id, StudyResultState::Fail, None, Some("crash"), Utc::now()).await.unwrap());
        assert!(!terminate(conn, &run.id, StudyResultState::Aborted, None, None, Utc::now()).await.unwrap());
        assert!(!touch(conn, &run.id).await.unwrap());

        let stored = find_study_result(conn, &run.id).await.unwrap();
        assert_eq!(stored.state, StudyResultState::Fail);
        assert_eq!(stored.message.as_deref(), Some("crash"));
        assert!(stored.ended_at.is_some());
    }
}
