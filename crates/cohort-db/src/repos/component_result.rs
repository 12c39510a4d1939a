//! Component result repository.
//!
//! A run has at most one open visit (enforced by a partial unique index); it
//! is the component the run is currently at.

use chrono::Utc;

use cohort_core::entities::ComponentResult;
use cohort_core::enums::{ComponentResultState, EntityType};
use cohort_core::errors::CoreError;
use cohort_core::ids::PREFIX_COMPONENT_RESULT;

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_datetime, parse_enum, parse_optional_datetime, timestamp};

const SELECT_COLS: &str = "id, study_result_id, component_id, state, data, started_at, ended_at";

const OPEN_STATES: &str = "('started', 'data_retrieved', 'result_data_posted')";

fn row_to_component_result(row: &libsql::Row) -> Result<ComponentResult, DatabaseError> {
    Ok(ComponentResult {
        id: row.get(0)?,
        study_result_id: row.get(1)?,
        component_id: row.get(2)?,
        state: parse_enum(&row.get::<String>(3)?)?,
        data: get_opt_string(row, 4)?,
        started_at: parse_datetime(&row.get::<String>(5)?)?,
        ended_at: parse_optional_datetime(get_opt_string(row, 6)?.as_deref())?,
    })
}

pub(crate) async fn find_component_result(
    conn: &libsql::Connection,
    id: &str,
) -> Result<ComponentResult, DatabaseError> {
    let mut rows = conn
        .query(&format!("SELECT {SELECT_COLS} FROM component_results WHERE id = ?1"), [id])
        .await?;
    match rows.next().await? {
        Some(row) => row_to_component_result(&row),
        None => Err(CoreError::not_found(EntityType::ComponentResult, id).into()),
    }
}

/// The run's open visit, if it has one.
pub(crate) async fn open_visit(
    conn: &libsql::Connection,
    study_result_id: &str,
) -> Result<Option<ComponentResult>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {SELECT_COLS} FROM component_results
                 WHERE study_result_id = ?1 AND state IN {OPEN_STATES}"
            ),
            [study_result_id],
        )
        .await?;
    rows.next()
        .await?
        .map(|row| row_to_component_result(&row))
        .transpose()
}

/// Every visit of a run, in visit order.
pub(crate) async fn visits(
    conn: &libsql::Connection,
    study_result_id: &str,
) -> Result<Vec<ComponentResult>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {SELECT_COLS} FROM component_results
                 WHERE study_result_id = ?1 ORDER BY started_at, rowid"
            ),
            [study_result_id],
        )
        .await?;

    let mut visits = Vec::new();
    while let Some(row) = rows.next().await? {
        visits.push(row_to_component_result(&row)?);
    }
    Ok(visits)
}

/// Open a visit to `component_id`. Fails on the unique index if one is open.
pub(crate) async fn insert_visit(
    conn: &libsql::Connection,
    study_result_id: &str,
    component_id: &str,
) -> Result<ComponentResult, DatabaseError> {
    let now = Utc::now();
    let id = crate::generate_id(conn, PREFIX_COMPONENT_RESULT).await?;
    conn.execute(
        &format!(
            "INSERT INTO component_results ({SELECT_COLS})
             VALUES (?1, ?2, ?3, 'started', NULL, ?4, NULL)"
        ),
        libsql::params![id.as_str(), study_result_id, component_id, timestamp(now)],
    )
    .await?;

    Ok(ComponentResult {
        id,
        study_result_id: study_result_id.to_string(),
        component_id: component_id.to_string(),
        state: ComponentResultState::Started,
        data: None,
        started_at: now,
        ended_at: None,
    })
}

/// Mark the data of an open visit as handed out. Returns `false` if the
/// visit was not in `Started`.
pub(crate) async fn mark_retrieved(conn: &libsql::Connection, id: &str) -> Result<bool, DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE component_results SET state = 'data_retrieved' WHERE id = ?1 AND state = 'started'",
            [id],
        )
        .await?;
    Ok(updated == 1)
}

/// Store a result payload on an open visit, replacing any earlier one.
/// Returns `false` if the visit is closed.
pub(crate) async fn post_data(
    conn: &libsql::Connection,
    id: &str,
    data: &str,
) -> Result<bool, DatabaseError> {
    let updated = conn
        .execute(
            &format!(
                "UPDATE component_results SET state = 'result_data_posted', data = ?1
                 WHERE id = ?2 AND state IN {OPEN_STATES}"
            ),
            libsql::params![data, id],
        )
        .await?;
    Ok(updated == 1)
}

/// Close an open visit with a terminal state.
pub(crate) async fn close(
    conn: &libsql::Connection,
    id: &str,
    state: ComponentResultState,
) -> Result<bool, DatabaseError> {
    debug_assert!(state.is_terminal());
    let updated = conn
        .execute(
            &format!(
                "UPDATE component_results SET state = ?1, ended_at = ?2
                 WHERE id = ?3 AND state IN {OPEN_STATES}"
            ),
            libsql::params![state.as_str(), timestamp(Utc::now()), id],
        )
        .await?;
    Ok(updated == 1)
}
