//! Group result repository.
//!
//! Member counters are only ever changed by guarded UPDATE statements whose
//! WHERE clause repeats the capacity check, so a counter can never be pushed
//! past a limit even if a caller's view of the row is stale.

use chrono::Utc;

use cohort_core::capacity::Capacity;
use cohort_core::entities::GroupResult;
use cohort_core::enums::{EntityType, GroupState};
use cohort_core::errors::CoreError;
use cohort_core::ids::PREFIX_GROUP_RESULT;
use cohort_core::responses::GroupSession;

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, get_u32, parse_datetime, parse_enum, parse_optional_datetime, timestamp};
use crate::lock::LockScope;
use crate::service::CohortService;

const SELECT_COLS: &str = "id, batch_id, state, active_member_count, history_member_count, \
     session_data, session_version, created_at, updated_at, finished_at";

/// Capacity predicate shared by the candidate query and the guarded join.
/// `?2` is the active limit, `?3` the total limit; NULL means unlimited.
const HAS_ROOM: &str = "state = 'started' \
     AND (?2 IS NULL OR active_member_count < ?2) \
     AND (?3 IS NULL OR active_member_count + history_member_count < ?3)";

fn row_to_group(row: &libsql::Row) -> Result<GroupResult, DatabaseError> {
    let raw_version = row.get::<i64>(6)?;
    Ok(GroupResult {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        state: parse_enum(&row.get::<String>(2)?)?,
        active_member_count: get_u32(row, 3)?,
        history_member_count: get_u32(row, 4)?,
        session_data: get_opt_string(row, 5)?,
        session_version: u64::try_from(raw_version).map_err(|_| {
            DatabaseError::InvalidState(format!("negative session_version: {raw_version}"))
        })?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
        updated_at: parse_datetime(&row.get::<String>(8)?)?,
        finished_at: parse_optional_datetime(get_opt_string(row, 9)?.as_deref())?,
    })
}

async fn collect_groups(mut rows: libsql::Rows) -> Result<Vec<GroupResult>, DatabaseError> {
    let mut groups = Vec::new();
    while let Some(row) = rows.next().await? {
        groups.push(row_to_group(&row)?);
    }
    Ok(groups)
}

pub(crate) async fn find_group(conn: &libsql::Connection, id: &str) -> Result<GroupResult, DatabaseError> {
    let mut rows = conn
        .query(&format!("SELECT {SELECT_COLS} FROM group_results WHERE id = ?1"), [id])
        .await?;
    match rows.next().await? {
        Some(row) => row_to_group(&row),
        None => Err(CoreError::not_found(EntityType::GroupResult, id).into()),
    }
}

/// Started groups of a batch with room for one more member, best first.
pub(crate) async fn candidate_groups(
    conn: &libsql::Connection,
    batch_id: &str,
    capacity: Capacity,
    exclude: Option<&str>,
) -> Result<Vec<GroupResult>, DatabaseError> {
    let rows = conn
        .query(
            &format!(
                "SELECT {SELECT_COLS} FROM group_results
                 WHERE batch_id = ?1 AND {HAS_ROOM} AND (?4 IS NULL OR id <> ?4)
                 ORDER BY active_member_count DESC, history_member_count DESC, created_at, id"
            ),
            libsql::params![
                batch_id,
                capacity.max_active.map(i64::from),
                capacity.max_total.map(i64::from),
                exclude
            ],
        )
        .await?;
    collect_groups(rows).await
}

/// Create a started group with the caller as its first active member.
pub(crate) async fn insert_group(
    conn: &libsql::Connection,
    batch_id: &str,
) -> Result<GroupResult, DatabaseError> {
    let now = Utc::now();
    let id = crate::generate_id(conn, PREFIX_GROUP_RESULT).await?;
    conn.execute(
        &format!(
            "INSERT INTO group_results ({SELECT_COLS})
             VALUES (?1, ?2, 'started', 1, 0, NULL, 0, ?3, ?4, NULL)"
        ),
        libsql::params![id.as_str(), batch_id, timestamp(now), timestamp(now)],
    )
    .await?;

    Ok(GroupResult {
        id,
        batch_id: batch_id.to_string(),
        state: GroupState::Started,
        active_member_count: 1,
        history_member_count: 0,
        session_data: None,
        session_version: 0,
        created_at: now,
        updated_at: now,
        finished_at: None,
    })
}

/// Add one active member if the group still has room.
///
/// Returns `false` when the guard rejected the increment.
pub(crate) async fn try_join(
    conn: &libsql::Connection,
    group_id: &str,
    capacity: Capacity,
) -> Result<bool, DatabaseError> {
    let updated = conn
        .execute(
            &format!(
                "UPDATE group_results
                 SET active_member_count = active_member_count + 1, updated_at = ?4
                 WHERE id = ?1 AND {HAS_ROOM}"
            ),
            libsql::params![
                group_id,
                capacity.max_active.map(i64::from),
                capacity.max_total.map(i64::from),
                timestamp(Utc::now())
            ],
        )
        .await?;
    Ok(updated == 1)
}

/// Move one member from active to history.
pub(crate) async fn release_member(
    conn: &libsql::Connection,
    group_id: &str,
) -> Result<GroupResult, DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE group_results
             SET active_member_count = active_member_count - 1,
                 history_member_count = history_member_count + 1,
                 updated_at = ?2
             WHERE id = ?1 AND active_member_count > 0",
            libsql::params![group_id, timestamp(Utc::now())],
        )
        .await?;

    let group = find_group(conn, group_id).await?;
    if updated == 0 {
        return Err(DatabaseError::InvalidState(format!(
            "group {group_id} has no active member to release"
        )));
    }
    Ok(group)
}

impl CohortService {
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown group.
    pub async fn get_group(&self, id: &str) -> Result<GroupResult, DatabaseError> {
        let conn = self.db().shared().await?;
        find_group(&conn, id).await
    }

    /// All groups of a batch, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_groups(&self, batch_id: &str) -> Result<Vec<GroupResult>, DatabaseError> {
        let conn = self.db().shared().await?;
        let rows = conn
            .query(
                &format!("SELECT {SELECT_COLS} FROM group_results WHERE batch_id = ?1 ORDER BY created_at, id"),
                [batch_id],
            )
            .await?;
        collect_groups(rows).await
    }

    /// Close a group to new members. Current members keep running.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTransition` if the group is already finished.
    pub async fn finish_group(&self, id: &str) -> Result<GroupResult, DatabaseError> {
        let tx = self.db().begin_locked(LockScope::Group(id)).await?;
        let result = finish_group_in(&tx, id).await;
        tx.finish(result).await
    }

    /// The group's session data and the version a writer must present.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown group.
    pub async fn group_session(&self, group_id: &str) -> Result<GroupSession, DatabaseError> {
        Ok(GroupSession::from(&self.get_group(group_id).await?))
    }

    /// Replace a group's session data if nobody wrote since `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::VersionConflict` if the stored version moved on,
    /// and `CoreError::AlreadyFinished` for a finished group.
    pub async fn update_group_session(
        &self,
        group_id: &str,
        expected_version: u64,
        data: Option<&str>,
    ) -> Result<GroupSession, DatabaseError> {
        let expected = i64::try_from(expected_version)
            .map_err(|_| CoreError::Validation(format!("version out of range: {expected_version}")))?;

        let updated = self
            .db()
            .shared()
            .await?
            .execute(
                "UPDATE group_results
                 SET session_data = ?1, session_version = session_version + 1, updated_at = ?2
                 WHERE id = ?3 AND session_version = ?4 AND state = 'started'",
                libsql::params![data, timestamp(Utc::now()), group_id, expected],
            )
            .await?;

        let group = self.get_group(group_id).await?;
        if updated == 0 {
            if group.state == GroupState::Finished {
                return Err(CoreError::already_finished(EntityType::GroupResult, group_id).into());
            }
            tracing::debug!(
                group_id,
                expected = expected_version,
                found = group.session_version,
                "group session write lost"
            );
            return Err(CoreError::VersionConflict {
                entity_type: EntityType::GroupResult,
                id: group_id.to_string(),
                expected: expected_version,
                found: group.session_version,
            }
            .into());
        }
        Ok(GroupSession::from(&group))
    }
}

async fn finish_group_in(conn: &libsql::Connection, id: &str) -> Result<GroupResult, DatabaseError> {
    let group = find_group(conn, id).await?;
    if !group.state.can_transition_to(GroupState::Finished) {
        return Err(CoreError::InvalidTransition {
            entity_type: EntityType::GroupResult,
            id: id.to_string(),
            from: group.state.to_string(),
            to: GroupState::Finished.to_string(),
        }
        .into());
    }

    let now = timestamp(Utc::now());
    conn.execute(
        "UPDATE group_results SET state = 'finished', finished_at = ?1, updated_at = ?1 WHERE id = ?2",
        libsql::params![now, id],
    )
    .await?;
    tracing::info!(group_id = id, active = group.active_member_count, "group finished");
    find_group(conn, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{seed_batch, test_service};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn guarded_join_stops_at_the_active_limit() {
        let svc = test_service().await;
        let batch = seed_batch(&svc, true, Some(2), None).await;
        let conn = svc.db().conn();
        let capacity = batch.capacity();

        let group = insert_group(conn, &batch.id).await.unwrap();
        assert!(try_join(conn, &group.id, capacity).await.unwrap());
        assert!(!try_join(conn, &group.id, capacity).await.unwrap());
        assert_eq!(find_group(conn, &group.id).await.unwrap().active_member_count, 2);
    }

    #[tokio::test]
    async fn guarded_join_counts_history_against_total() {
        let svc = test_service().await;
        let batch = seed_batch(&svc, true, None, Some(2)).await;
        let conn = svc.db().conn();

        let group = insert_group(conn, &batch.id).await.unwrap();
        release_member(conn, &group.id).await.unwrap();
        assert!(try_join(conn, &group.id, batch.capacity()).await.unwrap());
        assert!(!try_join(conn, &group.id, batch.capacity()).await.unwrap());

        let group = find_group(conn, &group.id).await.unwrap();
        assert_eq!((group.active_member_count, group.history_member_count), (1, 1));
    }

    #[tokio::test]
    async fn candidates_exclude_full_and_finished_groups() {
        let svc = test_service().await;
        let batch = seed_batch(&svc, true, Some(1), None).await;
        let conn = svc.db().conn();

        insert_group(conn, &batch.id).await.unwrap();
        let empty = insert_group(conn, &batch.id).await.unwrap();
        release_member(conn, &empty.id).await.unwrap();

        let candidates = candidate_groups(conn, &batch.id, batch.capacity(), None).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, empty.id);

        svc.finish_group(&empty.id).await.unwrap();
        let candidates = candidate_groups(conn, &batch.id, batch.capacity(), None).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn release_without_members_is_invalid() {
        let svc = test_service().await;
        let batch = seed_batch(&svc, true, None, None).await;
        let conn = svc.db().conn();
        let group = insert_group(conn, &batch.id).await.unwrap();
        release_member(conn, &group.id).await.unwrap();
        assert!(matches!(
            release_member(conn, &group.id).await,
            Err(DatabaseError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn finishing_twice_is_an_invalid_transition() {
        let svc = test_service().await;
        let batch = seed_batch(&svc, true, None, None).await;
        let group = insert_group(svc.db().conn(), &batch.id).await.unwrap();

        let finished = svc.finish_group(&group.id).await.unwrap();
        assert_eq!(finished.state, GroupState::Finished);
        assert!(finished.finished_at.is_some());

        let err = svc.finish_group(&group.id).await.unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn group_session_compare_and_swap() {
        let svc = test_service().await;
        let batch = seed_batch(&svc, true, None, None).await;
        let group = insert_group(svc.db().conn(), &batch.id).await.unwrap();

        let session = svc.group_session(&group.id).await.unwrap();
        assert_eq!(session.version, 0);

        let written = svc
            .update_group_session(&group.id, 0, Some(r#"{"round":1}"#))
            .await
            .unwrap();
        assert_eq!(written.version, 1);

        let stale = svc
            .update_group_session(&group.id, 0, Some(r#"{"round":2}"#))
            .await
            .unwrap_err();
        assert!(matches!(
            stale.core(),
            Some(CoreError::VersionConflict { expected: 0, found: 1, .. })
        ));
        assert_eq!(
            svc.group_session(&group.id).await.unwrap().data.as_deref(),
            Some(r#"{"round":1}"#)
        );
    }
}
