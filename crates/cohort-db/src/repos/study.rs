//! Study repository.

use chrono::Utc;

use cohort_core::entities::Study;
use cohort_core::enums::EntityType;
use cohort_core::errors::CoreError;
use cohort_core::ids::PREFIX_STUDY;

use crate::error::DatabaseError;
use crate::helpers::{get_bool, parse_datetime, timestamp};
use crate::service::CohortService;

const SELECT_COLS: &str = "id, title, group_study, locked, created_at, updated_at";

fn row_to_study(row: &libsql::Row) -> Result<Study, DatabaseError> {
    Ok(Study {
        id: row.get(0)?,
        title: row.get(1)?,
        group_study: get_bool(row, 2)?,
        locked: get_bool(row, 3)?,
        created_at: parse_datetime(&row.get::<String>(4)?)?,
        updated_at: parse_datetime(&row.get::<String>(5)?)?,
    })
}

/// Load a study or fail with `NotFound`.
pub(crate) async fn find_study(conn: &libsql::Connection, id: &str) -> Result<Study, DatabaseError> {
    let mut rows = conn
        .query(&format!("SELECT {SELECT_COLS} FROM studies WHERE id = ?1"), [id])
        .await?;
    match rows.next().await? {
        Some(row) => row_to_study(&row),
        None => Err(CoreError::not_found(EntityType::Study, id).into()),
    }
}

/// Fail with `Forbidden` if the study is locked against structural edits.
pub(crate) fn ensure_unlocked(study: &Study) -> Result<(), DatabaseError> {
    if study.locked {
        return Err(CoreError::Forbidden(format!(
            "study {} is locked; unlock it before changing its structure",
            study.id
        ))
        .into());
    }
    Ok(())
}

impl CohortService {
    /// # Errors
    ///
    /// Returns `DatabaseError` if the insert fails.
    pub async fn create_study(&self, title: &str, group_study: bool) -> Result<Study, DatabaseError> {
        let now = Utc::now();
        let id = self.db().generate_id(PREFIX_STUDY).await?;

        self.db()
            .shared()
            .await?
            .execute(
                &format!("INSERT INTO studies ({SELECT_COLS}) VALUES (?1, ?2, ?3, 0, ?4, ?5)"),
                libsql::params![
                    id.as_str(),
                    title,
                    i64::from(group_study),
                    timestamp(now),
                    timestamp(now)
                ],
            )
            .await?;

        Ok(Study {
            id,
            title: title.to_string(),
            group_study,
            locked: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown study.
    pub async fn get_study(&self, id: &str) -> Result<Study, DatabaseError> {
        find_study(&*self.db().shared().await?, id).await
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_studies(&self, limit: u32) -> Result<Vec<Study>, DatabaseError> {
        let conn = self.db().shared().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {SELECT_COLS} FROM studies ORDER BY created_at DESC LIMIT ?1"),
                [i64::from(limit)],
            )
            .await?;

        let mut studies = Vec::new();
        while let Some(row) = rows.next().await? {
            studies.push(row_to_study(&row)?);
        }
        Ok(studies)
    }

    /// Lock a study against structural edits. Runs in flight are unaffected.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown study.
    pub async fn lock_study(&self, id: &str) -> Result<Study, DatabaseError> {
        self.set_study_locked(id, true).await
    }

    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown study.
    pub async fn unlock_study(&self, id: &str) -> Result<Study, DatabaseError> {
        self.set_study_locked(id, false).await
    }

    async fn set_study_locked(&self, id: &str, locked: bool) -> Result<Study, DatabaseError> {
        let updated = self
            .db()
            .shared()
            .await?
            .execute(
                "UPDATE studies SET locked = ?1, updated_at = ?2 WHERE id = ?3",
                libsql::params![i64::from(locked), timestamp(Utc::now()), id],
            )
            .await?;
        if updated == 0 {
            return Err(CoreError::not_found(EntityType::Study, id).into());
        }
        self.get_study(id).await
    }
}
