//! Batch repository.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use cohort_core::capacity::Capacity;
use cohort_core::entities::Batch;
use cohort_core::enums::{EntityType, WorkerKind};
use cohort_core::errors::CoreError;
use cohort_core::ids::PREFIX_BATCH;

use crate::error::DatabaseError;
use crate::helpers::{get_bool, get_opt_u32, parse_datetime, timestamp};
use crate::repos::study::find_study;
use crate::service::CohortService;

const SELECT_COLS: &str = "id, study_id, title, active, max_active_members, max_total_members, allowed_worker_kinds, created_at";

/// Input for [`CohortService::create_batch`]. Also the shape of a batch in a seed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBatch {
    pub title: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub max_active_members: Option<u32>,
    #[serde(default)]
    pub max_total_members: Option<u32>,
    #[serde(default = "default_worker_kinds")]
    pub allowed_worker_kinds: Vec<WorkerKind>,
}

impl NewBatch {
    /// An active batch with unlimited groups that admits every worker kind.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            active: default_active(),
            max_active_members: None,
            max_total_members: None,
            allowed_worker_kinds: default_worker_kinds(),
        }
    }

    #[must_use]
    pub const fn with_capacity(mut self, max_active: Option<u32>, max_total: Option<u32>) -> Self {
        self.max_active_members = max_active;
        self.max_total_members = max_total;
        self
    }

    #[must_use]
    pub fn with_worker_kinds(mut self, kinds: Vec<WorkerKind>) -> Self {
        self.allowed_worker_kinds = kinds;
        self
    }
}

const fn default_active() -> bool {
    true
}

fn default_worker_kinds() -> Vec<WorkerKind> {
    vec![
        WorkerKind::Preview,
        WorkerKind::OneTime,
        WorkerKind::Personal,
        WorkerKind::Platform,
    ]
}

fn row_to_batch(row: &libsql::Row) -> Result<Batch, DatabaseError> {
    let kinds_json: String = row.get(6)?;
    let allowed_worker_kinds = serde_json::from_str(&kinds_json).map_err(|e| {
        DatabaseError::InvalidState(format!("allowed_worker_kinds is not a kind list: {e}"))
    })?;

    Ok(Batch {
        id: row.get(0)?,
        study_id: row.get(1)?,
        title: row.get(2)?,
        active: get_bool(row, 3)?,
        max_active_members: get_opt_u32(row, 4)?,
        max_total_members: get_opt_u32(row, 5)?,
        allowed_worker_kinds,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
    })
}

pub(crate) async fn find_batch(conn: &libsql::Connection, id: &str) -> Result<Batch, DatabaseError> {
    let mut rows = conn
        .query(&format!("SELECT {SELECT_COLS} FROM batches WHERE id = ?1"), [id])
        .await?;
    match rows.next().await? {
        Some(row) => row_to_batch(&row),
        None => Err(CoreError::not_found(EntityType::Batch, id).into()),
    }
}

impl CohortService {
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if the group limits are unusable and
    /// `CoreError::NotFound` for an unknown study.
    pub async fn create_batch(&self, study_id: &str, new: NewBatch) -> Result<Batch, DatabaseError> {
        let capacity = Capacity {
            max_active: new.max_active_members,
            max_total: new.max_total_members,
        };
        capacity.validate()?;
        find_study(&*self.db().shared().await?, study_id).await?;

        let now = Utc::now();
        let id = self.db().generate_id(PREFIX_BATCH).await?;
        let kinds_json =
            serde_json::to_string(&new.allowed_worker_kinds).map_err(|e| DatabaseError::Other(e.into()))?;

        self.db()
            .shared()
            .await?
            .execute(
                &format!("INSERT INTO batches ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                libsql::params![
                    id.as_str(),
                    study_id,
                    new.title.as_str(),
                    i64::from(new.active),
                    new.max_active_members.map(i64::from),
                    new.max_total_members.map(i64::from),
                    kinds_json,
                    timestamp(now)
                ],
            )
            .await?;

        tracing::debug!(batch_id = %id, study_id, ?capacity, "batch created");
        Ok(Batch {
            id,
            study_id: study_id.to_string(),
            title: new.title,
            active: new.active,
            max_active_members: new.max_active_members,
            max_total_members: new.max_total_members,
            allowed_worker_kinds: new.allowed_worker_kinds,
            created_at: now,
        })
    }

    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown batch.
    pub async fn get_batch(&self, id: &str) -> Result<Batch, DatabaseError> {
        let conn = self.db().shared().await?;
        find_batch(&conn, id).await
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_batches(&self, study_id: &str) -> Result<Vec<Batch>, DatabaseError> {
        let conn = self.db().shared().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {SELECT_COLS} FROM batches WHERE study_id = ?1 ORDER BY created_at"),
                [study_id],
            )
            .await?;

        let mut batches = Vec::new();
        while let Some(row) = rows.next().await? {
            batches.push(row_to_batch(&row)?);
        }
        Ok(batches)
    }

    /// Open or close a batch for new runs. Runs already started continue.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown batch.
    pub async fn set_batch_active(&self, id: &str, active: bool) -> Result<Batch, DatabaseError> {
        let updated = self
            .db()
            .shared()
            .await?
            .execute(
                "UPDATE batches SET active = ?1 WHERE id = ?2",
                libsql::params![i64::from(active), id],
            )
            .await?;
        if updated == 0 {
            return Err(CoreError::not_found(EntityType::Batch, id).into());
        }
        self.get_batch(id).await
    }
}
