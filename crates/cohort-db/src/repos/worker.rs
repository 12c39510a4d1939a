//! Worker registry.
//!
//! Workers are addressed by an opaque bearer token; the run core never trusts
//! a worker id passed in by a caller.

use chrono::Utc;

use cohort_core::entities::Worker;
use cohort_core::enums::{EntityType, WorkerKind};
use cohort_core::errors::CoreError;
use cohort_core::ids::PREFIX_WORKER;

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_datetime, parse_enum, random_hex, timestamp};
use crate::service::CohortService;

const SELECT_COLS: &str = "id, kind, token, label, platform_id, created_at";

/// Bytes of randomness in a worker token (32 hex chars).
const TOKEN_BYTES: usize = 16;

fn row_to_worker(row: &libsql::Row) -> Result<Worker, DatabaseError> {
    Ok(Worker {
        id: row.get(0)?,
        kind: parse_enum(&row.get::<String>(1)?)?,
        token: row.get(2)?,
        label: get_opt_string(row, 3)?,
        platform_id: get_opt_string(row, 4)?,
        created_at: parse_datetime(&row.get::<String>(5)?)?,
    })
}

/// Shortened token for errors and logs.
fn redact(token: &str) -> String {
    let head: String = token.chars().take(4).collect();
    format!("token {head}...")
}

pub(crate) async fn find_worker(conn: &libsql::Connection, id: &str) -> Result<Worker, DatabaseError> {
    let mut rows = conn
        .query(&format!("SELECT {SELECT_COLS} FROM workers WHERE id = ?1"), [id])
        .await?;
    match rows.next().await? {
        Some(row) => row_to_worker(&row),
        None => Err(CoreError::not_found(EntityType::Worker, id).into()),
    }
}

impl CohortService {
    /// # Errors
    ///
    /// Returns `DatabaseError` if the random source or the insert fails.
    pub async fn create_worker(
        &self,
        kind: WorkerKind,
        label: Option<&str>,
        platform_id: Option<&str>,
    ) -> Result<Worker, DatabaseError> {
        let now = Utc::now();
        let id = self.db().generate_id(PREFIX_WORKER).await?;
        let token = random_hex(TOKEN_BYTES)?;

        self.db()
            .shared()
            .await?
            .execute(
                &format!("INSERT INTO workers ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                libsql::params![
                    id.as_str(),
                    kind.as_str(),
                    token.as_str(),
                    label,
                    platform_id,
                    timestamp(now)
                ],
            )
            .await?;

        tracing::debug!(worker_id = %id, %kind, "worker registered");
        Ok(Worker {
            id,
            kind,
            token,
            label: label.map(ToString::to_string),
            platform_id: platform_id.map(ToString::to_string),
            created_at: now,
        })
    }

    /// Resolve the worker behind a token.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` if no worker holds the token. The error
    /// carries only a redacted prefix of the token.
    pub async fn resolve_worker(&self, token: &str) -> Result<Worker, DatabaseError> {
        let conn = self.db().shared().await?;
        let mut rows = conn
            .query(&format!("SELECT {SELECT_COLS} FROM workers WHERE token = ?1"), [token])
            .await?;
        match rows.next().await? {
            Some(row) => row_to_worker(&row),
            None => Err(CoreError::not_found(EntityType::Worker, redact(token)).into()),
        }
    }

    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown worker.
    pub async fn get_worker(&self, id: &str) -> Result<Worker, DatabaseError> {
        find_worker(&*self.db().shared().await?, id).await
    }
}
