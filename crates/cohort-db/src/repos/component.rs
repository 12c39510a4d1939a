//! Component repository.
//!
//! Components are appended to a study at the next free position. The ordered,
//! active-filtered walk over them lives in `cohort_core::sequencer`.

use chrono::Utc;

use cohort_core::entities::Component;
use cohort_core::enums::EntityType;
use cohort_core::errors::CoreError;
use cohort_core::ids::PREFIX_COMPONENT;

use crate::error::DatabaseError;
use crate::helpers::{get_bool, get_u32, parse_datetime, timestamp};
use crate::lock::LockScope;
use crate::repos::study::{ensure_unlocked, find_study};
use crate::service::CohortService;
use crate::updates::component::ComponentUpdate;

const SELECT_COLS: &str =
    "id, study_id, position, title, active, reloadable, payload, created_at, updated_at";

fn row_to_component(row: &libsql::Row) -> Result<Component, DatabaseError> {
    Ok(Component {
        id: row.get(0)?,
        study_id: row.get(1)?,
        position: get_u32(row, 2)?,
        title: row.get(3)?,
        active: get_bool(row, 4)?,
        reloadable: get_bool(row, 5)?,
        payload: row.get(6)?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
        updated_at: parse_datetime(&row.get::<String>(8)?)?,
    })
}

pub(crate) async fn find_component(
    conn: &libsql::Connection,
    id: &str,
) -> Result<Component, DatabaseError> {
    let mut rows = conn
        .query(&format!("SELECT {SELECT_COLS} FROM components WHERE id = ?1"), [id])
        .await?;
    match rows.next().await? {
        Some(row) => row_to_component(&row),
        None => Err(CoreError::not_found(EntityType::Component, id).into()),
    }
}

/// All components of a study, active or not, in position order.
pub(crate) async fn list_for_study(
    conn: &libsql::Connection,
    study_id: &str,
) -> Result<Vec<Component>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {SELECT_COLS} FROM components WHERE study_id = ?1 ORDER BY position"),
            [study_id],
        )
        .await?;

    let mut components = Vec::new();
    while let Some(row) = rows.next().await? {
        components.push(row_to_component(&row)?);
    }
    Ok(components)
}

async fn append_component(
    conn: &libsql::Connection,
    study_id: &str,
    title: &str,
    payload: &str,
    reloadable: bool,
) -> Result<Component, DatabaseError> {
    let study = find_study(conn, study_id).await?;
    ensure_unlocked(&study)?;

    let mut rows = conn
        .query(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM components WHERE study_id = ?1",
            [study_id],
        )
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    let position = get_u32(&row, 0)?;

    let now = Utc::now();
    let id = crate::generate_id(conn, PREFIX_COMPONENT).await?;
    conn.execute(
        &format!(
            "INSERT INTO components ({SELECT_COLS})
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8)"
        ),
        libsql::params![
            id.as_str(),
            study_id,
            i64::from(position),
            title,
            i64::from(reloadable),
            payload,
            timestamp(now),
            timestamp(now)
        ],
    )
    .await?;

    Ok(Component {
        id,
        study_id: study_id.to_string(),
        position,
        title: title.to_string(),
        active: true,
        reloadable,
        payload: payload.to_string(),
        created_at: now,
        updated_at: now,
    })
}

impl CohortService {
    /// Append a component at the end of the study.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown study and
    /// `CoreError::Forbidden` if the study is locked.
    pub async fn add_component(
        &self,
        study_id: &str,
        title: &str,
        payload: &str,
        reloadable: bool,
    ) -> Result<Component, DatabaseError> {
        let tx = self.db().begin_locked(LockScope::Study(study_id)).await?;
        let result = append_component(&tx, study_id, title, payload, reloadable).await;
        tx.finish(result).await
    }

    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown component.
    pub async fn get_component(&self, id: &str) -> Result<Component, DatabaseError> {
        find_component(&*self.db().shared().await?, id).await
    }

    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown study.
    pub async fn list_components(&self, study_id: &str) -> Result<Vec<Component>, DatabaseError> {
        let conn = self.db().shared().await?;
        find_study(&conn, study_id).await?;
        list_for_study(&conn, study_id).await
    }

    /// Apply a partial update to a component.
    ///
    /// Deactivating a component is how a study author takes it out of the
    /// sequence; runs currently on it finish it normally.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Forbidden` if the owning study is locked.
    pub async fn update_component(
        &self,
        id: &str,
        update: ComponentUpdate,
    ) -> Result<Component, DatabaseError> {
        let study_id = self.get_component(id).await?.study_id;
        let tx = self.db().begin_locked(LockScope::Study(&study_id)).await?;
        let result = apply_update(&tx, id, &update).await;
        tx.finish(result).await
    }
}

/// Check the owning study is unlocked and write the changed columns, on a
/// connection holding the study's lock.
async fn apply_update(
    conn: &libsql::Connection,
    id: &str,
    update: &ComponentUpdate,
) -> Result<Component, DatabaseError> {
    let current = find_component(conn, id).await?;
    ensure_unlocked(&find_study(conn, &current.study_id).await?)?;

    if update.is_empty() {
        return Ok(current);
    }

    let mut sets = Vec::new();
    let mut params: Vec<libsql::Value> = Vec::new();
    let mut idx = 1usize;

    if let Some(ref title) = update.title {
        sets.push(format!("title = ?{idx}"));
        params.push(title.clone().into());
        idx += 1;
    }
    if let Some(active) = update.active {
        sets.push(format!("active = ?{idx}"));
        params.push(i64::from(active).into());
        idx += 1;
    }
    if let Some(reloadable) = update.reloadable {
        sets.push(format!("reloadable = ?{idx}"));
        params.push(i64::from(reloadable).into());
        idx += 1;
    }
    if let Some(ref payload) = update.payload {
        sets.push(format!("payload = ?{idx}"));
        params.push(payload.clone().into());
        idx += 1;
    }

    sets.push(format!("updated_at = ?{idx}"));
    params.push(timestamp(Utc::now()).into());
    idx += 1;

    params.push(id.into());
    let sql = format!("UPDATE components SET {} WHERE id = ?{idx}", sets.join(", "));
    conn.execute(&sql, libsql::params_from_iter(params)).await?;

    tracing::debug!(component_id = id, changes = ?update, "component updated");
    find_component(conn, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::test_service;
    use crate::updates::component::ComponentUpdateBuilder;

    #[tokio::test]
    async fn components_append_in_order() {
        let svc = test_service().await;
        let study = svc.create_study("S", false).await.unwrap();
        for title in ["A", "B", "C"] {
            svc.add_component(&study.id, title, "{}", false).await.unwrap();
        }

        let components = svc.list_components(&study.id).await.unwrap();
        let positions: Vec<u32> = components.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(components[2].title, "C");
    }

    #[tokio::test]
    async fn update_component_changes_only_given_fields() {
        let svc = test_service().await;
        let study = svc.create_study("S", false).await.unwrap();
        let c = svc.add_component(&study.id, "A", "payload", false).await.unwrap();

        let updated = svc
            .update_component(&c.id, ComponentUpdateBuilder::new().active(false).build())
            .await
            .unwrap();
        assert!(!updated.active);
        assert_eq!(updated.title, "A");
        assert_eq!(updated.payload, "payload");
    }

    #[tokio::test]
    async fn locked_study_rejects_structural_edits() {
        let svc = test_service().await;
        let study = svc.create_study("S", false).await.unwrap();
        let c = svc.add_component(&study.id, "A", "", false).await.unwrap();
        svc.lock_study(&study.id).await.unwrap();

        let add = svc.add_component(&study.id, "B", "", false).await.unwrap_err();
        assert!(matches!(add.core(), Some(CoreError::Forbidden(_))));

        let edit = svc
            .update_component(&c.id, ComponentUpdateBuilder::new().title("A2").build())
            .await
            .unwrap_err();
        assert!(matches!(edit.core(), Some(CoreError::Forbidden(_))));
        assert_eq!(svc.list_components(&study.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_waits_for_the_study_lock_and_rechecks_it() {
        let svc = std::sync::Arc::new(test_service().await);
        let study = svc.create_study("S", false).await.unwrap();
        let c = svc.add_component(&study.id, "A", "", false).await.unwrap();

        let tx = svc.db().begin_locked(LockScope::Study(&study.id)).await.unwrap();
        let edit = {
            let svc = std::sync::Arc::clone(&svc);
            let id = c.id.clone();
            tokio::spawn(async move {
                svc.update_component(&id, ComponentUpdateBuilder::new().title("A2").build())
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!edit.is_finished());

        tx.execute(
            "UPDATE studies SET locked = 1 WHERE id = ?1",
            [study.id.as_str()],
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let err = edit.await.unwrap().unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::Forbidden(_))));
        assert_eq!(svc.get_component(&c.id).await.unwrap().title, "A");
    }
}
