//! Group allocator.
//!
//! Binds a run of a group study to a group of its batch. All candidate reads
//! and the counter update happen inside one locked transaction, so two
//! concurrent allocations for the same batch are serialized and both see each
//! other's increments. The guarded UPDATE in `repos::group::try_join` is the
//! second line: if the chosen row has no room left when it is written, the
//! allocator re-reads the candidates once and then gives up.

use cohort_core::entities::{Batch, GroupResult};
use cohort_core::errors::CoreError;

use crate::error::DatabaseError;
use crate::lock::LockScope;
use crate::repos::group::{candidate_groups, insert_group, release_member, try_join};
use crate::retry::{ALLOCATION_ATTEMPTS, is_transient, retry_on_contention};
use crate::service::CohortService;

/// The group a member was bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub group: GroupResult,
    /// `true` if no existing group had room and a new one was created.
    pub created: bool,
}

/// Whether the allocator may open a new group when none has room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnFull {
    CreateGroup,
    Fail,
}

/// Bind one member to a group of `batch` on an already locked connection.
///
/// `exclude` keeps a specific group out of the candidates (reassignment).
pub(crate) async fn allocate_in(
    conn: &libsql::Connection,
    batch: &Batch,
    exclude: Option<&str>,
    on_full: OnFull,
) -> Result<Allocation, DatabaseError> {
    let capacity = batch.capacity();

    for attempt in 1..=ALLOCATION_ATTEMPTS {
        let candidates = candidate_groups(conn, &batch.id, capacity, exclude).await?;
        let Some(chosen) = capacity.choose(&candidates) else {
            if on_full == OnFull::Fail {
                break;
            }
            let group = insert_group(conn, &batch.id).await?;
            tracing::info!(batch_id = %batch.id, group_id = %group.id, "opened new group");
            return Ok(Allocation {
                group,
                created: true,
            });
        };

        if try_join(conn, &chosen.id, capacity).await? {
            let mut group = chosen.clone();
            group.active_member_count += 1;
            tracing::debug!(
                batch_id = %batch.id,
                group_id = %group.id,
                active = group.active_member_count,
                "joined existing group"
            );
            return Ok(Allocation {
                group,
                created: false,
            });
        }
        tracing::warn!(batch_id = %batch.id, group_id = %chosen.id, attempt, "group filled up before join");
    }

    Err(CoreError::AllocationFailed {
        batch_id: batch.id.clone(),
        attempts: ALLOCATION_ATTEMPTS,
    }
    .into())
}

/// Turn exhausted lock retries into an allocation failure.
pub(crate) fn contention_to_allocation_failure(batch_id: &str, err: DatabaseError) -> DatabaseError {
    if is_transient(&err) {
        tracing::warn!(batch_id, error = %err, "allocation gave up on lock contention");
        return CoreError::AllocationFailed {
            batch_id: batch_id.to_string(),
            attempts: ALLOCATION_ATTEMPTS,
        }
        .into();
    }
    err
}

impl CohortService {
    /// Bind one new member to a group of the batch, creating a group if none
    /// has room.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AllocationFailed` if the store stayed locked
    /// through the retry budget.
    pub async fn allocate(&self, batch_id: &str) -> Result<Allocation, DatabaseError> {
        let batch = self.get_batch(batch_id).await?;
        retry_on_contention(ALLOCATION_ATTEMPTS, "allocate", || self.allocate_once(&batch))
            .await
            .map_err(|e| contention_to_allocation_failure(batch_id, e))
    }

    async fn allocate_once(&self, batch: &Batch) -> Result<Allocation, DatabaseError> {
        let tx = self.db().begin_locked(LockScope::BatchGroups(&batch.id)).await?;
        let result = allocate_in(&tx, batch, None, OnFull::CreateGroup).await;
        tx.finish(result).await
    }

    /// Move one member of the group from active to history.
    ///
    /// Runs release their group themselves when they end; this is for
    /// members bound with [`Self::allocate`].
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidState` if the group has no active member.
    pub async fn release(&self, group_id: &str) -> Result<GroupResult, DatabaseError> {
        let tx = self.db().begin_locked(LockScope::Group(group_id)).await?;
        let result = release_member(&tx, group_id).await;
        tx.finish(result).await
    }
}
