//! Cross-cutting error types for Cohort.
//!
//! `CoreError` is the typed contract between the run core and its callers.
//! Store failures are defined in `cohort-db` as `DatabaseError`, which wraps
//! this type.

use thiserror::Error;

use crate::enums::EntityType;

/// Errors that can be raised by any Cohort crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity lookup returned no result.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: EntityType, id: String },

    /// A policy forbids the requested operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The worker already has a run in this batch that has not ended.
    #[error("Worker {worker_id} already has a running study result in batch {batch_id}")]
    AlreadyRunning { worker_id: String, batch_id: String },

    /// The study has no active component to start with.
    #[error("Study {study_id} has no active components")]
    NoComponents { study_id: String },

    /// A non-reloadable component's data was requested a second time.
    #[error("Component {component_id} is not reloadable")]
    ReloadRejected { component_id: String },

    /// The component is not the one the run is currently at.
    #[error("Component {component_id} does not belong to the current position of run {study_result_id}")]
    NotBelongingToRun {
        component_id: String,
        study_result_id: String,
    },

    /// The run or component visit already reached a terminal state.
    #[error("{entity_type} {id} is already finished")]
    AlreadyFinished { entity_type: EntityType, id: String },

    /// No group could be bound within the batch's capacity limits.
    #[error("Group allocation failed for batch {batch_id} after {attempts} attempts")]
    AllocationFailed { batch_id: String, attempts: u32 },

    /// A state machine transition was attempted that is not allowed.
    #[error("Invalid state transition: {entity_type} {id} from {from} to {to}")]
    InvalidTransition {
        entity_type: EntityType,
        id: String,
        from: String,
        to: String,
    },

    /// An optimistic write lost against a concurrent writer.
    #[error("Version conflict on {entity_type} {id}: expected {expected}, found {found}")]
    VersionConflict {
        entity_type: EntityType,
        id: String,
        expected: u64,
        found: u64,
    },

    /// Data failed validation (format, constraints).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`].
    pub fn not_found(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Shorthand for [`CoreError::AlreadyFinished`].
    pub fn already_finished(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self::AlreadyFinished {
            entity_type,
            id: id.into(),
        }
    }
}
