use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::capacity::Capacity;
use crate::enums::WorkerKind;

/// A named run configuration of a study.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Batch {
    pub id: String,
    pub study_id: String,
    pub title: String,
    pub active: bool,
    /// `None` = unlimited.
    pub max_active_members: Option<u32>,
    /// `None` = unlimited.
    pub max_total_members: Option<u32>,
    pub allowed_worker_kinds: Vec<WorkerKind>,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    /// Group capacity limits configured on this batch.
    #[must_use]
    pub const fn capacity(&self) -> Capacity {
        Capacity {
            max_active: self.max_active_members,
            max_total: self.max_total_members,
        }
    }

    /// Whether workers of `kind` may start runs in this batch.
    ///
    /// Preview workers are always admitted, even into an inactive batch.
    #[must_use]
    pub fn admits(&self, kind: WorkerKind) -> bool {
        kind == WorkerKind::Preview || (self.active && self.allowed_worker_kinds.contains(&kind))
    }
}
