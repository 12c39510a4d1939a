use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::GroupState;

/// A capacity-bounded cohort of workers running a group study together.
///
/// Member counts are denormalized bookkeeping: joining increments
/// `active_member_count`, leaving moves one member from active to history.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct GroupResult {
    pub id: String,
    pub batch_id: String,
    pub state: GroupState,
    pub active_member_count: u32,
    pub history_member_count: u32,
    /// Shared scratch data of the group, opaque to the core.
    pub session_data: Option<String>,
    /// Bumped on every session data write.
    pub session_version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl GroupResult {
    /// Members that ever joined, active or not.
    #[must_use]
    pub const fn total_member_count(&self) -> u32 {
        self.active_member_count.saturating_add(self.history_member_count)
    }
}
