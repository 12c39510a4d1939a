use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::StudyResultState;

/// One worker's run through a study under a batch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct StudyResult {
    pub id: String,
    pub study_id: String,
    pub batch_id: String,
    pub worker_id: String,
    pub group_id: Option<String>,
    pub state: StudyResultState,
    /// Issued when the run finishes successfully.
    pub confirmation_code: Option<String>,
    /// Reason given when the run failed or was abandoned.
    pub message: Option<String>,
    /// Per-run scratch data, opaque to the core.
    pub session_data: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_seen_at: DateTime<Utc>,
}
