use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::ComponentResultState;

/// One visit of a component within a run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ComponentResult {
    pub id: String,
    pub study_result_id: String,
    pub component_id: String,
    pub state: ComponentResultState,
    /// Submitted result payload, passed through untouched.
    pub data: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}
