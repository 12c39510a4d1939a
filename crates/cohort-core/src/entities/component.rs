use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single step of a study.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Component {
    pub id: String,
    pub study_id: String,
    /// Persisted order key, unique within the study.
    pub position: u32,
    pub title: String,
    /// Inactive components are skipped by the sequencer.
    pub active: bool,
    /// Whether the component's data may be fetched more than once per visit.
    pub reloadable: bool,
    /// Public view handed to the worker, opaque to the core.
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
