use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An ordered sequence of components that workers run through.
///
/// A locked study rejects structural edits; runs already in flight may still finish.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Study {
    pub id: String,
    pub title: String,
    /// Whether runs are bound to a synchronized multi-participant group.
    pub group_study: bool,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
