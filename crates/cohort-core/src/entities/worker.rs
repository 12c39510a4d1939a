use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::WorkerKind;

/// A participant identity. Stable across a run; may run many batches.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Worker {
    pub id: String,
    pub kind: WorkerKind,
    /// Secret the worker presents to be resolved.
    pub token: String,
    /// Free-form label, e.g. the name a personal link was issued to.
    pub label: Option<String>,
    /// Identity on the recruiting platform, for platform workers.
    pub platform_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
