//! Handles and responses the run core returns to the controller layer.
//!
//! All of these serialize to JSON; the `cohort` binary prints them as-is.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::{Component, ComponentResult, GroupResult, StudyResult};

/// Lightweight reference to a component a run is sent to.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ComponentRef {
    pub component_id: String,
    pub component_result_id: String,
    pub position: u32,
    pub title: String,
}

impl ComponentRef {
    #[must_use]
    pub fn new(component: &Component, component_result_id: impl Into<String>) -> Self {
        Self {
            component_id: component.id.clone(),
            component_result_id: component_result_id.into(),
            position: component.position,
            title: component.title.clone(),
        }
    }
}

/// Returned by `start_run`: everything a controller needs to address the run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RunHandle {
    pub study_result_id: String,
    pub study_id: String,
    pub batch_id: String,
    pub worker_id: String,
    pub group_id: Option<String>,
    pub first_component: ComponentRef,
}

/// Public view of a component handed to a worker.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ComponentData {
    pub component_id: String,
    pub component_result_id: String,
    pub title: String,
    pub payload: String,
}

/// Where a run goes after its current component.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum NextStep {
    /// A new component visit was opened.
    Component(ComponentRef),
    /// The run finished; the code confirms completion to the worker.
    Finished { confirmation_code: String },
}

/// What the next step will be, without taking it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Upcoming {
    Component { component_id: String, title: String },
    EndOfStudy,
}

/// Returned by `submit_result`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub component_result: ComponentResult,
    pub upcoming: Upcoming,
}

/// A run with all of its component visits, in visit order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RunView {
    pub study_result: StudyResult,
    pub component_results: Vec<ComponentResult>,
}

/// Shared session data of a group together with the version to write against.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct GroupSession {
    pub group_id: String,
    pub version: u64,
    pub data: Option<String>,
}

impl From<&GroupResult> for GroupSession {
    fn from(group: &GroupResult) -> Self {
        Self {
            group_id: group.id.clone(),
            version: group.session_version,
            data: group.session_data.clone(),
        }
    }
}

/// Manual navigation target, available to preview workers only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Navigation {
    Previous,
    /// Zero-based index among the study's active components.
    Index(usize),
}
