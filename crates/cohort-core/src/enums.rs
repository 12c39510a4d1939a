//! Status enums, worker kinds, and entity types for Cohort.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`.
//! Status enums with state machines provide `allowed_next_states()` to enforce
//! valid transitions at the application layer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// WorkerKind
// ---------------------------------------------------------------------------

/// The variant of a participant identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    /// Internal worker used by study authors to try a study out.
    Preview,
    /// Link that may start exactly one run.
    OneTime,
    /// Personal link that may be reused once the previous run has ended.
    Personal,
    /// Worker recruited from a crowdsourcing platform.
    Platform,
}

impl WorkerKind {
    /// The duplicate-start policy that applies to this kind of worker.
    #[must_use]
    pub const fn run_policy(self) -> RunPolicy {
        match self {
            Self::Preview => RunPolicy::Restartable,
            Self::OneTime | Self::Platform => RunPolicy::SingleRun,
            Self::Personal => RunPolicy::Sequential,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::OneTime => "one_time",
            Self::Personal => "personal",
            Self::Platform => "platform",
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RunPolicy
// ---------------------------------------------------------------------------

/// What happens when a worker starts a run in a batch where it already has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunPolicy {
    /// Any earlier run in the batch forbids a new one.
    SingleRun,
    /// A new run may start once the earlier one is terminal.
    Sequential,
    /// A still-running earlier run is aborted and replaced.
    Restartable,
}

// ---------------------------------------------------------------------------
// StudyResultState
// ---------------------------------------------------------------------------

/// State of a worker's run through a study.
///
/// ```text
/// started → data_retrieved → finished
///         ↘                ↘ fail
///           finished/fail/aborted  aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StudyResultState {
    Started,
    DataRetrieved,
    Finished,
    Fail,
    Aborted,
}

impl StudyResultState {
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Started => &[Self::DataRetrieved, Self::Finished, Self::Fail, Self::Aborted],
            Self::DataRetrieved => &[Self::Finished, Self::Fail, Self::Aborted],
            Self::Finished | Self::Fail | Self::Aborted => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Terminal states never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Fail | Self::Aborted)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::DataRetrieved => "data_retrieved",
            Self::Finished => "finished",
            Self::Fail => "fail",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for StudyResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ComponentResultState
// ---------------------------------------------------------------------------

/// State of a single component visit.
///
/// ```text
/// started → data_retrieved → result_data_posted ⟲ → finished
///                                                  → fail
///                                                  → aborted
/// ```
///
/// Results may be posted before the data was retrieved, and posting again
/// replaces the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComponentResultState {
    Started,
    DataRetrieved,
    ResultDataPosted,
    Finished,
    Fail,
    Aborted,
}

impl ComponentResultState {
    /// States in which a component result is still the run's open visit.
    pub const OPEN: &'static [Self] = &[Self::Started, Self::DataRetrieved, Self::ResultDataPosted];

    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Started => &[
                Self::DataRetrieved,
                Self::ResultDataPosted,
                Self::Finished,
                Self::Fail,
                Self::Aborted,
            ],
            Self::DataRetrieved | Self::ResultDataPosted => &[
                Self::ResultDataPosted,
                Self::Finished,
                Self::Fail,
                Self::Aborted,
            ],
            Self::Finished | Self::Fail | Self::Aborted => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Fail | Self::Aborted)
    }

    /// Whether the component's data has been handed out during this visit.
    ///
    /// This is the persisted marker the reload policy is decided on.
    #[must_use]
    pub const fn data_was_retrieved(self) -> bool {
        !matches!(self, Self::Started)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::DataRetrieved => "data_retrieved",
            Self::ResultDataPosted => "result_data_posted",
            Self::Finished => "finished",
            Self::Fail => "fail",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ComponentResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// GroupState
// ---------------------------------------------------------------------------

/// State of a group result.
///
/// ```text
/// started → finished
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    Started,
    Finished,
}

impl GroupState {
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Started => &[Self::Finished],
            Self::Finished => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Every persisted entity, used in error messages and lock scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Study,
    Component,
    Batch,
    Worker,
    GroupResult,
    StudyResult,
    ComponentResult,
}

impl EntityType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Study => "study",
            Self::Component => "component",
            Self::Batch => "batch",
            Self::Worker => "worker",
            Self::GroupResult => "group_result",
            Self::StudyResult => "study_result",
            Self::ComponentResult => "component_result",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
