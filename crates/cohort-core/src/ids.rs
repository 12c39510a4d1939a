//! ID prefix constants.
//!
//! IDs are generated by the database as `{prefix}-{8 hex chars}`, e.g. `srs-a3f8b2c1`.

pub const PREFIX_STUDY: &str = "stu";
pub const PREFIX_COMPONENT: &str = "cmp";
pub const PREFIX_BATCH: &str = "bat";
pub const PREFIX_WORKER: &str = "wrk";
pub const PREFIX_GROUP_RESULT: &str = "grp";
pub const PREFIX_STUDY_RESULT: &str = "srs";
pub const PREFIX_COMPONENT_RESULT: &str = "crs";

/// Every prefix in use, for exhaustive tests.
pub const ALL_PREFIXES: &[&str] = &[
    PREFIX_STUDY,
    PREFIX_COMPONENT,
    PREFIX_BATCH,
    PREFIX_WORKER,
    PREFIX_GROUP_RESULT,
    PREFIX_STUDY_RESULT,
    PREFIX_COMPONENT_RESULT,
];
