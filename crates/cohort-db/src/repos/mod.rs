//! Repository modules implementing persistence for all Cohort entities.
//!
//! Each module exposes connection-level functions (usable inside a
//! `LockedTransaction`) and adds public methods to `CohortService` via
//! `impl CohortService` blocks.

pub mod batch;
pub mod component;
pub mod component_result;
pub mod group;
pub mod study;
pub mod study_result;
pub mod worker;
