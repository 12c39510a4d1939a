//! Entity structs for all Cohort domain objects.
//!
//! Each entity maps to a table in the libSQL database. All structs derive
//! `Serialize`, `Deserialize`, and `JsonSchema` for JSON roundtrip and schema
//! validation.

mod batch;
mod component;
mod component_result;
mod group_result;
mod study;
mod study_result;
mod worker;

pub use batch::Batch;
pub use component::Component;
pub use component_result::ComponentResult;
pub use group_result::GroupResult;
pub use study::Study;
pub use study_result::StudyResult;
pub use worker::Worker;
