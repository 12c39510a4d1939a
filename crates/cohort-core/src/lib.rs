//! # cohort-core
//!
//! Core types, run sequencing, and error types for Cohort.
//!
//! This crate provides the foundational types shared across all Cohort crates:
//! - Entity structs for studies, components, batches, workers, and results
//! - Status enums with state machine transitions
//! - Worker variants and their run policies
//! - The pure `ComponentSequencer` deciding what a run visits next
//! - Group capacity checks and the packing rank used by the allocator
//! - ID prefix constants
//! - Cross-cutting error types
//! - Handle and response types returned to the controller layer

pub mod capacity;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod ids;
pub mod responses;
pub mod sequencer;
