//! Domain model for the agenda core.
//!
//! # Responsibility
//! - Define canonical task structures used by store, matcher and front-ends.
//!
//! # Invariants
//! - Every task is identified by a store-assigned `TaskId`.
//! - Deletion is a hard delete; completion is a flag.

pub mod task;
