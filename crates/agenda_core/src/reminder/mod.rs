//! Reminder matching and the background poll loop.
//!
//! # Responsibility
//! - Select due tasks for a local minute (`matcher`).
//! - Drive matching once per minute and dispatch notifications (`poll`).

pub mod matcher;
pub mod poll;
