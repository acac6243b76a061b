//! Domain types for the dunning platform.
//!
//! This crate has zero internal dependencies so that every other crate
//! (db, provider, sync, notify, worker) can share the same vocabulary:
//! tenant scoping, escalation stages, case/invoice statuses, and
//! minor-unit money arithmetic.

pub mod money;
pub mod stage;
pub mod status;
pub mod tenant;
pub mod types;
