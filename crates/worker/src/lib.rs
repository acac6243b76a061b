//! Scheduled per-tenant job runner.
//!
//! The dispatcher rebuilds a job map from the schedule table on a
//! refresh interval and runs each tenant's sync and mail engines at
//! their configured UTC wall-clock times. Engines are idempotent, so an
//! extra trigger never produces duplicate cases or duplicate sends.

pub mod config;
pub mod dispatcher;
pub mod schedule;

pub use config::WorkerConfig;
pub use dispatcher::Dispatcher;
pub use schedule::next_occurrence;
