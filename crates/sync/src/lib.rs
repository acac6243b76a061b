//! Invoice synchronization engine.
//!
//! One full sync per tenant runs two idempotent phases: ingestion (open
//! cases for newly due invoices) and reconciliation (update and close
//! open cases against fresh provider state). Each run writes one audit
//! row regardless of how much either phase accomplished.

pub mod caseops;
pub mod engine;
pub mod error;

mod ingest;
mod reconcile;

pub use caseops::{mark_invoice_paid, reopen_case, ReopenOutcome};
pub use engine::{run_full_sync, run_full_sync_with, SyncOutcome};
pub use error::SyncError;
