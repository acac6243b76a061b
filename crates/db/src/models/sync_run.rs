//! Sync audit record model.

use serde::Serialize;
use sqlx::FromRow;

use dunlin_core::types::{DbId, Timestamp};

/// A row from the `sync_runs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncRun {
    pub id: DbId,
    pub tenant_id: DbId,
    pub seq: i64,
    pub sync_type: String,

    pub processed: i32,
    pub new_cases: i32,
    pub active_after: i32,
    pub closed_cases: i32,
    pub api_calls: i32,
    pub duration_ms: i64,

    pub ingest_processed: i32,
    pub ingest_duration_ms: i64,
    pub reconcile_processed: i32,
    pub reconcile_duration_ms: i64,

    pub started_at: Timestamp,
}

/// DTO for recording one completed run.
#[derive(Debug, Clone, Default)]
pub struct NewSyncRun {
    pub processed: i32,
    pub new_cases: i32,
    pub active_after: i32,
    pub closed_cases: i32,
    pub api_calls: i32,
    pub duration_ms: i64,
    pub ingest_processed: i32,
    pub ingest_duration_ms: i64,
    pub reconcile_processed: i32,
    pub reconcile_duration_ms: i64,
}
