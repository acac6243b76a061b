//! Repository for the `sync_runs` audit table.

use sqlx::PgPool;

use dunlin_core::tenant::TenantId;

use crate::models::sync_run::{NewSyncRun, SyncRun};

/// Column list for `sync_runs` queries.
const COLUMNS: &str = "id, tenant_id, seq, sync_type, processed, new_cases, active_after, \
     closed_cases, api_calls, duration_ms, ingest_processed, ingest_duration_ms, \
     reconcile_processed, reconcile_duration_ms, started_at";

/// Provides append and lookup operations for the sync audit trail.
pub struct SyncRunRepo;

impl SyncRunRepo {
    /// Record one completed run with the next per-tenant sequence number.
    ///
    /// The sequence is assigned inside the INSERT so concurrent runs of
    /// the same tenant contend on the unique constraint rather than
    /// silently sharing a number.
    pub async fn record(
        pool: &PgPool,
        tenant: TenantId,
        run: &NewSyncRun,
    ) -> Result<SyncRun, sqlx::Error> {
        let query = format!(
            "INSERT INTO sync_runs \
                 (tenant_id, seq, sync_type, processed, new_cases, active_after, closed_cases, \
                  api_calls, duration_ms, ingest_processed, ingest_duration_ms, \
                  reconcile_processed, reconcile_duration_ms) \
             SELECT $1, COALESCE(MAX(seq), 0) + 1, 'full', $2, $3, $4, $5, $6, $7, $8, $9, $10, $11 \
             FROM sync_runs WHERE tenant_id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SyncRun>(&query)
            .bind(tenant.as_i64())
            .bind(run.processed)
            .bind(run.new_cases)
            .bind(run.active_after)
            .bind(run.closed_cases)
            .bind(run.api_calls)
            .bind(run.duration_ms)
            .bind(run.ingest_processed)
            .bind(run.ingest_duration_ms)
            .bind(run.reconcile_processed)
            .bind(run.reconcile_duration_ms)
            .fetch_one(pool)
            .await
    }

    /// Most recent runs for a tenant, newest first.
    pub async fn list_recent(
        pool: &PgPool,
        tenant: TenantId,
        limit: i64,
    ) -> Result<Vec<SyncRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sync_runs \
             WHERE tenant_id = $1 \
             ORDER BY seq DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, SyncRun>(&query)
            .bind(tenant.as_i64())
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// The latest run for a tenant, if any.
    pub async fn latest(pool: &PgPool, tenant: TenantId) -> Result<Option<SyncRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sync_runs \
             WHERE tenant_id = $1 \
             ORDER BY seq DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, SyncRun>(&query)
            .bind(tenant.as_i64())
            .fetch_optional(pool)
            .await
    }
}
