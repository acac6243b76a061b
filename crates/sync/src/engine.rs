//! Full-sync orchestration and audit.

use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;

use dunlin_core::tenant::TenantContext;
use dunlin_core::tenant::TenantId;
use dunlin_db::models::sync_run::NewSyncRun;
use dunlin_db::repositories::{CaseRepo, ScheduleRepo, SyncRunRepo, TenantRepo};
use dunlin_provider::{build_provider, InvoiceProvider};

use crate::error::SyncError;
use crate::{ingest, reconcile};

/// Page size for provider listings in both phases.
pub(crate) const PAGE_SIZE: u32 = 100;

/// Aggregated result of one full sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
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

impl SyncOutcome {
    fn to_new_run(&self) -> NewSyncRun {
        NewSyncRun {
            processed: self.processed,
            new_cases: self.new_cases,
            active_after: self.active_after,
            closed_cases: self.closed_cases,
            api_calls: self.api_calls,
            duration_ms: self.duration_ms,
            ingest_processed: self.ingest_processed,
            ingest_duration_ms: self.ingest_duration_ms,
            reconcile_processed: self.reconcile_processed,
            reconcile_duration_ms: self.reconcile_duration_ms,
        }
    }
}

/// Run a full sync for the context's tenant, building the adapter from
/// the tenant's provider binding.
///
/// Fail-closed: an unset context or the sudo scope is an error, never an
/// unscoped run.
pub async fn run_full_sync(pool: &PgPool, ctx: &TenantContext) -> Result<SyncOutcome, SyncError> {
    let tenant = ctx.require_tenant()?;
    let row = TenantRepo::find(pool, tenant)
        .await?
        .ok_or(SyncError::TenantNotFound(tenant))?;
    if !row.is_active {
        return Err(SyncError::TenantInactive(tenant));
    }
    let provider = build_provider(row.provider_type.as_deref(), row.provider_credentials.as_ref())?;
    run_full_sync_with(pool, tenant, provider.as_ref()).await
}

/// Run a full sync with an injected provider adapter.
///
/// Phase A (ingestion) always runs before phase B (reconciliation): new
/// cases must exist before they can be reconciled. Each phase absorbs its
/// own per-record failures, and exactly one audit row is written with
/// whatever both phases accomplished.
pub async fn run_full_sync_with(
    pool: &PgPool,
    tenant: TenantId,
    provider: &dyn InvoiceProvider,
) -> Result<SyncOutcome, SyncError> {
    let run_started = Instant::now();
    let today = Utc::now().date_naive();

    let schedule = ScheduleRepo::get_or_create(pool, tenant).await?;

    tracing::info!(
        tenant_id = tenant.as_i64(),
        provider = provider.name(),
        lead_days = schedule.lead_days,
        "Full sync started"
    );

    let ingested = ingest::run(pool, tenant, provider, today, schedule.lead_days).await;
    let reconciled = reconcile::run(pool, tenant, provider, today).await;

    let active_after = CaseRepo::count_active(pool, tenant).await? as i32;

    let outcome = SyncOutcome {
        processed: ingested.processed + reconciled.processed,
        new_cases: ingested.new_cases,
        active_after,
        closed_cases: reconciled.closed,
        api_calls: ingested.api_calls + reconciled.api_calls,
        duration_ms: run_started.elapsed().as_millis() as i64,
        ingest_processed: ingested.processed,
        ingest_duration_ms: ingested.duration_ms,
        reconcile_processed: reconciled.processed,
        reconcile_duration_ms: reconciled.duration_ms,
    };

    let run = SyncRunRepo::record(pool, tenant, &outcome.to_new_run()).await?;

    tracing::info!(
        tenant_id = tenant.as_i64(),
        seq = run.seq,
        processed = outcome.processed,
        new_cases = outcome.new_cases,
        closed_cases = outcome.closed_cases,
        active_after = outcome.active_after,
        api_calls = outcome.api_calls,
        duration_ms = outcome.duration_ms,
        "Full sync finished"
    );

    Ok(outcome)
}
