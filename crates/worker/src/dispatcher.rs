//! Per-tenant job dispatcher.
//!
//! [`Dispatcher`] owns one [`TenantJob`] per active tenant, rebuilt from
//! the schedule table on a refresh interval: new tenants get tasks
//! spawned, removed or deactivated tenants get theirs cancelled, and a
//! changed schedule cancels and respawns. Each tenant runs in its own
//! tasks, so one tenant's failure never touches another's.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use dunlin_core::tenant::{TenantContext, TenantError, TenantId};
use dunlin_db::models::schedule::TenantSchedule;
use dunlin_db::repositories::{ScheduleRepo, TenantRepo};
use dunlin_notify::{run_staging, SmtpMailer, StageTemplates, StagingError, StagingSummary};
use dunlin_sync::{run_full_sync, SyncError, SyncOutcome};

use crate::schedule::next_occurrence;

/// How long shutdown waits for each tenant task to exit cleanly.
const SHUTDOWN_TASK_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from a dispatcher refresh cycle.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Bookkeeping for one tenant's scheduled tasks.
struct TenantJob {
    /// Schedule snapshot the tasks were spawned from.
    schedule: TenantSchedule,
    /// Per-tenant cancellation token (child of the root token).
    cancel: CancellationToken,
    sync_task: Option<tokio::task::JoinHandle<()>>,
    mail_task: Option<tokio::task::JoinHandle<()>>,
}

/// Long-lived scheduler for all tenants' sync and mail runs.
pub struct Dispatcher {
    pool: PgPool,
    refresh_interval: Duration,
}

impl Dispatcher {
    pub fn new(pool: PgPool, refresh_interval: Duration) -> Self {
        Self {
            pool,
            refresh_interval,
        }
    }

    /// Run the dispatcher until the root cancellation token triggers.
    ///
    /// The first refresh happens immediately; afterwards the job map is
    /// rebuilt every `refresh_interval`, which is when schedule changes
    /// take effect.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut jobs: HashMap<TenantId, TenantJob> = HashMap::new();
        let mut ticker = tokio::time::interval(self.refresh_interval);
        tracing::info!(
            refresh_interval_secs = self.refresh_interval.as_secs(),
            "Dispatcher started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh(&mut jobs, &cancel).await {
                        tracing::error!(error = %e, "Schedule refresh failed");
                    }
                }
            }
        }

        shutdown(jobs).await;
    }

    /// Run a tenant's full sync immediately, outside its schedule.
    pub async fn trigger_sync_now(&self, tenant: TenantId) -> Result<SyncOutcome, SyncError> {
        let ctx = TenantContext::for_tenant(tenant);
        run_full_sync(&self.pool, &ctx).await
    }

    /// Run a tenant's staging immediately, outside its schedule.
    pub async fn trigger_mail_now(&self, tenant: TenantId) -> Result<StagingSummary, StagingError> {
        mail_run(&self.pool, tenant).await
    }

    /// Diff the current job map against the schedule table.
    async fn refresh(
        &self,
        jobs: &mut HashMap<TenantId, TenantJob>,
        root: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let mut ctx = TenantContext::new();
        let guard = ctx.enter_sudo();
        let sudo = guard.sudo_token()?;
        let schedules = ScheduleRepo::list_for_active_tenants(&self.pool, &sudo).await?;
        drop(guard);

        let mut fresh: HashMap<TenantId, TenantSchedule> = schedules
            .into_iter()
            .map(|s| (TenantId::new(s.tenant_id), s))
            .collect();

        // Cancel jobs whose tenant disappeared or whose schedule changed.
        let stale: Vec<TenantId> = jobs
            .iter()
            .filter(|(tenant, job)| match fresh.get(tenant) {
                Some(schedule) => schedule.updated_at != job.schedule.updated_at,
                None => true,
            })
            .map(|(tenant, _)| *tenant)
            .collect();
        for tenant in stale {
            if let Some(job) = jobs.remove(&tenant) {
                tracing::info!(tenant_id = tenant.as_i64(), "Cancelling tenant jobs");
                job.cancel.cancel();
            }
        }

        // Spawn jobs for tenants not yet running.
        fresh.retain(|tenant, _| !jobs.contains_key(tenant));
        for (tenant, schedule) in fresh {
            tracing::info!(
                tenant_id = tenant.as_i64(),
                sync_enabled = schedule.sync_enabled,
                mail_enabled = schedule.mail_enabled,
                "Spawning tenant jobs"
            );
            jobs.insert(tenant, self.spawn(tenant, schedule, root));
        }

        Ok(())
    }

    fn spawn(
        &self,
        tenant: TenantId,
        schedule: TenantSchedule,
        root: &CancellationToken,
    ) -> TenantJob {
        let cancel = root.child_token();

        let sync_task = schedule.sync_enabled.then(|| {
            let pool = self.pool.clone();
            let cancel = cancel.clone();
            let (hour, minute) = (schedule.sync_hour as u32, schedule.sync_minute as u32);
            tokio::spawn(async move { sync_job(pool, tenant, hour, minute, cancel).await })
        });

        let mail_task = schedule.mail_enabled.then(|| {
            let pool = self.pool.clone();
            let cancel = cancel.clone();
            let (hour, minute) = (schedule.mail_hour as u32, schedule.mail_minute as u32);
            tokio::spawn(async move { mail_job(pool, tenant, hour, minute, cancel).await })
        });

        TenantJob {
            schedule,
            cancel,
            sync_task,
            mail_task,
        }
    }
}

/// Cancel every tenant job and wait briefly for clean exits.
async fn shutdown(jobs: HashMap<TenantId, TenantJob>) {
    for (tenant, job) in jobs {
        job.cancel.cancel();
        for task in [job.sync_task, job.mail_task].into_iter().flatten() {
            if tokio::time::timeout(SHUTDOWN_TASK_TIMEOUT, task).await.is_err() {
                tracing::warn!(
                    tenant_id = tenant.as_i64(),
                    "Tenant task did not stop within the shutdown timeout"
                );
            }
        }
    }
    tracing::info!("Dispatcher shut down complete");
}

/// Sleep until the next HH:MM occurrence, run the sync engine, repeat.
async fn sync_job(pool: PgPool, tenant: TenantId, hour: u32, minute: u32, cancel: CancellationToken) {
    loop {
        if !sleep_until_occurrence(hour, minute, &cancel).await {
            return;
        }
        // A fresh context per run: a reused task never carries a stale
        // scope.
        let ctx = TenantContext::for_tenant(tenant);
        match run_full_sync(&pool, &ctx).await {
            Ok(outcome) => tracing::info!(
                tenant_id = tenant.as_i64(),
                processed = outcome.processed,
                new_cases = outcome.new_cases,
                "Scheduled sync finished"
            ),
            Err(e) => tracing::error!(
                tenant_id = tenant.as_i64(),
                error = %e,
                "Scheduled sync failed"
            ),
        }
    }
}

/// Sleep until the next HH:MM occurrence, run staging, repeat.
async fn mail_job(pool: PgPool, tenant: TenantId, hour: u32, minute: u32, cancel: CancellationToken) {
    loop {
        if !sleep_until_occurrence(hour, minute, &cancel).await {
            return;
        }
        match mail_run(&pool, tenant).await {
            Ok(summary) => tracing::info!(
                tenant_id = tenant.as_i64(),
                sent = summary.sent,
                closed = summary.closed,
                "Scheduled mail run finished"
            ),
            Err(StagingError::SmtpNotConfigured(_)) => tracing::warn!(
                tenant_id = tenant.as_i64(),
                "Mail run skipped, SMTP not configured"
            ),
            Err(e) => tracing::error!(
                tenant_id = tenant.as_i64(),
                error = %e,
                "Scheduled mail run failed"
            ),
        }
    }
}

/// One staging run with the tenant's own SMTP relay.
async fn mail_run(pool: &PgPool, tenant: TenantId) -> Result<StagingSummary, StagingError> {
    let row = TenantRepo::find(pool, tenant)
        .await?
        .ok_or(StagingError::TenantNotFound(tenant))?;
    let mailer =
        SmtpMailer::for_tenant(&row).ok_or(StagingError::SmtpNotConfigured(tenant))?;
    let ctx = TenantContext::for_tenant(tenant);
    run_staging(pool, &ctx, &StageTemplates, &mailer).await
}

/// Wait for the next occurrence of HH:MM UTC; `false` means cancelled.
async fn sleep_until_occurrence(hour: u32, minute: u32, cancel: &CancellationToken) -> bool {
    let now = Utc::now();
    let next = next_occurrence(now, hour, minute);
    let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
    tracing::debug!(next = %next, "Job sleeping until next occurrence");
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(wait) => true,
    }
}
