//! Repository for the `tenant_schedules` table.

use sqlx::PgPool;

use dunlin_core::tenant::{Sudo, TenantId};

use crate::models::schedule::{ScheduleChanges, ScheduleError, TenantSchedule};

/// Column list for `tenant_schedules` queries.
const COLUMNS: &str = "id, tenant_id, sync_hour, sync_minute, sync_enabled, \
     mail_hour, mail_minute, mail_enabled, lead_days, auto_close_final_stage, updated_at";

/// Errors from schedule updates.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleRepoError {
    #[error(transparent)]
    Validation(#[from] ScheduleError),

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Provides access to per-tenant run schedules.
pub struct ScheduleRepo;

impl ScheduleRepo {
    /// Fetch a tenant's schedule, creating the default row if missing.
    ///
    /// The read path self-heals so callers never observe an absent
    /// schedule. ON CONFLICT absorbs a concurrent first read.
    pub async fn get_or_create(
        pool: &PgPool,
        tenant: TenantId,
    ) -> Result<TenantSchedule, sqlx::Error> {
        sqlx::query(
            "INSERT INTO tenant_schedules (tenant_id) VALUES ($1) \
             ON CONFLICT ON CONSTRAINT uq_tenant_schedules_tenant DO NOTHING",
        )
        .bind(tenant.as_i64())
        .execute(pool)
        .await?;

        let query = format!("SELECT {COLUMNS} FROM tenant_schedules WHERE tenant_id = $1");
        sqlx::query_as::<_, TenantSchedule>(&query)
            .bind(tenant.as_i64())
            .fetch_one(pool)
            .await
    }

    /// Apply a validated patch to a tenant's schedule.
    pub async fn update(
        pool: &PgPool,
        tenant: TenantId,
        changes: &ScheduleChanges,
    ) -> Result<TenantSchedule, ScheduleRepoError> {
        changes.validate()?;

        // Make sure the row exists before patching it.
        Self::get_or_create(pool, tenant).await?;

        let query = format!(
            "UPDATE tenant_schedules SET \
                 sync_hour = COALESCE($2, sync_hour), \
                 sync_minute = COALESCE($3, sync_minute), \
                 sync_enabled = COALESCE($4, sync_enabled), \
                 mail_hour = COALESCE($5, mail_hour), \
                 mail_minute = COALESCE($6, mail_minute), \
                 mail_enabled = COALESCE($7, mail_enabled), \
                 lead_days = COALESCE($8, lead_days), \
                 auto_close_final_stage = COALESCE($9, auto_close_final_stage), \
                 updated_at = NOW() \
             WHERE tenant_id = $1 \
             RETURNING {COLUMNS}"
        );
        let schedule = sqlx::query_as::<_, TenantSchedule>(&query)
            .bind(tenant.as_i64())
            .bind(changes.sync_hour)
            .bind(changes.sync_minute)
            .bind(changes.sync_enabled)
            .bind(changes.mail_hour)
            .bind(changes.mail_minute)
            .bind(changes.mail_enabled)
            .bind(changes.lead_days)
            .bind(changes.auto_close_final_stage)
            .fetch_one(pool)
            .await?;
        Ok(schedule)
    }

    /// List the schedules of every active tenant. Cross-tenant: requires
    /// sudo. The dispatcher rebuilds its job map from this.
    pub async fn list_for_active_tenants(
        pool: &PgPool,
        _sudo: &Sudo,
    ) -> Result<Vec<TenantSchedule>, sqlx::Error> {
        let query = format!(
            "SELECT s.id, s.tenant_id, s.sync_hour, s.sync_minute, s.sync_enabled, \
                    s.mail_hour, s.mail_minute, s.mail_enabled, s.lead_days, \
                    s.auto_close_final_stage, s.updated_at \
             FROM tenant_schedules s \
             JOIN tenants t ON t.id = s.tenant_id \
             WHERE t.is_active = true \
             ORDER BY s.tenant_id"
        );
        sqlx::query_as::<_, TenantSchedule>(&query)
            .fetch_all(pool)
            .await
    }
}
