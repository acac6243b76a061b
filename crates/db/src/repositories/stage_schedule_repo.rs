//! Repository for the `stage_schedules` table.

use sqlx::PgPool;

use dunlin_core::stage::Stage;
use dunlin_core::tenant::TenantId;

use crate::models::stage_schedule::StageSchedule;

/// Column list for `stage_schedules` queries.
const COLUMNS: &str = "id, tenant_id, stage, offset_days, updated_at";

/// Provides access to per-tenant stage offsets.
pub struct StageScheduleRepo;

impl StageScheduleRepo {
    /// Fetch a tenant's stage offsets, normalized to exactly the five
    /// canonical stages in escalation order.
    ///
    /// Self-healing: rows with unknown stage keys are deleted, missing
    /// canonical stages are inserted with their default offsets, and
    /// existing offsets are preserved.
    pub async fn normalized(
        pool: &PgPool,
        tenant: TenantId,
    ) -> Result<Vec<StageSchedule>, sqlx::Error> {
        let canonical: Vec<&str> = Stage::ALL.iter().map(|s| s.key()).collect();

        let deleted = sqlx::query(
            "DELETE FROM stage_schedules WHERE tenant_id = $1 AND stage <> ALL($2)",
        )
        .bind(tenant.as_i64())
        .bind(&canonical)
        .execute(pool)
        .await?;
        if deleted.rows_affected() > 0 {
            tracing::warn!(
                tenant_id = tenant.as_i64(),
                removed = deleted.rows_affected(),
                "Removed stage schedule rows with unknown stage keys"
            );
        }

        for stage in Stage::ALL {
            sqlx::query(
                "INSERT INTO stage_schedules (tenant_id, stage, offset_days) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT ON CONSTRAINT uq_stage_schedules_tenant_stage DO NOTHING",
            )
            .bind(tenant.as_i64())
            .bind(stage.key())
            .bind(stage.default_offset_days())
            .execute(pool)
            .await?;
        }

        // Order by ladder position, not alphabetically.
        let query = format!(
            "SELECT {COLUMNS} FROM stage_schedules \
             WHERE tenant_id = $1 \
             ORDER BY array_position($2, stage)"
        );
        sqlx::query_as::<_, StageSchedule>(&query)
            .bind(tenant.as_i64())
            .bind(&canonical)
            .fetch_all(pool)
            .await
    }

    /// Set one stage's offset for a tenant.
    pub async fn set_offset(
        pool: &PgPool,
        tenant: TenantId,
        stage: Stage,
        offset_days: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO stage_schedules (tenant_id, stage, offset_days) \
             VALUES ($1, $2, $3) \
             ON CONFLICT ON CONSTRAINT uq_stage_schedules_tenant_stage \
             DO UPDATE SET offset_days = EXCLUDED.offset_days, updated_at = NOW()",
        )
        .bind(tenant.as_i64())
        .bind(stage.key())
        .bind(offset_days)
        .execute(pool)
        .await?;
        Ok(())
    }
}
