//! Repository for the `cases` table.

use sqlx::{PgConnection, PgPool};

use dunlin_core::status::CaseStatus;
use dunlin_core::tenant::TenantId;
use dunlin_core::types::DbId;

use crate::models::case::{Case, NewCase};

/// Column list for `cases` queries.
const COLUMNS: &str = "id, tenant_id, case_number, client_id, client_company_name, \
     client_tax_id, status, created_at, updated_at";

/// Name of the per-tenant case-number uniqueness constraint.
///
/// Ingestion treats a violation of this constraint as "case already
/// exists" and re-links instead of failing the run.
pub const UQ_TENANT_CASE_NUMBER: &str = "uq_cases_tenant_case_number";

/// Provides CRUD operations for collection cases.
pub struct CaseRepo;

impl CaseRepo {
    /// Open a case, returning the generated ID.
    ///
    /// A unique violation on [`UQ_TENANT_CASE_NUMBER`] is surfaced as-is;
    /// callers classify it with [`crate::is_unique_violation`].
    pub async fn create(
        pool: &PgPool,
        tenant: TenantId,
        case: &NewCase,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO cases \
                 (tenant_id, case_number, client_id, client_company_name, client_tax_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(tenant.as_i64())
        .bind(&case.case_number)
        .bind(&case.client_id)
        .bind(&case.client_company_name)
        .bind(&case.client_tax_id)
        .fetch_one(pool)
        .await
    }

    /// Fetch one case by id within a tenant.
    pub async fn find(
        pool: &PgPool,
        tenant: TenantId,
        case_id: DbId,
    ) -> Result<Option<Case>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM cases WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, Case>(&query)
            .bind(tenant.as_i64())
            .bind(case_id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch one case by its tenant-unique case number.
    pub async fn find_by_case_number(
        pool: &PgPool,
        tenant: TenantId,
        case_number: &str,
    ) -> Result<Option<Case>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM cases WHERE tenant_id = $1 AND case_number = $2");
        sqlx::query_as::<_, Case>(&query)
            .bind(tenant.as_i64())
            .bind(case_number)
            .fetch_optional(pool)
            .await
    }

    /// Case numbers of all active cases for a tenant.
    ///
    /// Reconciliation intersects provider pages against this set.
    pub async fn active_case_numbers(
        pool: &PgPool,
        tenant: TenantId,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT case_number FROM cases \
             WHERE tenant_id = $1 AND status = 'active' \
             ORDER BY case_number",
        )
        .bind(tenant.as_i64())
        .fetch_all(pool)
        .await
    }

    /// Count active cases for a tenant (the audit `active_after` figure).
    pub async fn count_active(pool: &PgPool, tenant: TenantId) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM cases WHERE tenant_id = $1 AND status = 'active'")
                .bind(tenant.as_i64())
                .fetch_one(pool)
                .await?;
        Ok(count.unwrap_or(0))
    }

    /// Transition a case's status.
    ///
    /// Returns `true` if the case was found for the tenant and updated.
    pub async fn set_status(
        pool: &PgPool,
        tenant: TenantId,
        case_id: DbId,
        status: CaseStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cases SET status = $3, updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant.as_i64())
        .bind(case_id)
        .bind(status.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transaction-scoped variant of [`set_status`](Self::set_status).
    ///
    /// Reconciliation pairs this with the invoice update so a failed
    /// record rolls back atomically.
    pub async fn set_status_tx(
        conn: &mut PgConnection,
        tenant: TenantId,
        case_id: DbId,
        status: CaseStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cases SET status = $3, updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant.as_i64())
        .bind(case_id)
        .bind(status.as_str())
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
