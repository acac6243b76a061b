//! Repository for the `tenants` table.

use sqlx::PgPool;

use dunlin_core::tenant::{Sudo, TenantId};
use dunlin_core::types::DbId;

use crate::models::tenant::{NewTenant, Tenant};

/// Column list for `tenants` queries.
const COLUMNS: &str = "id, name, is_active, provider_type, provider_credentials, \
     smtp_host, smtp_port, smtp_username, smtp_password, smtp_from, \
     company_name, company_phone, company_email, company_bank_account, created_at";

/// Provides access to the tenant roster.
pub struct TenantRepo;

impl TenantRepo {
    /// Create a tenant, returning the generated ID.
    ///
    /// Called by the external onboarding flow and by tests.
    pub async fn create(pool: &PgPool, tenant: &NewTenant) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO tenants (name, provider_type, provider_credentials) \
             VALUES ($1, $2, $3) \
             RETURNING id",
        )
        .bind(&tenant.name)
        .bind(&tenant.provider_type)
        .bind(&tenant.provider_credentials)
        .fetch_one(pool)
        .await
    }

    /// Fetch one tenant by id.
    pub async fn find(pool: &PgPool, tenant: TenantId) -> Result<Option<Tenant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tenants WHERE id = $1");
        sqlx::query_as::<_, Tenant>(&query)
            .bind(tenant.as_i64())
            .fetch_optional(pool)
            .await
    }

    /// List all active tenants. Cross-tenant: requires sudo.
    pub async fn list_active(pool: &PgPool, _sudo: &Sudo) -> Result<Vec<Tenant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tenants WHERE is_active = true ORDER BY id");
        sqlx::query_as::<_, Tenant>(&query).fetch_all(pool).await
    }

    /// Deactivate a tenant, removing it from all scheduled processing.
    pub async fn deactivate(pool: &PgPool, tenant: TenantId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE tenants SET is_active = false WHERE id = $1")
            .bind(tenant.as_i64())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
