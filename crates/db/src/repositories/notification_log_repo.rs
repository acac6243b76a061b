//! Repository for the `notification_logs` table.

use sqlx::PgPool;

use dunlin_core::tenant::TenantId;

use crate::models::notification_log::{NewNotificationLog, NotificationLog};

/// Column list for `notification_logs` queries.
const COLUMNS: &str =
    "id, tenant_id, invoice_number, client_id, recipient, subject, body, stage, mode, sent_at";

/// Provides append and lookup operations for the send log.
pub struct NotificationLogRepo;

impl NotificationLogRepo {
    /// Append a log row, enforcing the dedup invariant.
    ///
    /// Returns `true` if a row was written, `false` if a row for
    /// `(tenant, invoice_number, stage)` already existed. ON CONFLICT DO
    /// NOTHING makes a concurrent duplicate indistinguishable from a
    /// prior send, which is the behavior staging wants.
    pub async fn insert(
        pool: &PgPool,
        tenant: TenantId,
        log: &NewNotificationLog,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO notification_logs \
                 (tenant_id, invoice_number, client_id, recipient, subject, body, stage, mode) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT ON CONSTRAINT uq_notification_logs_dedup DO NOTHING",
        )
        .bind(tenant.as_i64())
        .bind(&log.invoice_number)
        .bind(&log.client_id)
        .bind(&log.recipient)
        .bind(&log.subject)
        .bind(&log.body)
        .bind(&log.stage)
        .bind(log.mode.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether a stage was already sent for an invoice.
    pub async fn exists(
        pool: &PgPool,
        tenant: TenantId,
        invoice_number: &str,
        stage: &str,
    ) -> Result<bool, sqlx::Error> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM notification_logs \
             WHERE tenant_id = $1 AND invoice_number = $2 AND stage = $3",
        )
        .bind(tenant.as_i64())
        .bind(invoice_number)
        .bind(stage)
        .fetch_optional(pool)
        .await?;
        Ok(found.is_some())
    }

    /// Stage keys already sent for an invoice.
    pub async fn sent_stages(
        pool: &PgPool,
        tenant: TenantId,
        invoice_number: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT stage FROM notification_logs \
             WHERE tenant_id = $1 AND invoice_number = $2 \
             ORDER BY sent_at",
        )
        .bind(tenant.as_i64())
        .bind(invoice_number)
        .fetch_all(pool)
        .await
    }

    /// Full log history for an invoice, oldest first.
    pub async fn list_for_invoice(
        pool: &PgPool,
        tenant: TenantId,
        invoice_number: &str,
    ) -> Result<Vec<NotificationLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_logs \
             WHERE tenant_id = $1 AND invoice_number = $2 \
             ORDER BY sent_at"
        );
        sqlx::query_as::<_, NotificationLog>(&query)
            .bind(tenant.as_i64())
            .bind(invoice_number)
            .fetch_all(pool)
            .await
    }
}
