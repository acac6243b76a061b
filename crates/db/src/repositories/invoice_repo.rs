//! Repository for the `invoices` table.

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use dunlin_core::money;
use dunlin_core::status::InvoiceStatus;
use dunlin_core::tenant::TenantId;
use dunlin_core::types::DbId;

use crate::models::invoice::{Invoice, InvoiceChanges, NewInvoice};

/// Column list for `invoices` queries.
const COLUMNS: &str = "id, tenant_id, external_id, invoice_number, invoice_date, due_date, \
     paid_date, gross_amount, paid_amount, left_to_pay, status, debt_status, currency, \
     payment_method, client_id, client_company_name, client_email, override_email, \
     client_tax_id, client_address, case_id, created_at, updated_at";

/// Provides CRUD operations for invoices.
pub struct InvoiceRepo;

impl InvoiceRepo {
    /// Insert a freshly ingested invoice, returning the generated ID.
    ///
    /// `left_to_pay` is computed here from gross and paid.
    pub async fn create(
        pool: &PgPool,
        tenant: TenantId,
        invoice: &NewInvoice,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO invoices \
                 (tenant_id, external_id, invoice_number, invoice_date, due_date, paid_date, \
                  gross_amount, paid_amount, left_to_pay, status, currency, payment_method, \
                  client_id, client_company_name, client_email, client_tax_id, client_address) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING id",
        )
        .bind(tenant.as_i64())
        .bind(&invoice.external_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.invoice_date)
        .bind(invoice.due_date)
        .bind(invoice.paid_date)
        .bind(invoice.gross_amount)
        .bind(invoice.paid_amount)
        .bind(money::left_to_pay(invoice.gross_amount, invoice.paid_amount))
        .bind(invoice.status.as_str())
        .bind(&invoice.currency)
        .bind(&invoice.payment_method)
        .bind(&invoice.client_id)
        .bind(&invoice.client_company_name)
        .bind(&invoice.client_email)
        .bind(&invoice.client_tax_id)
        .bind(&invoice.client_address)
        .fetch_one(pool)
        .await
    }

    /// Whether an invoice with this provider id already exists for the
    /// tenant. Ingestion's idempotency check.
    pub async fn exists_by_external_id(
        pool: &PgPool,
        tenant: TenantId,
        external_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM invoices WHERE tenant_id = $1 AND external_id = $2",
        )
        .bind(tenant.as_i64())
        .bind(external_id)
        .fetch_optional(pool)
        .await?;
        Ok(found.is_some())
    }

    /// Fetch one invoice by id within a tenant.
    pub async fn find(
        pool: &PgPool,
        tenant: TenantId,
        invoice_id: DbId,
    ) -> Result<Option<Invoice>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM invoices WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, Invoice>(&query)
            .bind(tenant.as_i64())
            .bind(invoice_id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch one invoice by its provider invoice number.
    pub async fn find_by_number(
        pool: &PgPool,
        tenant: TenantId,
        invoice_number: &str,
    ) -> Result<Option<Invoice>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM invoices WHERE tenant_id = $1 AND invoice_number = $2");
        sqlx::query_as::<_, Invoice>(&query)
            .bind(tenant.as_i64())
            .bind(invoice_number)
            .fetch_optional(pool)
            .await
    }

    /// Page through invoices whose case is currently active.
    ///
    /// The staging engine walks these in batches.
    pub async fn list_active_case_invoices(
        pool: &PgPool,
        tenant: TenantId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Invoice>, sqlx::Error> {
        let query = format!(
            "SELECT {cols} FROM invoices i \
             WHERE i.tenant_id = $1 \
               AND i.case_id IN \
                   (SELECT id FROM cases WHERE tenant_id = $1 AND status = 'active') \
             ORDER BY i.id \
             LIMIT $2 OFFSET $3",
            cols = COLUMNS
                .split(", ")
                .map(|c| format!("i.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        sqlx::query_as::<_, Invoice>(&query)
            .bind(tenant.as_i64())
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Link an invoice to its case.
    pub async fn link_case(
        pool: &PgPool,
        tenant: TenantId,
        invoice_id: DbId,
        case_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invoices SET case_id = $3, updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant.as_i64())
        .bind(invoice_id)
        .bind(case_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply a reconciliation patch inside the caller's transaction.
    ///
    /// `left_to_pay` is recomputed from the resulting gross and paid in
    /// the same statement, so the conservation invariant holds after
    /// every write.
    pub async fn apply_changes_tx(
        conn: &mut PgConnection,
        tenant: TenantId,
        invoice_id: DbId,
        changes: &InvoiceChanges,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invoices SET \
                 status = COALESCE($3, status), \
                 gross_amount = COALESCE($4, gross_amount), \
                 paid_amount = COALESCE($5, paid_amount), \
                 due_date = COALESCE($6, due_date), \
                 invoice_date = COALESCE($7, invoice_date), \
                 paid_date = COALESCE($8, paid_date), \
                 payment_method = COALESCE($9, payment_method), \
                 left_to_pay = COALESCE($4, gross_amount) - COALESCE($5, paid_amount), \
                 updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant.as_i64())
        .bind(invoice_id)
        .bind(changes.status.map(|s| s.as_str()))
        .bind(changes.gross_amount)
        .bind(changes.paid_amount)
        .bind(changes.due_date)
        .bind(changes.invoice_date)
        .bind(changes.paid_date)
        .bind(&changes.payment_method)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the last notification stage sent for an invoice.
    pub async fn set_debt_status(
        pool: &PgPool,
        tenant: TenantId,
        invoice_id: DbId,
        debt_status: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invoices SET debt_status = $3, updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant.as_i64())
        .bind(invoice_id)
        .bind(debt_status)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set a manual recipient override for an invoice.
    pub async fn set_override_email(
        pool: &PgPool,
        tenant: TenantId,
        invoice_id: DbId,
        override_email: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invoices SET override_email = $3, updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant.as_i64())
        .bind(invoice_id)
        .bind(override_email)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Settle an invoice in full as of `paid_date` (manual mark-paid).
    pub async fn mark_paid_tx(
        conn: &mut PgConnection,
        tenant: TenantId,
        invoice_id: DbId,
        paid_date: NaiveDate,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invoices SET \
                 status = $3, paid_amount = gross_amount, left_to_pay = 0, \
                 paid_date = $4, updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant.as_i64())
        .bind(invoice_id)
        .bind(InvoiceStatus::Paid.as_str())
        .bind(paid_date)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
