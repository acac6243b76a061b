//! Manual case operations invoked by operators.

use chrono::Utc;
use sqlx::PgPool;

use dunlin_core::status::CaseStatus;
use dunlin_core::tenant::TenantId;
use dunlin_core::types::DbId;
use dunlin_db::models::notification_log::{NewNotificationLog, NotificationMode};
use dunlin_db::repositories::{CaseRepo, InvoiceRepo, NotificationLogRepo};

use crate::error::SyncError;

/// Result of a manual reopen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReopenOutcome {
    Reopened,
    /// The case was already active; nothing changed.
    AlreadyActive,
}

/// Settle an invoice in full by hand and close its case.
///
/// Sets the invoice paid as of today, transitions the case to
/// `closed_paid`, and appends a system-mode log row recording the
/// closure so the case history shows why escalation stopped.
pub async fn mark_invoice_paid(
    pool: &PgPool,
    tenant: TenantId,
    invoice_id: DbId,
) -> Result<(), SyncError> {
    let invoice = InvoiceRepo::find(pool, tenant, invoice_id)
        .await?
        .ok_or(SyncError::InvoiceNotFound(invoice_id))?;
    let today = Utc::now().date_naive();

    let mut tx = pool.begin().await?;
    InvoiceRepo::mark_paid_tx(&mut tx, tenant, invoice.id, today).await?;
    if let Some(case_id) = invoice.case_id {
        CaseRepo::set_status_tx(&mut tx, tenant, case_id, CaseStatus::ClosedPaid).await?;
    }
    tx.commit().await?;

    NotificationLogRepo::insert(
        pool,
        tenant,
        &NewNotificationLog {
            invoice_number: invoice.invoice_number.clone(),
            client_id: invoice.client_id.clone(),
            recipient: "internal".into(),
            subject: format!("Invoice {} marked paid", invoice.invoice_number),
            body: "Invoice settled manually; case closed as paid.".into(),
            stage: "case_closed".into(),
            mode: NotificationMode::System,
        },
    )
    .await?;

    tracing::info!(
        tenant_id = tenant.as_i64(),
        invoice_id,
        invoice_number = %invoice.invoice_number,
        "Invoice marked paid manually"
    );
    Ok(())
}

/// Reopen a closed case for further escalation.
///
/// Reopening an already-active case is a no-op reported distinctly;
/// archived cases cannot be reopened.
pub async fn reopen_case(
    pool: &PgPool,
    tenant: TenantId,
    case_number: &str,
) -> Result<ReopenOutcome, SyncError> {
    let case = CaseRepo::find_by_case_number(pool, tenant, case_number)
        .await?
        .ok_or_else(|| SyncError::CaseNotFound(case_number.to_string()))?;

    match case.case_status() {
        Some(CaseStatus::Active) => Ok(ReopenOutcome::AlreadyActive),
        Some(from @ (CaseStatus::ClosedPaid | CaseStatus::ClosedUnpaid)) => {
            debug_assert!(from.can_transition(CaseStatus::Active));
            CaseRepo::set_status(pool, tenant, case.id, CaseStatus::Active).await?;
            tracing::info!(
                tenant_id = tenant.as_i64(),
                case_number,
                from = %from,
                "Case reopened"
            );
            Ok(ReopenOutcome::Reopened)
        }
        _ => Err(SyncError::InvalidTransition {
            case_number: case_number.to_string(),
            from: case.status.clone(),
            to: CaseStatus::Active.as_str().to_string(),
        }),
    }
}
