//! Operator-triggered notification sending.
//!
//! Same dedup/render/delivery/log path as the scheduled run, but for one
//! case and one stage, with failures surfaced to the caller instead of
//! being absorbed into counters.

use chrono::Utc;
use sqlx::PgPool;

use dunlin_core::stage::Stage;
use dunlin_core::status::CaseStatus;
use dunlin_core::tenant::TenantId;
use dunlin_db::models::notification_log::{NewNotificationLog, NotificationMode};
use dunlin_db::repositories::{
    CaseRepo, InvoiceRepo, NotificationLogRepo, ScheduleRepo, StageScheduleRepo, TenantRepo,
};

use crate::error::StagingError;
use crate::mailer::{send_with_retry, Mailer};
use crate::staging::{split_recipients, template_data};
use crate::templates::TemplateEngine;

/// Result of a manual send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualOutcome {
    Sent,
    /// The stage was already logged for this invoice; nothing was sent.
    AlreadySent,
}

/// Send one stage for one case, out of schedule.
///
/// The dedup log still applies, so an operator cannot double-send a
/// stage. Sending (or re-confirming) the final stage closes the case
/// when the tenant has auto-close enabled.
pub async fn send_manual_notification(
    pool: &PgPool,
    tenant: TenantId,
    case_number: &str,
    stage: Stage,
    templates: &dyn TemplateEngine,
    mailer: &dyn Mailer,
) -> Result<ManualOutcome, StagingError> {
    let tenant_row = TenantRepo::find(pool, tenant)
        .await?
        .ok_or(StagingError::TenantNotFound(tenant))?;
    let case = CaseRepo::find_by_case_number(pool, tenant, case_number)
        .await?
        .ok_or_else(|| StagingError::CaseNotFound(case_number.to_string()))?;
    let invoice = InvoiceRepo::find_by_number(pool, tenant, case_number)
        .await?
        .ok_or_else(|| StagingError::InvoiceNotFound(case_number.to_string()))?;

    let outcome = if NotificationLogRepo::exists(pool, tenant, &invoice.invoice_number, stage.key())
        .await?
    {
        ManualOutcome::AlreadySent
    } else {
        let recipients = invoice
            .effective_email()
            .map(split_recipients)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| StagingError::NoRecipient(case_number.to_string()))?;

        let today = Utc::now().date_naive();
        let stages = StageScheduleRepo::normalized(pool, tenant).await?;
        let data = template_data(&tenant_row, &invoice, &stages, today);
        let rendered = templates
            .render(stage, &data)
            .ok_or(StagingError::TemplateMissing(stage))?;

        let mut delivered = false;
        let mut last_err = None;
        for to in &recipients {
            match send_with_retry(mailer, to, &rendered.subject, &rendered.body).await {
                Ok(()) => delivered = true,
                Err(e) => last_err = Some(e),
            }
        }
        match (delivered, last_err) {
            (false, Some(e)) => return Err(StagingError::Delivery(e)),
            (false, None) => return Err(StagingError::NoRecipient(case_number.to_string())),
            (true, _) => {}
        }

        NotificationLogRepo::insert(
            pool,
            tenant,
            &NewNotificationLog {
                invoice_number: invoice.invoice_number.clone(),
                client_id: invoice.client_id.clone(),
                recipient: recipients.join(", "),
                subject: rendered.subject,
                body: rendered.body,
                stage: stage.key().to_string(),
                mode: NotificationMode::Manual,
            },
        )
        .await?;
        InvoiceRepo::set_debt_status(pool, tenant, invoice.id, stage.key()).await?;
        tracing::info!(
            tenant_id = tenant.as_i64(),
            case_number,
            %stage,
            "Manual notification sent"
        );
        ManualOutcome::Sent
    };

    if stage.is_final() {
        let schedule = ScheduleRepo::get_or_create(pool, tenant).await?;
        if schedule.auto_close_final_stage && case.case_status() == Some(CaseStatus::Active) {
            CaseRepo::set_status(pool, tenant, case.id, CaseStatus::ClosedUnpaid).await?;
            tracing::info!(
                tenant_id = tenant.as_i64(),
                case_number,
                "Case closed unpaid after final stage"
            );
        }
    }

    Ok(outcome)
}
