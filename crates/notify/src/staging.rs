//! Scheduled notification staging.
//!
//! One run per tenant per day (more often is harmless: the send log
//! dedups). For every invoice in an active case, the distance from the
//! due date is matched against the tenant's stage offsets and every
//! matching stage is sent in escalation order.

use chrono::{NaiveDate, TimeDelta, Utc};
use serde::Serialize;
use sqlx::PgPool;

use dunlin_core::money;
use dunlin_core::stage::Stage;
use dunlin_core::status::CaseStatus;
use dunlin_core::tenant::TenantContext;
use dunlin_db::models::invoice::Invoice;
use dunlin_db::models::notification_log::{NewNotificationLog, NotificationMode};
use dunlin_db::models::stage_schedule::StageSchedule;
use dunlin_db::models::tenant::Tenant;
use dunlin_db::repositories::{
    CaseRepo, InvoiceRepo, NotificationLogRepo, ScheduleRepo, StageScheduleRepo, TenantRepo,
};

use crate::error::StagingError;
use crate::mailer::{send_with_retry, Mailer};
use crate::templates::{TemplateData, TemplateEngine};

/// Invoices fetched per page while walking a tenant's active cases.
const BATCH_SIZE: i64 = 100;

/// Counters from one staging run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StagingSummary {
    /// Active-case invoices looked at.
    pub examined: i32,
    /// Stages delivered and logged.
    pub sent: i32,
    /// Stage matches suppressed by the send log.
    pub skipped_duplicate: i32,
    /// Invoices with a stage match but no usable recipient.
    pub skipped_no_email: i32,
    /// Stage matches where every recipient failed; retried next run.
    pub failed: i32,
    /// Cases closed after the final stage.
    pub closed: i32,
}

/// Run staging for the context's tenant.
///
/// Fail-closed: an unset context or the sudo scope is an error, never an
/// unscoped run.
pub async fn run_staging(
    pool: &PgPool,
    ctx: &TenantContext,
    templates: &dyn TemplateEngine,
    mailer: &dyn Mailer,
) -> Result<StagingSummary, StagingError> {
    let tenant = ctx.require_tenant()?;
    let row = TenantRepo::find(pool, tenant)
        .await?
        .ok_or(StagingError::TenantNotFound(tenant))?;

    let today = Utc::now().date_naive();
    let schedule = ScheduleRepo::get_or_create(pool, tenant).await?;
    let stages = StageScheduleRepo::normalized(pool, tenant).await?;

    tracing::info!(tenant_id = tenant.as_i64(), %today, "Staging run started");

    let mut summary = StagingSummary::default();

    // Collect the full working set up front: closing a case mid-scan
    // would shift later pages.
    let mut invoices = Vec::new();
    let mut offset = 0;
    loop {
        let page = InvoiceRepo::list_active_case_invoices(pool, tenant, BATCH_SIZE, offset).await?;
        let page_len = page.len() as i64;
        invoices.extend(page);
        if page_len < BATCH_SIZE {
            break;
        }
        offset += BATCH_SIZE;
    }

    for invoice in &invoices {
        summary.examined += 1;
        stage_invoice(
            pool,
            &row,
            schedule.auto_close_final_stage,
            &stages,
            invoice,
            today,
            templates,
            mailer,
            &mut summary,
        )
        .await?;
    }

    tracing::info!(
        tenant_id = tenant.as_i64(),
        examined = summary.examined,
        sent = summary.sent,
        skipped_duplicate = summary.skipped_duplicate,
        skipped_no_email = summary.skipped_no_email,
        failed = summary.failed,
        closed = summary.closed,
        "Staging run finished"
    );
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
async fn stage_invoice(
    pool: &PgPool,
    tenant_row: &Tenant,
    auto_close_final_stage: bool,
    stages: &[StageSchedule],
    invoice: &Invoice,
    today: NaiveDate,
    templates: &dyn TemplateEngine,
    mailer: &dyn Mailer,
    summary: &mut StagingSummary,
) -> Result<(), StagingError> {
    let tenant = tenant_row.tenant_id();

    if invoice.left_to_pay <= 0 {
        return Ok(());
    }

    let overdue = days_overdue(today, invoice.due_date);
    let matching = matching_stages(stages, overdue);
    if matching.is_empty() {
        return Ok(());
    }

    let Some(email) = invoice.effective_email() else {
        tracing::debug!(
            tenant_id = tenant.as_i64(),
            invoice_number = %invoice.invoice_number,
            "Stage due but no recipient email"
        );
        summary.skipped_no_email += 1;
        return Ok(());
    };
    let recipients = split_recipients(email);
    if recipients.is_empty() {
        summary.skipped_no_email += 1;
        return Ok(());
    }

    let mut final_stage_logged = false;

    for stage in matching {
        if NotificationLogRepo::exists(pool, tenant, &invoice.invoice_number, stage.key()).await? {
            summary.skipped_duplicate += 1;
            final_stage_logged |= stage.is_final();
            continue;
        }

        let data = template_data(tenant_row, invoice, stages, today);
        let Some(rendered) = templates.render(stage, &data) else {
            tracing::warn!(
                tenant_id = tenant.as_i64(),
                %stage,
                invoice_number = %invoice.invoice_number,
                "No template for stage, not sending"
            );
            continue;
        };

        let mut delivered = false;
        for to in &recipients {
            match send_with_retry(mailer, to, &rendered.subject, &rendered.body).await {
                Ok(()) => delivered = true,
                Err(e) => {
                    tracing::warn!(
                        tenant_id = tenant.as_i64(),
                        to = to.as_str(),
                        invoice_number = %invoice.invoice_number,
                        %stage,
                        error = %e,
                        "Recipient delivery failed"
                    );
                }
            }
        }

        if delivered {
            // ON CONFLICT makes a concurrent duplicate indistinguishable
            // from a prior send; either way the stage is now logged.
            NotificationLogRepo::insert(
                pool,
                tenant,
                &NewNotificationLog {
                    invoice_number: invoice.invoice_number.clone(),
                    client_id: invoice.client_id.clone(),
                    recipient: recipients.join(", "),
                    subject: rendered.subject.clone(),
                    body: rendered.body.clone(),
                    stage: stage.key().to_string(),
                    mode: NotificationMode::Automatic,
                },
            )
            .await?;
            InvoiceRepo::set_debt_status(pool, tenant, invoice.id, stage.key()).await?;
            summary.sent += 1;
            final_stage_logged |= stage.is_final();
            tracing::info!(
                tenant_id = tenant.as_i64(),
                invoice_number = %invoice.invoice_number,
                %stage,
                "Stage notification sent"
            );
        } else {
            // No log row: the stage stays eligible for the next run.
            summary.failed += 1;
        }
    }

    if final_stage_logged && auto_close_final_stage {
        if let Some(case_id) = invoice.case_id {
            CaseRepo::set_status(pool, tenant, case_id, CaseStatus::ClosedUnpaid).await?;
            summary.closed += 1;
            tracing::info!(
                tenant_id = tenant.as_i64(),
                invoice_number = %invoice.invoice_number,
                "Case closed unpaid after final stage"
            );
        }
    }

    Ok(())
}

/// Signed distance from the due date; negative while not yet due.
pub(crate) fn days_overdue(today: NaiveDate, due_date: NaiveDate) -> i64 {
    (today - due_date).num_days()
}

/// Stages whose offset fires today, in escalation order.
///
/// `stages` comes from the normalized schedule, which is already in
/// ladder order; several stages configured to the same offset all match.
pub(crate) fn matching_stages(stages: &[StageSchedule], overdue: i64) -> Vec<Stage> {
    stages
        .iter()
        .filter(|s| i64::from(s.offset_days) == overdue)
        .filter_map(|s| s.stage())
        .collect()
}

/// Comma-separated recipient list, trimmed, blanks dropped.
pub(crate) fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Assemble the interpolation data for one invoice.
pub(crate) fn template_data(
    tenant: &Tenant,
    invoice: &Invoice,
    stages: &[StageSchedule],
    today: NaiveDate,
) -> TemplateData {
    let upcoming_stages = stages
        .iter()
        .filter_map(|s| {
            let date = invoice
                .due_date
                .checked_add_signed(TimeDelta::days(i64::from(s.offset_days)))?;
            (date > today).then_some((s.stage()?, date))
        })
        .collect();

    TemplateData {
        case_number: invoice.invoice_number.clone(),
        debtor_name: invoice.client_company_name.clone(),
        debtor_address: invoice.client_address.clone(),
        debtor_tax_id: invoice.client_tax_id.clone(),
        amount_due: money::format_minor(invoice.left_to_pay),
        currency: invoice.currency.clone(),
        due_date: invoice.due_date,
        creditor_name: tenant.company_name.clone(),
        creditor_phone: tenant.company_phone.clone(),
        creditor_email: tenant.company_email.clone(),
        creditor_bank_account: tenant.company_bank_account.clone(),
        upcoming_stages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(stage: Stage, offset_days: i32) -> StageSchedule {
        StageSchedule {
            id: stage.number() as i64,
            tenant_id: 1,
            stage: stage.key().to_string(),
            offset_days,
            updated_at: chrono::Utc::now(),
        }
    }

    fn default_stages() -> Vec<StageSchedule> {
        Stage::ALL
            .into_iter()
            .map(|s| schedule(s, s.default_offset_days()))
            .collect()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn overdue_is_signed() {
        assert_eq!(days_overdue(date("2025-03-15"), date("2025-03-15")), 0);
        assert_eq!(days_overdue(date("2025-03-22"), date("2025-03-15")), 7);
        assert_eq!(days_overdue(date("2025-03-14"), date("2025-03-15")), -1);
    }

    #[test]
    fn reminder_matches_day_before_due() {
        // Invoice due tomorrow: -1 day overdue matches the reminder.
        let matched = matching_stages(&default_stages(), -1);
        assert_eq!(matched, vec![Stage::PaymentReminder]);
    }

    #[test]
    fn off_schedule_days_match_nothing() {
        for overdue in [-2, 0, 1, 3, 8, 29, 31] {
            assert!(matching_stages(&default_stages(), overdue).is_empty(), "{overdue}");
        }
    }

    #[test]
    fn each_default_offset_matches_its_stage() {
        for stage in Stage::ALL {
            let matched =
                matching_stages(&default_stages(), i64::from(stage.default_offset_days()));
            assert_eq!(matched, vec![stage]);
        }
    }

    #[test]
    fn shared_offset_matches_in_ladder_order() {
        let mut stages = default_stages();
        stages[2].offset_days = 7; // demand_for_payment moved onto overdue_notice's day
        let matched = matching_stages(&stages, 7);
        assert_eq!(matched, vec![Stage::OverdueNotice, Stage::DemandForPayment]);
    }

    #[test]
    fn recipients_split_and_trimmed() {
        assert_eq!(
            split_recipients("a@x.pl, b@x.pl ,, c@x.pl "),
            vec!["a@x.pl", "b@x.pl", "c@x.pl"]
        );
        assert!(split_recipients("  , ,").is_empty());
    }
}
