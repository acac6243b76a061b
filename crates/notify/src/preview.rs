//! Dry-run staging preview.
//!
//! Computes what a staging run would do today without sending anything,
//! and flags schedule anomalies. Several stages configured to the same
//! offset all fire on one day; that is legal but usually a mistake, so
//! the preview calls it out.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;

use dunlin_core::stage::Stage;
use dunlin_core::tenant::TenantContext;
use dunlin_db::models::stage_schedule::StageSchedule;
use dunlin_db::repositories::{
    InvoiceRepo, NotificationLogRepo, StageScheduleRepo, TenantRepo,
};

use crate::error::StagingError;
use crate::staging::{days_overdue, matching_stages};

/// Several stages sharing one offset.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateOffset {
    pub offset_days: i32,
    pub stages: Vec<Stage>,
}

/// What staging would do for one invoice today.
#[derive(Debug, Clone, Serialize)]
pub struct InvoicePreview {
    pub invoice_number: String,
    pub due_date: NaiveDate,
    pub days_overdue: i64,
    pub left_to_pay: i64,
    pub has_recipient: bool,
    /// Stage keys already in the send log.
    pub already_sent: Vec<String>,
    /// Stages a run today would actually deliver.
    pub would_send: Vec<Stage>,
}

/// Full dry-run report for one tenant.
#[derive(Debug, Clone, Serialize)]
pub struct StagingPreview {
    pub today: NaiveDate,
    pub duplicate_offsets: Vec<DuplicateOffset>,
    pub invoices: Vec<InvoicePreview>,
}

/// Compute today's staging outcome without sending.
pub async fn preview_staging(
    pool: &PgPool,
    ctx: &TenantContext,
) -> Result<StagingPreview, StagingError> {
    let tenant = ctx.require_tenant()?;
    TenantRepo::find(pool, tenant)
        .await?
        .ok_or(StagingError::TenantNotFound(tenant))?;

    let today = Utc::now().date_naive();
    let stages = StageScheduleRepo::normalized(pool, tenant).await?;

    let mut invoices = Vec::new();
    let mut offset = 0;
    loop {
        let page = InvoiceRepo::list_active_case_invoices(pool, tenant, 100, offset).await?;
        let page_len = page.len() as i64;
        invoices.extend(page);
        if page_len < 100 {
            break;
        }
        offset += 100;
    }

    let mut previews = Vec::with_capacity(invoices.len());
    for invoice in &invoices {
        let overdue = days_overdue(today, invoice.due_date);
        let matching = matching_stages(&stages, overdue);
        let already_sent =
            NotificationLogRepo::sent_stages(pool, tenant, &invoice.invoice_number).await?;
        let has_recipient = invoice.effective_email().is_some();

        let would_send = if invoice.left_to_pay > 0 && has_recipient {
            matching
                .into_iter()
                .filter(|s| !already_sent.iter().any(|sent| sent == s.key()))
                .collect()
        } else {
            Vec::new()
        };

        previews.push(InvoicePreview {
            invoice_number: invoice.invoice_number.clone(),
            due_date: invoice.due_date,
            days_overdue: overdue,
            left_to_pay: invoice.left_to_pay,
            has_recipient,
            already_sent,
            would_send,
        });
    }

    Ok(StagingPreview {
        today,
        duplicate_offsets: duplicate_offsets(&stages),
        invoices: previews,
    })
}

/// Group stages by offset and keep the groups with more than one member.
fn duplicate_offsets(stages: &[StageSchedule]) -> Vec<DuplicateOffset> {
    let mut groups: Vec<DuplicateOffset> = Vec::new();
    for schedule in stages {
        let Some(stage) = schedule.stage() else { continue };
        match groups.iter_mut().find(|g| g.offset_days == schedule.offset_days) {
            Some(group) => group.stages.push(stage),
            None => groups.push(DuplicateOffset {
                offset_days: schedule.offset_days,
                stages: vec![stage],
            }),
        }
    }
    groups.retain(|g| g.stages.len() > 1);
    groups
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

    #[test]
    fn distinct_offsets_report_no_duplicates() {
        let stages: Vec<StageSchedule> = Stage::ALL
            .into_iter()
            .map(|s| schedule(s, s.default_offset_days()))
            .collect();
        assert!(duplicate_offsets(&stages).is_empty());
    }

    #[test]
    fn shared_offset_is_flagged_with_both_stages() {
        let stages = vec![
            schedule(Stage::PaymentReminder, -1),
            schedule(Stage::OverdueNotice, 7),
            schedule(Stage::DemandForPayment, 7),
            schedule(Stage::CollectionWarning, 21),
            schedule(Stage::CollectionHandover, 30),
        ];
        let dupes = duplicate_offsets(&stages);
        assert_eq!(dupes.len(), 1);
        assert_eq!(dupes[0].offset_days, 7);
        assert_eq!(
            dupes[0].stages,
            vec![Stage::OverdueNotice, Stage::DemandForPayment]
        );
    }
}
