//! Phase B — reconciliation.
//!
//! Diffs the provider's state against every currently-active case inside
//! a rolling due-date window, updating mutable invoice fields, closing
//! paid cases and reopening cases that were closed while their invoice
//! is still unpaid. Each record's writes run in their own transaction so
//! one failure rolls back one record only.

use std::collections::HashSet;

use chrono::{Days, NaiveDate};
use sqlx::PgPool;

use dunlin_core::status::{CaseStatus, InvoiceStatus};
use dunlin_core::tenant::TenantId;
use dunlin_db::models::invoice::{Invoice, InvoiceChanges};
use dunlin_db::repositories::{CaseRepo, InvoiceRepo};
use dunlin_provider::{DueDateFilter, InvoiceProvider, InvoiceQuery, NormalizedInvoice};

use crate::engine::PAGE_SIZE;

/// Look-back of the reconciliation window, in days.
const WINDOW_PAST_DAYS: u64 = 35;
/// Look-ahead of the reconciliation window, in days.
const WINDOW_FUTURE_DAYS: u64 = 3;

#[derive(Debug, Default)]
pub(crate) struct ReconcileStats {
    pub processed: i32,
    pub closed: i32,
    pub reopened: i32,
    pub api_calls: i32,
    pub duration_ms: i64,
}

#[derive(Debug, PartialEq, Eq)]
enum RecordOutcome {
    Updated,
    Closed,
    Reopened,
    Skipped,
}

pub(crate) async fn run(
    pool: &PgPool,
    tenant: TenantId,
    provider: &dyn InvoiceProvider,
    today: NaiveDate,
) -> ReconcileStats {
    let started = std::time::Instant::now();
    let mut stats = ReconcileStats::default();

    let active: HashSet<String> = match CaseRepo::active_case_numbers(pool, tenant).await {
        Ok(numbers) => numbers.into_iter().collect(),
        Err(e) => {
            tracing::error!(tenant_id = tenant.as_i64(), error = %e, "Failed to load active cases");
            stats.duration_ms = started.elapsed().as_millis() as i64;
            return stats;
        }
    };
    if active.is_empty() {
        stats.duration_ms = started.elapsed().as_millis() as i64;
        return stats;
    }

    let window = DueDateFilter::Range {
        from: today
            .checked_sub_days(Days::new(WINDOW_PAST_DAYS))
            .unwrap_or(today),
        to: today
            .checked_add_days(Days::new(WINDOW_FUTURE_DAYS))
            .unwrap_or(today),
    };

    let mut query = InvoiceQuery::first_page(window, PAGE_SIZE);
    loop {
        let page = provider.fetch_invoices(&query).await;
        stats.api_calls += 1;

        for remote in page.iter().filter(|inv| active.contains(&inv.number)) {
            match reconcile_one(pool, tenant, today, remote).await {
                Ok(RecordOutcome::Closed) => {
                    stats.processed += 1;
                    stats.closed += 1;
                }
                Ok(RecordOutcome::Reopened) => {
                    stats.processed += 1;
                    stats.reopened += 1;
                }
                Ok(RecordOutcome::Updated) => stats.processed += 1,
                Ok(RecordOutcome::Skipped) => {}
                Err(e) => {
                    // This record's transaction rolled back; the loop
                    // continues with the next one.
                    tracing::warn!(
                        tenant_id = tenant.as_i64(),
                        invoice_number = %remote.number,
                        error = %e,
                        "Skipping invoice during reconciliation"
                    );
                }
            }
        }

        if (page.len() as u32) < query.limit {
            break;
        }
        query = query.next_page();
    }

    stats.duration_ms = started.elapsed().as_millis() as i64;
    tracing::debug!(
        tenant_id = tenant.as_i64(),
        processed = stats.processed,
        closed = stats.closed,
        reopened = stats.reopened,
        "Reconciliation phase finished"
    );
    stats
}

/// Diff provider state against the local row; `None` means nothing to do.
fn diff(local: &Invoice, remote: &NormalizedInvoice, today: NaiveDate) -> InvoiceChanges {
    let mut changes = InvoiceChanges::default();

    if remote.status.as_str() != local.status {
        changes.status = Some(remote.status);
    }
    if remote.gross != local.gross_amount {
        changes.gross_amount = Some(remote.gross);
    }
    if remote.paid != local.paid_amount {
        changes.paid_amount = Some(remote.paid);
    }
    match remote.due_date {
        Some(due) if due != local.due_date => changes.due_date = Some(due),
        _ => {}
    }
    match remote.invoice_date {
        Some(date) if date != local.invoice_date => changes.invoice_date = Some(date),
        _ => {}
    }
    if remote.payment_method.is_some() && remote.payment_method != local.payment_method {
        changes.payment_method = remote.payment_method.clone();
    }

    // Infer a payment date when the balance transitions to zero and the
    // provider did not supply one.
    let new_left = remote.gross - remote.paid;
    if let Some(paid_date) = remote.paid_date {
        if local.paid_date != Some(paid_date) {
            changes.paid_date = Some(paid_date);
        }
    } else if new_left <= 0 && local.left_to_pay > 0 && local.paid_date.is_none() {
        changes.paid_date = Some(today);
    }

    changes
}

async fn reconcile_one(
    pool: &PgPool,
    tenant: TenantId,
    today: NaiveDate,
    remote: &NormalizedInvoice,
) -> Result<RecordOutcome, sqlx::Error> {
    let Some(local) = InvoiceRepo::find_by_number(pool, tenant, &remote.number).await? else {
        // Active case without a stored invoice; nothing to diff against.
        return Ok(RecordOutcome::Skipped);
    };

    let changes = diff(&local, remote, today);
    let new_left = remote.gross - remote.paid;
    let settled = new_left <= 0 || remote.status == InvoiceStatus::Paid;

    let case = match local.case_id {
        Some(case_id) => CaseRepo::find(pool, tenant, case_id).await?,
        None => None,
    };

    let mut tx = pool.begin().await?;

    if !changes.is_empty() {
        InvoiceRepo::apply_changes_tx(&mut tx, tenant, local.id, &changes).await?;
    }

    let mut outcome = if changes.is_empty() {
        RecordOutcome::Skipped
    } else {
        RecordOutcome::Updated
    };

    if let Some(case) = case {
        match case.case_status() {
            Some(CaseStatus::Active) if settled => {
                CaseRepo::set_status_tx(&mut tx, tenant, case.id, CaseStatus::ClosedPaid).await?;
                outcome = RecordOutcome::Closed;
            }
            // Self-heal: closed locally but still unpaid at the provider.
            Some(CaseStatus::ClosedPaid | CaseStatus::ClosedUnpaid) if !settled => {
                CaseRepo::set_status_tx(&mut tx, tenant, case.id, CaseStatus::Active).await?;
                outcome = RecordOutcome::Reopened;
            }
            _ => {}
        }
    }

    tx.commit().await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dunlin_core::status::InvoiceStatus;

    fn local(gross: i64, paid: i64) -> Invoice {
        Invoice {
            id: 1,
            tenant_id: 1,
            external_id: "ext-1".into(),
            invoice_number: "FV 1/2025".into(),
            invoice_date: "2025-03-01".parse().unwrap(),
            due_date: "2025-03-15".parse().unwrap(),
            paid_date: None,
            gross_amount: gross,
            paid_amount: paid,
            left_to_pay: gross - paid,
            status: "sent".into(),
            debt_status: None,
            currency: "PLN".into(),
            payment_method: None,
            client_id: None,
            client_company_name: None,
            client_email: None,
            override_email: None,
            client_tax_id: None,
            client_address: None,
            case_id: Some(1),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn remote(gross: i64, paid: i64, status: InvoiceStatus) -> NormalizedInvoice {
        NormalizedInvoice {
            external_id: "ext-1".into(),
            number: "FV 1/2025".into(),
            client_id: None,
            gross,
            paid,
            left_to_pay: gross - paid,
            currency: "PLN".into(),
            invoice_date: Some("2025-03-01".parse().unwrap()),
            due_date: Some("2025-03-15".parse().unwrap()),
            paid_date: None,
            status,
            payment_method: None,
        }
    }

    fn today() -> NaiveDate {
        "2025-03-20".parse().unwrap()
    }

    #[test]
    fn identical_state_produces_no_changes() {
        let changes = diff(&local(10000, 0), &remote(10000, 0, InvoiceStatus::Sent), today());
        assert!(changes.is_empty());
    }

    #[test]
    fn payment_updates_paid_amount() {
        let changes = diff(&local(10000, 0), &remote(10000, 4000, InvoiceStatus::Sent), today());
        assert_eq!(changes.paid_amount, Some(4000));
        assert_eq!(changes.gross_amount, None);
        assert_eq!(changes.paid_date, None, "partial payment infers no paid date");
    }

    #[test]
    fn full_payment_infers_paid_date() {
        let changes = diff(&local(10000, 0), &remote(10000, 10000, InvoiceStatus::Paid), today());
        assert_eq!(changes.paid_amount, Some(10000));
        assert_eq!(changes.status, Some(InvoiceStatus::Paid));
        assert_eq!(changes.paid_date, Some(today()));
    }

    #[test]
    fn provider_paid_date_wins_over_inference() {
        let mut r = remote(10000, 10000, InvoiceStatus::Paid);
        r.paid_date = Some("2025-03-18".parse().unwrap());
        let changes = diff(&local(10000, 0), &r, today());
        assert_eq!(changes.paid_date, Some("2025-03-18".parse().unwrap()));
    }

    #[test]
    fn already_settled_invoice_infers_nothing() {
        let mut settled = local(10000, 10000);
        settled.paid_date = Some("2025-03-18".parse().unwrap());
        let changes = diff(&settled, &remote(10000, 10000, InvoiceStatus::Paid), today());
        assert_eq!(changes.paid_date, None);
    }

    #[test]
    fn due_date_shift_is_picked_up() {
        let mut r = remote(10000, 0, InvoiceStatus::Sent);
        r.due_date = Some("2025-03-22".parse().unwrap());
        let changes = diff(&local(10000, 0), &r, today());
        assert_eq!(changes.due_date, Some("2025-03-22".parse().unwrap()));
    }

    #[test]
    fn absent_remote_dates_do_not_clear_local_ones() {
        let mut r = remote(10000, 0, InvoiceStatus::Sent);
        r.due_date = None;
        r.invoice_date = None;
        let changes = diff(&local(10000, 0), &r, today());
        assert!(changes.is_empty());
    }
}
