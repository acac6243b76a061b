//! Phase A — ingestion.
//!
//! Opens Invoice/Case records for invoices due exactly `lead_days` from
//! today. Idempotent: an invoice whose external id is already stored for
//! the tenant is skipped, and a case-number collision is re-linked rather
//! than treated as a failure.

use chrono::{Days, NaiveDate};
use sqlx::PgPool;

use dunlin_core::tenant::TenantId;
use dunlin_db::models::case::NewCase;
use dunlin_db::models::invoice::NewInvoice;
use dunlin_db::repositories::case_repo::UQ_TENANT_CASE_NUMBER;
use dunlin_db::repositories::{CaseRepo, InvoiceRepo};
use dunlin_provider::{DueDateFilter, InvoiceProvider, InvoiceQuery, NormalizedInvoice};

use crate::engine::PAGE_SIZE;

#[derive(Debug, Default)]
pub(crate) struct IngestStats {
    pub processed: i32,
    pub new_cases: i32,
    pub api_calls: i32,
    pub duration_ms: i64,
}

pub(crate) async fn run(
    pool: &PgPool,
    tenant: TenantId,
    provider: &dyn InvoiceProvider,
    today: NaiveDate,
    lead_days: i32,
) -> IngestStats {
    let started = std::time::Instant::now();
    let mut stats = IngestStats::default();

    let Some(target) = today.checked_add_days(Days::new(lead_days as u64)) else {
        tracing::error!(tenant_id = tenant.as_i64(), lead_days, "Unrepresentable target date");
        return stats;
    };

    let mut query = InvoiceQuery::first_page(DueDateFilter::Exact(target), PAGE_SIZE);
    loop {
        let page = provider.fetch_invoices(&query).await;
        stats.api_calls += 1;

        for invoice in &page {
            match ingest_one(pool, tenant, provider, invoice, &mut stats).await {
                Ok(()) => {}
                Err(e) => {
                    // Partial-failure isolation: this record is skipped,
                    // the page loop continues.
                    tracing::warn!(
                        tenant_id = tenant.as_i64(),
                        external_id = %invoice.external_id,
                        error = %e,
                        "Skipping invoice during ingestion"
                    );
                }
            }
        }

        // A short page means the listing is exhausted (or the adapter
        // absorbed a transport failure; either way this phase is done).
        if (page.len() as u32) < query.limit {
            break;
        }
        query = query.next_page();
    }

    stats.duration_ms = started.elapsed().as_millis() as i64;
    tracing::debug!(
        tenant_id = tenant.as_i64(),
        target_due = %target,
        processed = stats.processed,
        new_cases = stats.new_cases,
        "Ingestion phase finished"
    );
    stats
}

async fn ingest_one(
    pool: &PgPool,
    tenant: TenantId,
    provider: &dyn InvoiceProvider,
    remote: &NormalizedInvoice,
    stats: &mut IngestStats,
) -> Result<(), sqlx::Error> {
    if !remote.status.is_actionable() {
        return Ok(());
    }
    if InvoiceRepo::exists_by_external_id(pool, tenant, &remote.external_id).await? {
        tracing::debug!(
            tenant_id = tenant.as_i64(),
            external_id = %remote.external_id,
            "Invoice already ingested"
        );
        return Ok(());
    }

    // Invoices carry no contact data; the client record is the only
    // source, so it is fetched unconditionally.
    let client = match &remote.client_id {
        Some(client_id) => {
            stats.api_calls += 1;
            provider.client_details(client_id).await
        }
        None => None,
    };

    let (invoice_date, due_date) = match (remote.invoice_date, remote.due_date) {
        (Some(invoice_date), Some(due_date)) => (invoice_date, due_date),
        _ => {
            tracing::warn!(
                tenant_id = tenant.as_i64(),
                external_id = %remote.external_id,
                "Invoice missing dates, not ingesting"
            );
            return Ok(());
        }
    };

    let new_invoice = NewInvoice {
        external_id: remote.external_id.clone(),
        invoice_number: remote.number.clone(),
        invoice_date,
        due_date,
        paid_date: remote.paid_date,
        gross_amount: remote.gross,
        paid_amount: remote.paid,
        status: remote.status,
        currency: remote.currency.clone(),
        payment_method: remote.payment_method.clone(),
        client_id: remote.client_id.clone(),
        client_company_name: client.as_ref().and_then(|c| c.display_name()),
        client_email: client.as_ref().and_then(|c| c.email.clone()),
        client_tax_id: client.as_ref().and_then(|c| c.tax_id.clone()),
        client_address: client.as_ref().and_then(|c| c.postal_address()),
    };

    let invoice_id = InvoiceRepo::create(pool, tenant, &new_invoice).await?;
    stats.processed += 1;

    let left_to_pay = remote.gross - remote.paid;
    if left_to_pay <= 0 {
        return Ok(());
    }

    let new_case = NewCase {
        case_number: remote.number.clone(),
        client_id: remote.client_id.clone(),
        client_company_name: new_invoice.client_company_name.clone(),
        client_tax_id: new_invoice.client_tax_id.clone(),
    };

    let case_id = match CaseRepo::create(pool, tenant, &new_case).await {
        Ok(id) => {
            stats.new_cases += 1;
            id
        }
        // Race-safe: a concurrent run (or legacy data) already holds this
        // case number; link to the existing case instead of failing.
        Err(e) if dunlin_db::is_unique_violation(&e, UQ_TENANT_CASE_NUMBER) => {
            match CaseRepo::find_by_case_number(pool, tenant, &remote.number).await? {
                Some(existing) => existing.id,
                None => return Err(e),
            }
        }
        Err(e) => return Err(e),
    };

    InvoiceRepo::link_case(pool, tenant, invoice_id, case_id).await?;
    Ok(())
}
