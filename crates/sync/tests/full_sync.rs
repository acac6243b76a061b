//! Integration tests for the full sync engine against a real database
//! and an in-memory provider stub.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use sqlx::PgPool;

use dunlin_core::status::{CaseStatus, InvoiceStatus};
use dunlin_core::tenant::{TenantContext, TenantError, TenantId};
use dunlin_db::models::tenant::NewTenant;
use dunlin_db::repositories::{CaseRepo, InvoiceRepo, SyncRunRepo, TenantRepo};
use dunlin_provider::{DueDateFilter, InvoiceProvider, InvoiceQuery, NormalizedClient, NormalizedInvoice};
use dunlin_sync::{mark_invoice_paid, reopen_case, run_full_sync, run_full_sync_with, ReopenOutcome, SyncError};

// ---------------------------------------------------------------------------
// Stub provider
// ---------------------------------------------------------------------------

/// Serves a fixed invoice list, filtered and paginated like a vendor API.
#[derive(Default)]
struct StubProvider {
    invoices: Vec<NormalizedInvoice>,
    clients: HashMap<String, NormalizedClient>,
    calls: AtomicU32,
}

impl StubProvider {
    fn with_invoice(mut self, invoice: NormalizedInvoice) -> Self {
        self.invoices.push(invoice);
        self
    }

    fn with_client(mut self, client: NormalizedClient) -> Self {
        self.clients.insert(client.external_id.clone(), client);
        self
    }
}

#[async_trait]
impl InvoiceProvider for StubProvider {
    async fn fetch_invoices(&self, query: &InvoiceQuery) -> Vec<NormalizedInvoice> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let matching: Vec<NormalizedInvoice> = self
            .invoices
            .iter()
            .filter(|inv| match (query.due, inv.due_date) {
                (DueDateFilter::Exact(date), Some(due)) => due == date,
                (DueDateFilter::Range { from, to }, Some(due)) => due >= from && due <= to,
                _ => false,
            })
            .cloned()
            .collect();
        matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect()
    }

    async fn client_details(&self, client_id: &str) -> Option<NormalizedClient> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.clients.get(client_id).cloned()
    }

    async fn test_connection(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Due tomorrow: matches the default lead_days = 1 ingestion target.
fn due_tomorrow() -> NaiveDate {
    today().checked_add_days(Days::new(1)).unwrap()
}

async fn create_tenant(pool: &PgPool, name: &str) -> TenantId {
    let id = TenantRepo::create(
        pool,
        &NewTenant {
            name: name.to_string(),
            provider_type: None,
            provider_credentials: None,
        },
    )
    .await
    .unwrap();
    TenantId::new(id)
}

fn invoice(external_id: &str, number: &str, due: NaiveDate, gross: i64, paid: i64) -> NormalizedInvoice {
    NormalizedInvoice {
        external_id: external_id.to_string(),
        number: number.to_string(),
        client_id: Some("c-1".into()),
        gross,
        paid,
        left_to_pay: gross - paid,
        currency: "PLN".into(),
        invoice_date: Some(today().checked_sub_days(Days::new(14)).unwrap()),
        due_date: Some(due),
        paid_date: None,
        status: InvoiceStatus::Sent,
        payment_method: Some("transfer".into()),
    }
}

fn client() -> NormalizedClient {
    NormalizedClient {
        external_id: "c-1".into(),
        email: Some("ap@debtor.example".into()),
        tax_id: Some("5260001246".into()),
        company_name: Some("Debtor Sp. z o.o.".into()),
        street: Some("Polna".into()),
        street_number: Some("12".into()),
        postal_code: Some("00-001".into()),
        city: Some("Warszawa".into()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn ingestion_creates_invoice_and_case(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;
    let provider = StubProvider::default()
        .with_invoice(invoice("ext-1", "FV 1/2025", due_tomorrow(), 300255, 0))
        .with_client(client());

    let outcome = run_full_sync_with(&pool, tenant, &provider).await.unwrap();

    assert_eq!(outcome.ingest_processed, 1);
    assert_eq!(outcome.new_cases, 1);
    assert_eq!(outcome.active_after, 1);

    let stored = InvoiceRepo::find_by_number(&pool, tenant, "FV 1/2025")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.gross_amount, 300255);
    assert_eq!(stored.left_to_pay, 300255);
    assert_eq!(stored.client_email.as_deref(), Some("ap@debtor.example"));
    assert_eq!(stored.client_company_name.as_deref(), Some("Debtor Sp. z o.o."));
    assert_eq!(stored.client_address.as_deref(), Some("00-001, Polna 12, Warszawa"));

    let case = CaseRepo::find(&pool, tenant, stored.case_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(case.case_number, "FV 1/2025");
    assert_eq!(case.case_status(), Some(CaseStatus::Active));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn ingestion_is_idempotent(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;
    let provider = StubProvider::default()
        .with_invoice(invoice("ext-1", "FV 1/2025", due_tomorrow(), 300255, 0))
        .with_client(client());

    let first = run_full_sync_with(&pool, tenant, &provider).await.unwrap();
    let second = run_full_sync_with(&pool, tenant, &provider).await.unwrap();

    assert_eq!(first.new_cases, 1);
    // Scenario C: the external id already exists, nothing new is created.
    assert_eq!(second.ingest_processed, 0);
    assert_eq!(second.new_cases, 0);

    let invoices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE tenant_id = $1")
        .bind(tenant.as_i64())
        .fetch_one(&pool)
        .await
        .unwrap();
    let cases: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cases WHERE tenant_id = $1")
        .bind(tenant.as_i64())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(invoices, 1);
    assert_eq!(cases, 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn settled_invoice_gets_no_case(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;
    let provider = StubProvider::default()
        .with_invoice(invoice("ext-1", "FV 1/2025", due_tomorrow(), 10000, 10000))
        .with_client(client());

    let outcome = run_full_sync_with(&pool, tenant, &provider).await.unwrap();

    assert_eq!(outcome.ingest_processed, 1, "invoice is still stored");
    assert_eq!(outcome.new_cases, 0);
    let stored = InvoiceRepo::find_by_number(&pool, tenant, "FV 1/2025")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.left_to_pay, 0);
    assert!(stored.case_id.is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn paid_status_is_not_actionable(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;
    let mut inv = invoice("ext-1", "FV 1/2025", due_tomorrow(), 10000, 0);
    inv.status = InvoiceStatus::Paid;
    let provider = StubProvider::default().with_invoice(inv).with_client(client());

    let outcome = run_full_sync_with(&pool, tenant, &provider).await.unwrap();

    assert_eq!(outcome.ingest_processed, 0);
    assert!(InvoiceRepo::find_by_number(&pool, tenant, "FV 1/2025")
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn missing_client_email_still_ingests(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;
    // No client registered in the stub: details lookup returns None.
    let provider = StubProvider::default()
        .with_invoice(invoice("ext-1", "FV 1/2025", due_tomorrow(), 10000, 0));

    let outcome = run_full_sync_with(&pool, tenant, &provider).await.unwrap();

    assert_eq!(outcome.ingest_processed, 1);
    assert_eq!(outcome.new_cases, 1);
    let stored = InvoiceRepo::find_by_number(&pool, tenant, "FV 1/2025")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.client_email.is_none());
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Seed an active case by running ingestion, then return the new state
/// of the provider for the reconciliation run.
async fn seed_active_case(pool: &PgPool, tenant: TenantId) {
    let provider = StubProvider::default()
        .with_invoice(invoice("ext-1", "FV 1/2025", due_tomorrow(), 10000, 0))
        .with_client(client());
    run_full_sync_with(pool, tenant, &provider).await.unwrap();
}

#[sqlx::test(migrations = "../db/migrations")]
async fn reconciliation_closes_paid_case(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;
    seed_active_case(&pool, tenant).await;

    // Scenario D: provider now reports the invoice fully paid, without a
    // payment date.
    let mut paid = invoice("ext-1", "FV 1/2025", due_tomorrow(), 10000, 10000);
    paid.status = InvoiceStatus::Paid;
    let provider = StubProvider::default().with_invoice(paid).with_client(client());

    let outcome = run_full_sync_with(&pool, tenant, &provider).await.unwrap();

    assert_eq!(outcome.closed_cases, 1);
    assert_eq!(outcome.active_after, 0);

    let stored = InvoiceRepo::find_by_number(&pool, tenant, "FV 1/2025")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.paid_amount, 10000);
    assert_eq!(stored.left_to_pay, 0);
    assert_eq!(stored.paid_date, Some(today()), "paid date inferred from run date");

    let case = CaseRepo::find_by_case_number(&pool, tenant, "FV 1/2025")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(case.case_status(), Some(CaseStatus::ClosedPaid));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn partial_payment_preserves_conservation(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;
    seed_active_case(&pool, tenant).await;

    let provider = StubProvider::default()
        .with_invoice(invoice("ext-1", "FV 1/2025", due_tomorrow(), 10000, 4000))
        .with_client(client());

    let outcome = run_full_sync_with(&pool, tenant, &provider).await.unwrap();

    assert_eq!(outcome.closed_cases, 0);
    let stored = InvoiceRepo::find_by_number(&pool, tenant, "FV 1/2025")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.paid_amount, 4000);
    assert_eq!(stored.left_to_pay, stored.gross_amount - stored.paid_amount);
    assert!(stored.paid_date.is_none());

    let case = CaseRepo::find_by_case_number(&pool, tenant, "FV 1/2025")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(case.case_status(), Some(CaseStatus::Active));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn closed_cases_are_left_alone(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;
    seed_active_case(&pool, tenant).await;

    let case = CaseRepo::find_by_case_number(&pool, tenant, "FV 1/2025")
        .await
        .unwrap()
        .unwrap();
    CaseRepo::set_status(&pool, tenant, case.id, CaseStatus::ClosedUnpaid)
        .await
        .unwrap();

    // Reconciliation scans active cases only; the provider reporting a
    // payment on a closed case must not resurrect it.
    let provider = StubProvider::default()
        .with_invoice(invoice("ext-1", "FV 1/2025", due_tomorrow(), 10000, 10000))
        .with_client(client());
    let outcome = run_full_sync_with(&pool, tenant, &provider).await.unwrap();

    assert_eq!(outcome.closed_cases, 0);
    assert_eq!(outcome.reconcile_processed, 0);
    let case = CaseRepo::find_by_case_number(&pool, tenant, "FV 1/2025")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(case.case_status(), Some(CaseStatus::ClosedUnpaid));

    let stored = InvoiceRepo::find_by_number(&pool, tenant, "FV 1/2025")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.paid_amount, 0, "invoice untouched outside active cases");
}

// ---------------------------------------------------------------------------
// Audit + fail-closed entry
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn every_run_writes_a_sequenced_audit_row(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;
    let provider = StubProvider::default()
        .with_invoice(invoice("ext-1", "FV 1/2025", due_tomorrow(), 10000, 0))
        .with_client(client());

    run_full_sync_with(&pool, tenant, &provider).await.unwrap();
    run_full_sync_with(&pool, tenant, &provider).await.unwrap();

    let runs = SyncRunRepo::list_recent(&pool, tenant, 10).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].seq, 2);
    assert_eq!(runs[1].seq, 1);
    assert_eq!(runs[1].sync_type, "full");
    assert_eq!(runs[1].new_cases, 1);
    assert!(runs[1].api_calls >= 2, "listing + client lookup counted");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unscoped_context_fails_closed(pool: PgPool) {
    let ctx = TenantContext::new();
    let err = run_full_sync(&pool, &ctx).await.unwrap_err();
    assert!(matches!(err, SyncError::Tenant(TenantError::NotSet)));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn sudo_context_fails_closed(pool: PgPool) {
    let mut ctx = TenantContext::new();
    let guard = ctx.enter_sudo();
    let err = run_full_sync(&pool, &guard).await.unwrap_err();
    assert!(matches!(err, SyncError::Tenant(TenantError::SudoActive)));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unknown_tenant_is_an_error(pool: PgPool) {
    let ctx = TenantContext::for_tenant(TenantId::new(424242));
    let err = run_full_sync(&pool, &ctx).await.unwrap_err();
    assert!(matches!(err, SyncError::TenantNotFound(_)));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unconfigured_provider_is_a_config_error(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;
    let ctx = TenantContext::for_tenant(tenant);
    let err = run_full_sync(&pool, &ctx).await.unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
}

// ---------------------------------------------------------------------------
// Manual case operations
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn mark_paid_settles_and_closes(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;
    seed_active_case(&pool, tenant).await;
    let stored = InvoiceRepo::find_by_number(&pool, tenant, "FV 1/2025")
        .await
        .unwrap()
        .unwrap();

    mark_invoice_paid(&pool, tenant, stored.id).await.unwrap();

    let settled = InvoiceRepo::find(&pool, tenant, stored.id).await.unwrap().unwrap();
    assert_eq!(settled.left_to_pay, 0);
    assert_eq!(settled.paid_amount, settled.gross_amount);
    assert_eq!(settled.paid_date, Some(today()));

    let case = CaseRepo::find_by_case_number(&pool, tenant, "FV 1/2025")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(case.case_status(), Some(CaseStatus::ClosedPaid));

    // A system log row records the closure.
    let logs = dunlin_db::repositories::NotificationLogRepo::list_for_invoice(
        &pool, tenant, "FV 1/2025",
    )
    .await
    .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].mode, "system");
    assert_eq!(logs[0].stage, "case_closed");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn reopen_closed_case(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;
    seed_active_case(&pool, tenant).await;
    let case = CaseRepo::find_by_case_number(&pool, tenant, "FV 1/2025")
        .await
        .unwrap()
        .unwrap();
    CaseRepo::set_status(&pool, tenant, case.id, CaseStatus::ClosedUnpaid)
        .await
        .unwrap();

    let outcome = reopen_case(&pool, tenant, "FV 1/2025").await.unwrap();
    assert_eq!(outcome, ReopenOutcome::Reopened);

    let outcome = reopen_case(&pool, tenant, "FV 1/2025").await.unwrap();
    assert_eq!(outcome, ReopenOutcome::AlreadyActive);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn reopen_unknown_case_errors(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;
    let err = reopen_case(&pool, tenant, "FV 404/2025").await.unwrap_err();
    assert!(matches!(err, SyncError::CaseNotFound(_)));
}
