//! Per-tenant monotonic sequencing of sync audit records.

use sqlx::PgPool;

use dunlin_core::tenant::TenantId;
use dunlin_db::models::sync_run::NewSyncRun;
use dunlin_db::models::tenant::NewTenant;
use dunlin_db::repositories::{SyncRunRepo, TenantRepo};

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

fn run(processed: i32) -> NewSyncRun {
    NewSyncRun {
        processed,
        new_cases: 1,
        active_after: 1,
        closed_cases: 0,
        api_calls: 3,
        duration_ms: 120,
        ingest_processed: processed,
        ingest_duration_ms: 80,
        reconcile_processed: 0,
        reconcile_duration_ms: 40,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn sequence_starts_at_one_and_increments(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;

    let first = SyncRunRepo::record(&pool, tenant, &run(5)).await.unwrap();
    let second = SyncRunRepo::record(&pool, tenant, &run(2)).await.unwrap();
    let third = SyncRunRepo::record(&pool, tenant, &run(0)).await.unwrap();

    assert_eq!(first.seq, 1);
    assert_eq!(second.seq, 2);
    assert_eq!(third.seq, 3);
    assert_eq!(first.sync_type, "full");
}

#[sqlx::test(migrations = "./migrations")]
async fn sequences_are_independent_per_tenant(pool: PgPool) {
    let t1 = create_tenant(&pool, "alpha").await;
    let t2 = create_tenant(&pool, "beta").await;

    SyncRunRepo::record(&pool, t1, &run(1)).await.unwrap();
    SyncRunRepo::record(&pool, t1, &run(1)).await.unwrap();
    let other = SyncRunRepo::record(&pool, t2, &run(1)).await.unwrap();

    assert_eq!(other.seq, 1);
    assert_eq!(SyncRunRepo::latest(&pool, t1).await.unwrap().unwrap().seq, 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn list_recent_is_newest_first(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;

    for processed in [10, 20, 30] {
        SyncRunRepo::record(&pool, tenant, &run(processed)).await.unwrap();
    }

    let recent = SyncRunRepo::list_recent(&pool, tenant, 2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].seq, 3);
    assert_eq!(recent[0].processed, 30);
    assert_eq!(recent[1].seq, 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn latest_is_none_for_fresh_tenant(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;
    assert!(SyncRunRepo::latest(&pool, tenant).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn phase_breakdown_round_trips(pool: PgPool) {
    let tenant = create_tenant(&pool, "alpha").await;

    let recorded = SyncRunRepo::record(
        &pool,
        tenant,
        &NewSyncRun {
            processed: 7,
            new_cases: 2,
            active_after: 5,
            closed_cases: 1,
            api_calls: 9,
            duration_ms: 456,
            ingest_processed: 4,
            ingest_duration_ms: 300,
            reconcile_processed: 3,
            reconcile_duration_ms: 156,
        },
    )
    .await
    .unwrap();

    assert_eq!(recorded.ingest_processed, 4);
    assert_eq!(recorded.reconcile_processed, 3);
    assert_eq!(recorded.ingest_duration_ms, 300);
    assert_eq!(recorded.reconcile_duration_ms, 156);
    assert_eq!(recorded.closed_cases, 1);
}
