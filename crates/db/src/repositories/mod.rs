//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods that
//! accept `&PgPool` as the first argument. Tenant-scoped methods take an
//! explicit [`TenantId`](dunlin_core::tenant::TenantId); the few
//! cross-tenant reads take a [`Sudo`](dunlin_core::tenant::Sudo) token.
//! Methods whose writes must roll back together take `&mut PgConnection`
//! so the caller controls the transaction.

pub mod case_repo;
pub mod invoice_repo;
pub mod notification_log_repo;
pub mod schedule_repo;
pub mod stage_schedule_repo;
pub mod sync_run_repo;
pub mod tenant_repo;

pub use case_repo::CaseRepo;
pub use invoice_repo::InvoiceRepo;
pub use notification_log_repo::NotificationLogRepo;
pub use schedule_repo::ScheduleRepo;
pub use stage_schedule_repo::StageScheduleRepo;
pub use sync_run_repo::SyncRunRepo;
pub use tenant_repo::TenantRepo;
