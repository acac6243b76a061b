//! Sync engine error taxonomy.
//!
//! These are the failures that abort a tenant's run. Provider transport
//! errors never appear here: adapters absorb them into empty pages, which
//! merely truncate a phase. Per-record write failures are logged and
//! skipped inside the phases.

use dunlin_core::tenant::{TenantError, TenantId};
use dunlin_core::types::DbId;
use dunlin_provider::ProviderConfigError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Fail-closed tenant resolution (no scope, or sudo where a single
    /// tenant is required).
    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error("tenant {0} not found")]
    TenantNotFound(TenantId),

    #[error("tenant {0} is inactive")]
    TenantInactive(TenantId),

    /// Missing or malformed provider binding; fatal for this tenant only.
    #[error("provider configuration: {0}")]
    Config(#[from] ProviderConfigError),

    #[error("invoice {0} not found")]
    InvoiceNotFound(DbId),

    #[error("case {0:?} not found")]
    CaseNotFound(String),

    #[error("case {case_number:?} cannot transition from {from} to {to}")]
    InvalidTransition {
        case_number: String,
        from: String,
        to: String,
    },

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
