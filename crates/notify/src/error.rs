//! Staging engine error taxonomy.
//!
//! Delivery failures to individual recipients never abort a scheduled
//! run; they are absorbed per stage and the stage stays retryable. These
//! errors cover what does abort: bad scope, missing tenant or relay
//! configuration, and database failures. The manual send path surfaces
//! more, since an operator is waiting for the answer.

use dunlin_core::stage::Stage;
use dunlin_core::tenant::{TenantError, TenantId};

use crate::mailer::DeliveryError;

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// Fail-closed tenant resolution (no scope, or sudo where a single
    /// tenant is required).
    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error("tenant {0} not found")]
    TenantNotFound(TenantId),

    /// The tenant's SMTP relay is missing required fields.
    #[error("tenant {0} has no usable SMTP configuration")]
    SmtpNotConfigured(TenantId),

    #[error("case {0:?} not found")]
    CaseNotFound(String),

    #[error("no stored invoice for case {0:?}")]
    InvoiceNotFound(String),

    /// The template collaborator has nothing to render for this stage.
    #[error("no template for stage {0}")]
    TemplateMissing(Stage),

    /// The invoice has no usable recipient address.
    #[error("case {0:?} has no recipient email")]
    NoRecipient(String),

    /// Manual send only: every recipient failed after retries.
    #[error("delivery failed: {0}")]
    Delivery(DeliveryError),

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
