//! Adapter construction from tenant configuration.

use crate::adapter::InvoiceProvider;
use crate::credentials::{ProviderCredentials, ProviderKind};
use crate::infakt::InfaktProvider;
use crate::wfirma::WfirmaProvider;

/// Configuration failures resolving a tenant's provider binding.
///
/// Fatal for that tenant's run only; the dispatcher logs and moves on.
#[derive(Debug, thiserror::Error)]
pub enum ProviderConfigError {
    #[error("provider type is not configured")]
    MissingType,

    #[error("unknown provider type: {0:?}")]
    UnknownType(String),

    #[error("provider credentials are not configured")]
    MissingCredentials,

    #[error("provider credentials are malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("provider type is {declared} but credentials are for {actual}")]
    KindMismatch {
        declared: ProviderKind,
        actual: ProviderKind,
    },
}

/// Build the adapter for a tenant's provider binding.
///
/// `provider_type` and `credentials` come straight off the tenant row.
/// The declared type must match the credential variant; a mismatch means
/// the tenant's configuration was edited inconsistently.
pub fn build_provider(
    provider_type: Option<&str>,
    credentials: Option<&serde_json::Value>,
) -> Result<Box<dyn InvoiceProvider>, ProviderConfigError> {
    let declared = provider_type.ok_or(ProviderConfigError::MissingType)?;
    let declared =
        ProviderKind::parse(declared).ok_or_else(|| ProviderConfigError::UnknownType(declared.to_string()))?;

    let blob = credentials.ok_or(ProviderConfigError::MissingCredentials)?;
    let creds: ProviderCredentials = serde_json::from_value(blob.clone())?;

    if creds.kind() != declared {
        return Err(ProviderConfigError::KindMismatch {
            declared,
            actual: creds.kind(),
        });
    }

    Ok(match creds {
        ProviderCredentials::Infakt { api_key } => Box::new(InfaktProvider::new(api_key)),
        ProviderCredentials::Wfirma {
            access_key,
            secret_key,
            app_key,
            company_id,
        } => Box::new(WfirmaProvider::new(access_key, secret_key, app_key, company_id)),
    })
}
