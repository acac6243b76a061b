//! Tenant entity model.

use serde::Serialize;
use sqlx::FromRow;

use dunlin_core::tenant::TenantId;
use dunlin_core::types::{DbId, Timestamp};

/// A row from the `tenants` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tenant {
    pub id: DbId,
    pub name: String,
    pub is_active: bool,

    pub provider_type: Option<String>,
    pub provider_credentials: Option<serde_json::Value>,

    pub smtp_host: Option<String>,
    pub smtp_port: i32,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,

    pub company_name: Option<String>,
    pub company_phone: Option<String>,
    pub company_email: Option<String>,
    pub company_bank_account: Option<String>,

    pub created_at: Timestamp,
}

impl Tenant {
    /// The row id as a scoping handle.
    pub fn tenant_id(&self) -> TenantId {
        TenantId::new(self.id)
    }

    /// Whether a provider binding exists (type and credentials both set).
    pub fn provider_configured(&self) -> bool {
        self.provider_type.is_some() && self.provider_credentials.is_some()
    }

    /// Whether the SMTP relay is fully configured for outbound mail.
    pub fn smtp_configured(&self) -> bool {
        fn present(v: &Option<String>) -> bool {
            v.as_deref().is_some_and(|s| !s.trim().is_empty())
        }
        present(&self.smtp_host)
            && present(&self.smtp_username)
            && present(&self.smtp_password)
            && present(&self.smtp_from)
    }
}

/// DTO for creating a tenant (onboarding flow / tests).
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub provider_type: Option<String>,
    pub provider_credentials: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_tenant() -> Tenant {
        Tenant {
            id: 1,
            name: "acme".into(),
            is_active: true,
            provider_type: None,
            provider_credentials: None,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_from: None,
            company_name: None,
            company_phone: None,
            company_email: None,
            company_bank_account: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn unconfigured_tenant_has_no_provider_or_smtp() {
        let tenant = bare_tenant();
        assert!(!tenant.provider_configured());
        assert!(!tenant.smtp_configured());
    }

    #[test]
    fn provider_configured_needs_both_fields() {
        let mut tenant = bare_tenant();
        tenant.provider_type = Some("infakt".into());
        assert!(!tenant.provider_configured());
        tenant.provider_credentials = Some(serde_json::json!({"api_key": "k"}));
        assert!(tenant.provider_configured());
    }

    #[test]
    fn smtp_configured_rejects_blank_fields() {
        let mut tenant = bare_tenant();
        tenant.smtp_host = Some("smtp.example.com".into());
        tenant.smtp_username = Some("mailer".into());
        tenant.smtp_password = Some("  ".into());
        tenant.smtp_from = Some("dunning@example.com".into());
        assert!(!tenant.smtp_configured());
        tenant.smtp_password = Some("hunter2".into());
        assert!(tenant.smtp_configured());
    }
}
