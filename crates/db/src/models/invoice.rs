//! Invoice entity model and DTOs.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

use dunlin_core::status::InvoiceStatus;
use dunlin_core::types::{DbId, Timestamp};

/// A row from the `invoices` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Invoice {
    pub id: DbId,
    pub tenant_id: DbId,

    pub external_id: String,
    pub invoice_number: String,

    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,

    pub gross_amount: i64,
    pub paid_amount: i64,
    pub left_to_pay: i64,

    pub status: String,
    pub debt_status: Option<String>,

    pub currency: String,
    pub payment_method: Option<String>,

    pub client_id: Option<String>,
    pub client_company_name: Option<String>,
    pub client_email: Option<String>,
    pub override_email: Option<String>,
    pub client_tax_id: Option<String>,
    pub client_address: Option<String>,

    pub case_id: Option<DbId>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Invoice {
    /// Parsed provider status.
    pub fn invoice_status(&self) -> Option<InvoiceStatus> {
        InvoiceStatus::parse(&self.status)
    }

    /// The address notifications go to: the manual override when set and
    /// non-blank, otherwise the provider's client email.
    pub fn effective_email(&self) -> Option<&str> {
        match self.override_email.as_deref() {
            Some(email) if !email.trim().is_empty() => Some(email),
            _ => self
                .client_email
                .as_deref()
                .filter(|email| !email.trim().is_empty()),
        }
    }
}

/// DTO for inserting a freshly ingested invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub external_id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub gross_amount: i64,
    pub paid_amount: i64,
    pub status: InvoiceStatus,
    pub currency: String,
    pub payment_method: Option<String>,
    pub client_id: Option<String>,
    pub client_company_name: Option<String>,
    pub client_email: Option<String>,
    pub client_tax_id: Option<String>,
    pub client_address: Option<String>,
}

/// DTO for reconciliation updates. `None` fields are left unchanged;
/// `left_to_pay` is always recomputed from the resulting gross and paid.
#[derive(Debug, Clone, Default)]
pub struct InvoiceChanges {
    pub status: Option<InvoiceStatus>,
    pub gross_amount: Option<i64>,
    pub paid_amount: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub invoice_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
}

impl InvoiceChanges {
    /// Whether the DTO carries no changes at all.
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.gross_amount.is_none()
            && self.paid_amount.is_none()
            && self.due_date.is_none()
            && self.invoice_date.is_none()
            && self.paid_date.is_none()
            && self.payment_method.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(client_email: Option<&str>, override_email: Option<&str>) -> Invoice {
        Invoice {
            id: 1,
            tenant_id: 1,
            external_id: "ext-1".into(),
            invoice_number: "FV 1/2025".into(),
            invoice_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            paid_date: None,
            gross_amount: 100_00,
            paid_amount: 0,
            left_to_pay: 100_00,
            status: "sent".into(),
            debt_status: None,
            currency: "PLN".into(),
            payment_method: None,
            client_id: None,
            client_company_name: None,
            client_email: client_email.map(Into::into),
            override_email: override_email.map(Into::into),
            client_tax_id: None,
            client_address: None,
            case_id: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn effective_email_prefers_override() {
        let inv = invoice(Some("client@example.com"), Some("debts@example.com"));
        assert_eq!(inv.effective_email(), Some("debts@example.com"));
    }

    #[test]
    fn blank_override_falls_back_to_client_email() {
        let inv = invoice(Some("client@example.com"), Some("   "));
        assert_eq!(inv.effective_email(), Some("client@example.com"));
    }

    #[test]
    fn no_usable_email_is_none() {
        assert_eq!(invoice(None, None).effective_email(), None);
        assert_eq!(invoice(Some(""), None).effective_email(), None);
    }

    #[test]
    fn empty_changes_detected() {
        assert!(InvoiceChanges::default().is_empty());
        let changes = InvoiceChanges {
            paid_amount: Some(50_00),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
