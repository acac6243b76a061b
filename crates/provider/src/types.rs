//! Canonical invoice/client shapes shared by all adapters.

use chrono::NaiveDate;
use serde::Serialize;

use dunlin_core::status::InvoiceStatus;

/// A vendor invoice mapped onto the canonical schema.
///
/// Amounts are integer minor units; adapters whose API reports
/// major-unit decimals convert before constructing this.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedInvoice {
    pub external_id: String,
    pub number: String,
    pub client_id: Option<String>,
    pub gross: i64,
    pub paid: i64,
    pub left_to_pay: i64,
    pub currency: String,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    /// `None` where the vendor does not expose a payment date.
    pub paid_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub payment_method: Option<String>,
}

/// A vendor client/contractor record mapped onto the canonical schema.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedClient {
    pub external_id: String,
    pub email: Option<String>,
    pub tax_id: Option<String>,
    pub company_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub street: Option<String>,
    pub street_number: Option<String>,
    pub flat_number: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl NormalizedClient {
    /// The name a case is filed under: the company name, falling back to
    /// "first last" for sole traders without one.
    pub fn display_name(&self) -> Option<String> {
        if let Some(company) = filled(&self.company_name) {
            return Some(company.to_string());
        }
        match (filled(&self.first_name), filled(&self.last_name)) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.to_string()),
            (None, Some(last)) => Some(last.to_string()),
            (None, None) => None,
        }
    }

    /// Composed postal address: `"{postal}, {street} {number}[/{flat}],
    /// {city}"`, skipping blank parts.
    pub fn postal_address(&self) -> Option<String> {
        let mut street_part = String::new();
        if let Some(street) = filled(&self.street) {
            street_part.push_str(street);
        }
        if let Some(number) = filled(&self.street_number) {
            if !street_part.is_empty() {
                street_part.push(' ');
            }
            street_part.push_str(number);
            if let Some(flat) = filled(&self.flat_number) {
                street_part.push('/');
                street_part.push_str(flat);
            }
        }

        let parts: Vec<String> = [
            filled(&self.postal_code).map(str::to_string),
            (!street_part.is_empty()).then_some(street_part),
            filled(&self.city).map(str::to_string),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}
