//! wFirma adapter.
//!
//! POST-based API with page/limit pagination and an envelope whose
//! collections arrive either as a JSON array or as a numeric-keyed object
//! (`"0"`, `"1"`, ...) that must be read in integer key order. Amounts are
//! major-unit decimals and are converted with exact decimal arithmetic.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use dunlin_core::money;
use dunlin_core::status::InvoiceStatus;

use crate::adapter::{DueDateFilter, InvoiceProvider, InvoiceQuery};
use crate::types::{NormalizedClient, NormalizedInvoice};

/// Production API base.
const DEFAULT_BASE_URL: &str = "https://api2.wfirma.pl";

/// Timeout for invoice listings.
const LIST_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for a single contractor lookup.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(15);
/// Timeout for the connection probe.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Errors (internal only)
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
enum WfirmaError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("wFirma returned HTTP {0}")]
    HttpStatus(u16),

    #[error("wFirma envelope status: {0}")]
    EnvelopeStatus(String),

    #[error("contractor {0} not found")]
    ContractorGone(String),
}

// ---------------------------------------------------------------------------
// Envelope helpers
// ---------------------------------------------------------------------------

/// Read `body.status.code`, which wFirma sets even on HTTP 200.
fn envelope_code(body: &Value) -> Option<&str> {
    body.get("status")?.get("code")?.as_str()
}

/// Flatten a wFirma collection into its elements.
///
/// Collections arrive either as an array or as an object keyed by
/// stringified indices; the object form is read in integer key order so
/// pagination stays deterministic.
fn collection_elements(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            let mut keyed: Vec<(u64, &Value)> = map
                .iter()
                .filter_map(|(k, v)| k.parse::<u64>().ok().map(|n| (n, v)))
                .collect();
            keyed.sort_by_key(|(n, _)| *n);
            keyed.into_iter().map(|(_, v)| v).collect()
        }
        _ => Vec::new(),
    }
}

fn str_field(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn date_field(value: &Value, field: &str) -> Option<NaiveDate> {
    let raw = str_field(value, field)?;
    match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            tracing::warn!(field, raw, "Skipping malformed wFirma date field");
            None
        }
    }
}

/// Parse a major-unit amount field into minor units, defaulting to zero
/// on absent or malformed values.
fn amount_field(value: &Value, field: &str) -> i64 {
    let Some(raw) = str_field(value, field) else {
        return 0;
    };
    match money::parse_major_units(&raw) {
        Ok(minor) => minor,
        Err(e) => {
            tracing::warn!(field, raw, error = %e, "Skipping malformed wFirma amount field");
            0
        }
    }
}

/// Map wFirma's `paymentstate` onto the canonical status.
fn map_payment_state(state: Option<&str>) -> InvoiceStatus {
    match state {
        Some("paid") => InvoiceStatus::Paid,
        // "unpaid" and "undefined" both mean an open receivable.
        _ => InvoiceStatus::Sent,
    }
}

fn normalize_invoice(raw: &Value) -> Option<NormalizedInvoice> {
    let external_id = str_field(raw, "id")?;
    let gross = amount_field(raw, "total");
    let paid = amount_field(raw, "alreadypaid");
    let contractor = raw.get("contractor");

    Some(NormalizedInvoice {
        external_id,
        number: str_field(raw, "fullnumber").unwrap_or_default(),
        client_id: contractor.and_then(|c| str_field(c, "id")),
        gross,
        paid,
        left_to_pay: gross - paid,
        currency: str_field(raw, "currency").unwrap_or_else(|| "PLN".to_string()),
        invoice_date: date_field(raw, "date"),
        due_date: date_field(raw, "paymentdate"),
        // wFirma exposes no payment date; reconciliation infers one.
        paid_date: None,
        status: map_payment_state(str_field(raw, "paymentstate").as_deref()),
        payment_method: str_field(raw, "paymentmethod"),
    })
}

fn normalize_contractor(raw: &Value) -> Option<NormalizedClient> {
    Some(NormalizedClient {
        external_id: str_field(raw, "id")?,
        email: str_field(raw, "email"),
        tax_id: str_field(raw, "nip"),
        company_name: str_field(raw, "name"),
        first_name: str_field(raw, "firstname"),
        last_name: str_field(raw, "lastname"),
        street: str_field(raw, "street"),
        street_number: None,
        flat_number: None,
        // wFirma calls the postal code "zip".
        postal_code: str_field(raw, "zip"),
        city: str_field(raw, "city"),
    })
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// wFirma API adapter.
pub struct WfirmaProvider {
    client: reqwest::Client,
    base_url: String,
    access_key: String,
    secret_key: String,
    app_key: String,
    company_id: String,
}

impl WfirmaProvider {
    /// Create an adapter against the production API.
    pub fn new(access_key: String, secret_key: String, app_key: String, company_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            access_key,
            secret_key,
            app_key,
            company_id,
        }
    }

    /// Point the adapter at a different base URL (tests).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn request(&self, endpoint: &str, timeout: Duration) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/{}", self.base_url, endpoint))
            .query(&[
                ("inputFormat", "json"),
                ("outputFormat", "json"),
                ("company_id", self.company_id.as_str()),
            ])
            .header("accessKey", &self.access_key)
            .header("secretKey", &self.secret_key)
            .header("appKey", &self.app_key)
            .timeout(timeout)
    }

    fn conditions(due: &DueDateFilter) -> Vec<Value> {
        let condition = |field: &str, operator: &str, value: String| {
            serde_json::json!({"condition": {"field": field, "operator": operator, "value": value}})
        };
        match due {
            DueDateFilter::Exact(date) => {
                vec![condition("paymentdate", "eq", date.to_string())]
            }
            DueDateFilter::Range { from, to } => vec![
                condition("paymentdate", "ge", from.to_string()),
                condition("paymentdate", "le", to.to_string()),
            ],
        }
    }

    async fn try_fetch_invoices(
        &self,
        query: &InvoiceQuery,
    ) -> Result<Vec<NormalizedInvoice>, WfirmaError> {
        // wFirma paginates by 1-based page number, not by offset.
        let page = query.offset / query.limit.max(1) + 1;
        let body = serde_json::json!({
            "invoices": {
                "parameters": {
                    "conditions": Self::conditions(&query.due),
                    "page": page,
                    "limit": query.limit,
                }
            }
        });

        let response = self
            .request("invoices/find", LIST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WfirmaError::HttpStatus(response.status().as_u16()));
        }

        let envelope: Value = response.json().await?;
        match envelope_code(&envelope) {
            Some("OK") => {}
            code => {
                return Err(WfirmaError::EnvelopeStatus(
                    code.unwrap_or("missing").to_string(),
                ))
            }
        }

        let Some(collection) = envelope.get("invoices") else {
            return Ok(Vec::new());
        };
        Ok(collection_elements(collection)
            .into_iter()
            .filter_map(|element| element.get("invoice").or(Some(element)))
            .filter_map(normalize_invoice)
            .collect())
    }

    async fn try_client_details(&self, client_id: &str) -> Result<NormalizedClient, WfirmaError> {
        let response = self
            .request(&format!("contractors/get/{client_id}"), CLIENT_TIMEOUT)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(WfirmaError::ContractorGone(client_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(WfirmaError::HttpStatus(response.status().as_u16()));
        }

        let envelope: Value = response.json().await?;
        match envelope_code(&envelope) {
            Some("OK") => {}
            Some("NOT FOUND") => return Err(WfirmaError::ContractorGone(client_id.to_string())),
            code => {
                return Err(WfirmaError::EnvelopeStatus(
                    code.unwrap_or("missing").to_string(),
                ))
            }
        }

        let contractor = envelope
            .get("contractors")
            .map(|c| {
                collection_elements(c)
                    .into_iter()
                    .filter_map(|e| e.get("contractor").or(Some(e)))
                    .next()
            })
            .unwrap_or_else(|| envelope.get("contractor"));

        contractor
            .and_then(normalize_contractor)
            .ok_or_else(|| WfirmaError::ContractorGone(client_id.to_string()))
    }
}

#[async_trait]
impl InvoiceProvider for WfirmaProvider {
    async fn fetch_invoices(&self, query: &InvoiceQuery) -> Vec<NormalizedInvoice> {
        match self.try_fetch_invoices(query).await {
            Ok(invoices) => invoices,
            Err(e) => {
                tracing::error!(
                    offset = query.offset,
                    error = %e,
                    "wFirma invoice listing failed, returning empty page"
                );
                Vec::new()
            }
        }
    }

    async fn client_details(&self, client_id: &str) -> Option<NormalizedClient> {
        match self.try_client_details(client_id).await {
            Ok(client) => Some(client),
            Err(WfirmaError::ContractorGone(id)) => {
                tracing::warn!(client_id = %id, "wFirma contractor no longer exists");
                None
            }
            Err(e) => {
                tracing::error!(client_id, error = %e, "wFirma contractor lookup failed");
                None
            }
        }
    }

    async fn test_connection(&self) -> bool {
        let body = serde_json::json!({
            "invoices": {"parameters": {"page": 1, "limit": 1}}
        });
        let result = self
            .request("invoices/find", TEST_TIMEOUT)
            .json(&body)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<Value>().await {
                    Ok(envelope) => envelope_code(&envelope) == Some("OK"),
                    Err(_) => false,
                }
            }
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(error = %e, "wFirma connection test failed");
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "wfirma"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
