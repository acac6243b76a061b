//! inFakt adapter.
//!
//! REST API, offset/limit pagination, amounts already in grosze. The
//! public surface catches every transport and parse failure; the private
//! functions are fallible and carry the real error.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use dunlin_core::status::InvoiceStatus;

use crate::adapter::{DueDateFilter, InvoiceProvider, InvoiceQuery};
use crate::types::{NormalizedClient, NormalizedInvoice};

/// Production API base.
const DEFAULT_BASE_URL: &str = "https://api.infakt.pl/api/v3";

/// Timeout for invoice listings.
const LIST_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for a single client lookup.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(15);
/// Timeout for the connection probe.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fields requested from the invoice listing, keeping responses small.
const INVOICE_FIELDS: &str = "id,number,invoice_date,payment_date,paid_date,gross_price,\
     paid_price,status,currency,payment_method,client_id";

// ---------------------------------------------------------------------------
// Errors (internal only)
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
enum InfaktError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("inFakt returned HTTP {0}")]
    HttpStatus(u16),

    #[error("client {0} not found")]
    ClientGone(String),
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    entities: Vec<RawInvoice>,
}

#[derive(Debug, Deserialize)]
struct RawInvoice {
    id: i64,
    number: Option<String>,
    invoice_date: Option<String>,
    payment_date: Option<String>,
    paid_date: Option<String>,
    #[serde(default)]
    gross_price: i64,
    #[serde(default)]
    paid_price: i64,
    status: Option<String>,
    currency: Option<String>,
    payment_method: Option<String>,
    client_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawClient {
    id: i64,
    email: Option<String>,
    nip: Option<String>,
    company_name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    street: Option<String>,
    street_number: Option<String>,
    flat_number: Option<String>,
    postal_code: Option<String>,
    city: Option<String>,
}

/// Parse a wire date, skipping the field on malformed input.
fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            tracing::warn!(raw, "Skipping malformed inFakt date field");
            None
        }
    }
}

impl RawInvoice {
    fn normalize(self) -> NormalizedInvoice {
        let status = self
            .status
            .as_deref()
            .and_then(InvoiceStatus::parse)
            .unwrap_or(InvoiceStatus::Sent);
        NormalizedInvoice {
            external_id: self.id.to_string(),
            number: self.number.unwrap_or_default(),
            client_id: self.client_id.map(|id| id.to_string()),
            gross: self.gross_price,
            paid: self.paid_price,
            left_to_pay: self.gross_price - self.paid_price,
            currency: self.currency.unwrap_or_else(|| "PLN".to_string()),
            invoice_date: parse_date(self.invoice_date.as_deref()),
            due_date: parse_date(self.payment_date.as_deref()),
            paid_date: parse_date(self.paid_date.as_deref()),
            status,
            payment_method: self.payment_method,
        }
    }
}

impl RawClient {
    fn normalize(self) -> NormalizedClient {
        NormalizedClient {
            external_id: self.id.to_string(),
            email: self.email,
            tax_id: self.nip,
            company_name: self.company_name,
            first_name: self.first_name,
            last_name: self.last_name,
            street: self.street,
            street_number: self.street_number,
            flat_number: self.flat_number,
            postal_code: self.postal_code,
            city: self.city,
        }
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// inFakt API adapter.
pub struct InfaktProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl InfaktProvider {
    /// Create an adapter against the production API.
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
        }
    }

    /// Point the adapter at a different base URL (tests).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn due_date_params(due: &DueDateFilter) -> Vec<(String, String)> {
        match due {
            DueDateFilter::Exact(date) => {
                vec![("q[payment_date_eq]".to_string(), date.to_string())]
            }
            DueDateFilter::Range { from, to } => vec![
                ("q[payment_date_gteq]".to_string(), from.to_string()),
                ("q[payment_date_lteq]".to_string(), to.to_string()),
            ],
        }
    }

    async fn try_fetch_invoices(
        &self,
        query: &InvoiceQuery,
    ) -> Result<Vec<NormalizedInvoice>, InfaktError> {
        let mut params = vec![
            ("offset".to_string(), query.offset.to_string()),
            ("limit".to_string(), query.limit.to_string()),
            ("order".to_string(), "invoice_date desc".to_string()),
            ("fields".to_string(), INVOICE_FIELDS.to_string()),
        ];
        params.extend(Self::due_date_params(&query.due));

        let response = self
            .client
            .get(format!("{}/invoices.json", self.base_url))
            .header("X-inFakt-ApiKey", &self.api_key)
            .query(&params)
            .timeout(LIST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(InfaktError::HttpStatus(response.status().as_u16()));
        }

        let body: ListResponse = response.json().await?;
        Ok(body.entities.into_iter().map(RawInvoice::normalize).collect())
    }

    async fn try_client_details(&self, client_id: &str) -> Result<NormalizedClient, InfaktError> {
        let response = self
            .client
            .get(format!("{}/clients/{}.json", self.base_url, client_id))
            .header("X-inFakt-ApiKey", &self.api_key)
            .timeout(CLIENT_TIMEOUT)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(InfaktError::ClientGone(client_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(InfaktError::HttpStatus(response.status().as_u16()));
        }

        let body: RawClient = response.json().await?;
        Ok(body.normalize())
    }
}

#[async_trait]
impl InvoiceProvider for InfaktProvider {
    async fn fetch_invoices(&self, query: &InvoiceQuery) -> Vec<NormalizedInvoice> {
        match self.try_fetch_invoices(query).await {
            Ok(invoices) => invoices,
            Err(e) => {
                tracing::error!(
                    offset = query.offset,
                    error = %e,
                    "inFakt invoice listing failed, returning empty page"
                );
                Vec::new()
            }
        }
    }

    async fn client_details(&self, client_id: &str) -> Option<NormalizedClient> {
        match self.try_client_details(client_id).await {
            Ok(client) => Some(client),
            Err(InfaktError::ClientGone(id)) => {
                tracing::warn!(client_id = %id, "inFakt client no longer exists");
                None
            }
            Err(e) => {
                tracing::error!(client_id, error = %e, "inFakt client lookup failed");
                None
            }
        }
    }

    async fn test_connection(&self) -> bool {
        let result = self
            .client
            .get(format!("{}/invoices.json", self.base_url))
            .header("X-inFakt-ApiKey", &self.api_key)
            .query(&[("limit", "1")])
            .timeout(TEST_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "inFakt connection test failed");
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "infakt"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> InfaktProvider {
        InfaktProvider::new("test-key".into()).with_base_url(server.uri())
    }

    fn due(date: &str) -> DueDateFilter {
        DueDateFilter::Exact(date.parse().unwrap())
    }

    #[tokio::test]
    async fn lists_and_normalizes_invoices() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "metainfo": {"count": 1},
            "entities": [{
                "id": 9981,
                "number": "FV 4/2025",
                "invoice_date": "2025-03-01",
                "payment_date": "2025-03-15",
                "paid_date": null,
                "gross_price": 300255,
                "paid_price": 100,
                "status": "sent",
                "currency": "PLN",
                "payment_method": "transfer",
                "client_id": 17
            }]
        });

        Mock::given(method("GET"))
            .and(path("/invoices.json"))
            .and(header("X-inFakt-ApiKey", "test-key"))
            .and(query_param("q[payment_date_eq]", "2025-03-15"))
            .and(query_param("offset", "0"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let query = InvoiceQuery::first_page(due("2025-03-15"), 100);
        let invoices = provider(&server).fetch_invoices(&query).await;

        assert_eq!(invoices.len(), 1);
        let inv = &invoices[0];
        assert_eq!(inv.external_id, "9981");
        assert_eq!(inv.number, "FV 4/2025");
        assert_eq!(inv.gross, 300255);
        assert_eq!(inv.paid, 100);
        assert_eq!(inv.left_to_pay, 300155);
        assert_eq!(inv.status, InvoiceStatus::Sent);
        assert_eq!(inv.client_id.as_deref(), Some("17"));
        assert_eq!(inv.due_date, Some("2025-03-15".parse().unwrap()));
        assert_eq!(inv.paid_date, None);
    }

    #[tokio::test]
    async fn range_filter_sends_window_params() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/invoices.json"))
            .and(query_param("q[payment_date_gteq]", "2025-02-08"))
            .and(query_param("q[payment_date_lteq]", "2025-03-18"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"entities": []})),
            )
            .mount(&server)
            .await;

        let query = InvoiceQuery::first_page(
            DueDateFilter::Range {
                from: "2025-02-08".parse().unwrap(),
                to: "2025-03-18".parse().unwrap(),
            },
            100,
        );
        assert!(provider(&server).fetch_invoices(&query).await.is_empty());
    }

    #[tokio::test]
    async fn server_error_yields_empty_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/invoices.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let query = InvoiceQuery::first_page(due("2025-03-15"), 100);
        assert!(provider(&server).fetch_invoices(&query).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_date_skips_only_that_field() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "entities": [{
                "id": 1,
                "number": "FV 1/2025",
                "invoice_date": "not-a-date",
                "payment_date": "2025-03-15",
                "gross_price": 5000,
                "paid_price": 0,
                "status": "printed",
                "client_id": 3
            }]
        });

        Mock::given(method("GET"))
            .and(path("/invoices.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let query = InvoiceQuery::first_page(due("2025-03-15"), 100);
        let invoices = provider(&server).fetch_invoices(&query).await;
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].invoice_date, None);
        assert_eq!(invoices[0].due_date, Some("2025-03-15".parse().unwrap()));
        assert_eq!(invoices[0].status, InvoiceStatus::Printed);
    }

    #[tokio::test]
    async fn client_details_normalizes() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "id": 17,
            "email": "ap@debtor.example",
            "nip": "5260001246",
            "company_name": "Debtor Sp. z o.o.",
            "street": "Polna",
            "street_number": "12",
            "flat_number": "3",
            "postal_code": "00-001",
            "city": "Warszawa"
        });

        Mock::given(method("GET"))
            .and(path("/clients/17.json"))
            .and(header("X-inFakt-ApiKey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let client = provider(&server).client_details("17").await.unwrap();
        assert_eq!(client.email.as_deref(), Some("ap@debtor.example"));
        assert_eq!(client.tax_id.as_deref(), Some("5260001246"));
        assert_eq!(client.postal_address().unwrap(), "00-001, Polna 12/3, Warszawa");
    }

    #[tokio::test]
    async fn client_404_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/clients/99.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(provider(&server).client_details("99").await.is_none());
    }

    #[tokio::test]
    async fn client_500_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/clients/17.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(provider(&server).client_details("17").await.is_none());
    }

    #[tokio::test]
    async fn test_connection_reflects_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/invoices.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"entities": []})),
            )
            .mount(&server)
            .await;

        assert!(provider(&server).test_connection().await);
    }

    #[tokio::test]
    async fn test_connection_false_on_auth_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/invoices.json"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert!(!provider(&server).test_connection().await);
    }
}
