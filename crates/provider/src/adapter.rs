//! The canonical provider contract consumed by the sync engine.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::{NormalizedClient, NormalizedInvoice};

/// Due-date criterion for an invoice listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueDateFilter {
    /// Invoices due on exactly this date (ingestion).
    Exact(NaiveDate),
    /// Invoices due inside this inclusive window (reconciliation).
    Range { from: NaiveDate, to: NaiveDate },
}

/// One page worth of invoice listing parameters.
#[derive(Debug, Clone, Copy)]
pub struct InvoiceQuery {
    pub due: DueDateFilter,
    pub offset: u32,
    pub limit: u32,
}

impl InvoiceQuery {
    /// First page of a listing.
    pub fn first_page(due: DueDateFilter, limit: u32) -> Self {
        Self { due, offset: 0, limit }
    }

    /// The query for the page after this one.
    pub fn next_page(self) -> Self {
        Self {
            offset: self.offset + self.limit,
            ..self
        }
    }
}

/// A vendor invoice/client API normalized onto the canonical schema.
///
/// Implementations catch their own transport errors: `fetch_invoices`
/// returns an empty page and `client_details` returns `None` on failure.
/// The engines treat an empty page as the end of the listing, which
/// truncates the current phase without aborting anything else.
#[async_trait]
pub trait InvoiceProvider: Send + Sync {
    /// Fetch one page of invoices matching the query.
    async fn fetch_invoices(&self, query: &InvoiceQuery) -> Vec<NormalizedInvoice>;

    /// Fetch a client's contact and address details.
    ///
    /// `None` covers both "client gone" (404, logged at warn) and
    /// transient failures (logged at error).
    async fn client_details(&self, client_id: &str) -> Option<NormalizedClient>;

    /// Probe the vendor API with the configured credentials.
    async fn test_connection(&self) -> bool;

    /// Stable provider name (`infakt` | `wfirma`).
    fn name(&self) -> &'static str;
}

impl std::fmt::Debug for dyn InvoiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoiceProvider").field("name", &self.name()).finish()
    }
}
