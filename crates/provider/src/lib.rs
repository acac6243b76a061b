//! Accounting provider adapters.
//!
//! Each adapter normalizes one vendor's invoice/client API onto the
//! [`InvoiceProvider`](adapter::InvoiceProvider) contract. Transport and
//! parse failures never cross the trait boundary: adapters log and return
//! empty results, so the sync engine only ever sees shorter pages.

pub mod adapter;
pub mod credentials;
pub mod factory;
pub mod infakt;
pub mod types;
pub mod wfirma;

pub use adapter::{DueDateFilter, InvoiceProvider, InvoiceQuery};
pub use credentials::{ProviderCredentials, ProviderKind};
pub use factory::{build_provider, ProviderConfigError};
pub use types::{NormalizedClient, NormalizedInvoice};
