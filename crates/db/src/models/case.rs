//! Collection case entity model.

use serde::Serialize;
use sqlx::FromRow;

use dunlin_core::status::CaseStatus;
use dunlin_core::types::{DbId, Timestamp};

/// A row from the `cases` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Case {
    pub id: DbId,
    pub tenant_id: DbId,
    pub case_number: String,
    pub client_id: Option<String>,
    pub client_company_name: Option<String>,
    pub client_tax_id: Option<String>,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Case {
    /// Parsed case status. Rows only ever hold canonical values.
    pub fn case_status(&self) -> Option<CaseStatus> {
        CaseStatus::parse(&self.status)
    }
}

/// DTO for opening a case during ingestion.
#[derive(Debug, Clone)]
pub struct NewCase {
    pub case_number: String,
    pub client_id: Option<String>,
    pub client_company_name: Option<String>,
    pub client_tax_id: Option<String>,
}
