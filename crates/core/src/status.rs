//! Case and invoice status vocabularies.
//!
//! Statuses are stored as TEXT columns; the enums here define the canonical
//! values and the case state machine. Provider adapters normalize vendor
//! payment states onto [`InvoiceStatus`] before anything is persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CaseStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a collection case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Under active collection; eligible for staging and reconciliation.
    Active,
    /// Closed because the invoice was paid.
    ClosedPaid,
    /// Closed unpaid after the final escalation stage.
    ClosedUnpaid,
    /// Removed from all processing. Terminal.
    Archived,
}

impl CaseStatus {
    /// Database value.
    pub fn as_str(self) -> &'static str {
        match self {
            CaseStatus::Active => "active",
            CaseStatus::ClosedPaid => "closed_paid",
            CaseStatus::ClosedUnpaid => "closed_unpaid",
            CaseStatus::Archived => "archived",
        }
    }

    /// Parse a database value.
    pub fn parse(s: &str) -> Option<CaseStatus> {
        match s {
            "active" => Some(CaseStatus::Active),
            "closed_paid" => Some(CaseStatus::ClosedPaid),
            "closed_unpaid" => Some(CaseStatus::ClosedUnpaid),
            "archived" => Some(CaseStatus::Archived),
            _ => None,
        }
    }

    /// Whether the case participates in sync and staging.
    pub fn is_open(self) -> bool {
        matches!(self, CaseStatus::Active)
    }

    /// Valid target statuses reachable from `self`.
    ///
    /// Closed cases may be reopened manually; `Archived` is terminal.
    pub fn valid_transitions(self) -> &'static [CaseStatus] {
        match self {
            CaseStatus::Active => &[
                CaseStatus::ClosedPaid,
                CaseStatus::ClosedUnpaid,
                CaseStatus::Archived,
            ],
            CaseStatus::ClosedPaid | CaseStatus::ClosedUnpaid => &[CaseStatus::Active],
            CaseStatus::Archived => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is valid.
    pub fn can_transition(self, to: CaseStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// InvoiceStatus
// ---------------------------------------------------------------------------

/// Canonical provider invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Issued and delivered electronically.
    Sent,
    /// Issued on paper.
    Printed,
    /// Fully paid at the provider.
    Paid,
}

impl InvoiceStatus {
    /// Database / wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Printed => "printed",
            InvoiceStatus::Paid => "paid",
        }
    }

    /// Parse a canonical value.
    pub fn parse(s: &str) -> Option<InvoiceStatus> {
        match s {
            "sent" => Some(InvoiceStatus::Sent),
            "printed" => Some(InvoiceStatus::Printed),
            "paid" => Some(InvoiceStatus::Paid),
            _ => None,
        }
    }

    /// Whether ingestion should open a case for an invoice in this status.
    pub fn is_actionable(self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Printed)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
