//! The five-stage escalation ladder.
//!
//! Stage offsets are expressed in days relative to the invoice due date:
//! negative offsets fire before the due date, positive ones after. Tenants
//! may reschedule offsets per stage; the stage set itself is fixed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One rung of the escalation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Courtesy reminder shortly before the due date.
    PaymentReminder,
    /// First overdue notice.
    OverdueNotice,
    /// Formal demand for payment.
    DemandForPayment,
    /// Warning of referral to external collection and debt-exchange listing.
    CollectionWarning,
    /// Hand-over to external collection. Final stage.
    CollectionHandover,
}

impl Stage {
    /// All stages in escalation order.
    pub const ALL: [Stage; 5] = [
        Stage::PaymentReminder,
        Stage::OverdueNotice,
        Stage::DemandForPayment,
        Stage::CollectionWarning,
        Stage::CollectionHandover,
    ];

    /// Stable key used in the database and in notification logs.
    pub fn key(self) -> &'static str {
        match self {
            Stage::PaymentReminder => "payment_reminder",
            Stage::OverdueNotice => "overdue_notice",
            Stage::DemandForPayment => "demand_for_payment",
            Stage::CollectionWarning => "collection_warning",
            Stage::CollectionHandover => "collection_handover",
        }
    }

    /// Parse a stable key back into a stage.
    pub fn from_key(key: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.key() == key)
    }

    /// 1-based position on the ladder.
    pub fn number(self) -> u8 {
        match self {
            Stage::PaymentReminder => 1,
            Stage::OverdueNotice => 2,
            Stage::DemandForPayment => 3,
            Stage::CollectionWarning => 4,
            Stage::CollectionHandover => 5,
        }
    }

    /// Parse a 1-based ladder position.
    pub fn from_number(number: u8) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.number() == number)
    }

    /// Default offset in days relative to the due date.
    pub fn default_offset_days(self) -> i32 {
        match self {
            Stage::PaymentReminder => -1,
            Stage::OverdueNotice => 7,
            Stage::DemandForPayment => 14,
            Stage::CollectionWarning => 21,
            Stage::CollectionHandover => 30,
        }
    }

    /// Whether this is the last rung of the ladder.
    pub fn is_final(self) -> bool {
        matches!(self, Stage::CollectionHandover)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
